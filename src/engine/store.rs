use std::io;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::observability::{WAL_FLUSH_BATCH_SIZE, WAL_FLUSH_DURATION_SECONDS};
use crate::wal::Wal;

use super::EngineError;

pub type SharedCageState = Arc<RwLock<CageState>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that arrive while a flush is pending are drained
/// into the same batch and share one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<Pending>) {
    metrics::histogram!(WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let (events, senders): (Vec<Event>, Vec<_>) = batch.into_iter().unzip();
    let result = wal.append_batch(&events);
    metrics::histogram!(WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    for tx in senders {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => commit_batch(wal, vec![(event, response)]),
    }
}

/// Exclusive handle on one cage's record. While it is held no other claim,
/// window append or compaction can touch the cage.
pub struct CageLock {
    _commit: OwnedRwLockReadGuard<()>,
    state: OwnedRwLockWriteGuard<CageState>,
}

impl Deref for CageLock {
    type Target = CageState;

    fn deref(&self) -> &CageState {
        &self.state
    }
}

impl DerefMut for CageLock {
    fn deref_mut(&mut self) -> &mut CageState {
        &mut self.state
    }
}

/// Id-keyed tables for owners, pets and cages, persisted through the WAL.
///
/// Owners reference cages and pets by id only. Each cage sits behind its own
/// lock; that lock is the unit of consistency for its windows.
pub struct Store {
    owners: DashMap<Ulid, Owner>,
    /// Normalized email → owner id.
    emails: DashMap<String, Ulid>,
    pets: DashMap<Ulid, Pet>,
    cages: DashMap<Ulid, SharedCageState>,
    /// Held shared by every commit, exclusively by compaction.
    commit_gate: Arc<RwLock<()>>,
    wal_tx: mpsc::Sender<WalCommand>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Apply a window event to a cage the caller has locked.
fn apply_to_cage(cage: &mut CageState, event: &Event) {
    match event {
        Event::WindowAdded { id, span, .. } => cage.push_window(Window::open(*id, *span)),
        Event::WindowClaimed { id, claim, .. } => {
            cage.set_claim(*id, *claim);
        }
        Event::OwnerCreated { .. } | Event::PetRegistered { .. } | Event::CageRegistered { .. } => {}
    }
}

impl Store {
    /// Replay the WAL at `wal_path` and start the background writer.
    /// Must be called from within a tokio runtime.
    pub fn open(wal_path: &Path) -> io::Result<Self> {
        let events = Wal::replay(wal_path)?;
        let wal = Wal::open(wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            owners: DashMap::new(),
            emails: DashMap::new(),
            pets: DashMap::new(),
            cages: DashMap::new(),
            commit_gate: Arc::new(RwLock::new(())),
            wal_tx,
        };
        for event in &events {
            store.replay_event(event);
        }
        tracing::info!(
            events = events.len(),
            owners = store.owners.len(),
            cages = store.cages.len(),
            "store replayed {}",
            wal_path.display()
        );
        Ok(store)
    }

    // Nothing else holds these Arcs during replay, so try_write never fails.
    // Never block here: open() may run inside an async context.
    fn replay_event(&self, event: &Event) {
        match event {
            Event::WindowAdded { cage_id, .. } | Event::WindowClaimed { cage_id, .. } => {
                if let Some(cage) = self.cages.get(cage_id).map(|e| e.value().clone())
                    && let Ok(mut guard) = cage.try_write()
                {
                    apply_to_cage(&mut guard, event);
                }
            }
            _ => self.apply_record(event),
        }
    }

    /// Apply an owner/pet/cage registration to the tables.
    fn apply_record(&self, event: &Event) {
        match event {
            Event::OwnerCreated { id, name, email } => {
                self.emails.insert(normalize_email(email), *id);
                self.owners.insert(
                    *id,
                    Owner {
                        id: *id,
                        name: name.clone(),
                        email: email.clone(),
                        cage_ids: Vec::new(),
                        pet_ids: Vec::new(),
                    },
                );
            }
            Event::PetRegistered { id, owner_id, name, species, size, is_dangerous } => {
                self.pets.insert(
                    *id,
                    Pet {
                        id: *id,
                        owner_id: *owner_id,
                        name: name.clone(),
                        species: species.clone(),
                        size: *size,
                        is_dangerous: *is_dangerous,
                    },
                );
                if let Some(mut owner) = self.owners.get_mut(owner_id) {
                    owner.pet_ids.push(*id);
                }
            }
            Event::CageRegistered { id, owner_id, cage } => {
                let state = CageState::new(*id, *owner_id, cage.clone());
                self.cages.insert(*id, Arc::new(RwLock::new(state)));
                if let Some(mut owner) = self.owners.get_mut(owner_id) {
                    owner.cage_ids.push(*id);
                }
            }
            Event::WindowAdded { .. } | Event::WindowClaimed { .. } => {}
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Persist and apply an owner, pet or cage registration.
    pub async fn commit(&self, event: &Event) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        self.wal_append(event).await?;
        self.apply_record(event);
        Ok(())
    }

    /// Persist a window event and apply it to the locked cage. Nothing is
    /// applied if the WAL append fails.
    pub async fn save_cage(&self, cage: &mut CageLock, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_cage(cage, event);
        Ok(())
    }

    // ── Owners ───────────────────────────────────────────────

    /// Reserve `email` for `owner_id`. Fails if another owner has it.
    pub fn reserve_email(&self, email: &str, owner_id: Ulid) -> Result<(), EngineError> {
        match self.emails.entry(normalize_email(email)) {
            Entry::Occupied(_) => Err(EngineError::EmailTaken(email.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(owner_id);
                Ok(())
            }
        }
    }

    pub fn release_email(&self, email: &str) {
        self.emails.remove(&normalize_email(email));
    }

    pub fn find_owner_by_email(&self, email: &str) -> Result<Owner, EngineError> {
        self.emails
            .get(&normalize_email(email))
            .and_then(|id| self.owners.get(id.value()).map(|o| o.value().clone()))
            .ok_or_else(|| EngineError::UnknownEmail(email.to_string()))
    }

    pub fn get_owner(&self, id: &Ulid) -> Result<Owner, EngineError> {
        self.owners
            .get(id)
            .map(|o| o.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    // ── Pets ─────────────────────────────────────────────────

    pub fn get_pet(&self, id: &Ulid) -> Result<Pet, EngineError> {
        self.pets
            .get(id)
            .map(|p| p.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    // ── Cages ────────────────────────────────────────────────

    pub fn cage_count(&self) -> usize {
        self.cages.len()
    }

    fn shared_cage(&self, id: &Ulid) -> Result<SharedCageState, EngineError> {
        self.cages
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    fn all_cages(&self) -> Vec<SharedCageState> {
        self.cages.iter().map(|e| e.value().clone()).collect()
    }

    /// Point-in-time copy of one cage.
    pub async fn load_cage(&self, id: &Ulid) -> Result<CageState, EngineError> {
        let cage = self.shared_cage(id)?;
        let guard = cage.read().await;
        Ok(guard.clone())
    }

    /// Take the cage's write lock for a read-modify-write.
    pub async fn lock_cage(&self, id: &Ulid) -> Result<CageLock, EngineError> {
        let cage = self.shared_cage(id)?;
        let commit = self.commit_gate.clone().read_owned().await;
        let state = cage.write_owned().await;
        Ok(CageLock { _commit: commit, state })
    }

    /// Copies of every cage the owner registered, in registration order.
    pub async fn list_cages_owned_by(&self, owner_id: &Ulid) -> Result<Vec<CageState>, EngineError> {
        let owner = self.get_owner(owner_id)?;
        let mut cages = Vec::with_capacity(owner.cage_ids.len());
        for id in &owner.cage_ids {
            cages.push(self.load_cage(id).await?);
        }
        Ok(cages)
    }

    /// Coarse pre-filter on capacity and danger policy. Dates are not looked at.
    pub async fn list_cages_matching(&self, min_capacity: f64, dangerous: bool) -> Vec<CageState> {
        let mut out = Vec::new();
        for cage in self.all_cages() {
            let guard = cage.read().await;
            if guard.square_meters >= min_capacity && (!dangerous || guard.allows_dangerous) {
                out.push(guard.clone());
            }
        }
        out
    }

    /// Copies of every cage holding at least one claimed window.
    pub async fn list_claimed_cages(&self) -> Vec<CageState> {
        let mut out = Vec::new();
        for cage in self.all_cages() {
            let guard = cage.read().await;
            if guard.windows.iter().any(|w| !w.is_open()) {
                out.push(guard.clone());
            }
        }
        out
    }

    // ── Compaction ───────────────────────────────────────────

    /// The minimal event list that rebuilds the current state. Owners come
    /// first so replayed pets and cages find them.
    async fn snapshot_events(&self) -> Vec<Event> {
        let mut owners: Vec<Owner> = self.owners.iter().map(|e| e.value().clone()).collect();
        owners.sort_by_key(|o| o.id);

        let mut events = Vec::new();
        for owner in &owners {
            events.push(Event::OwnerCreated {
                id: owner.id,
                name: owner.name.clone(),
                email: owner.email.clone(),
            });
        }
        for owner in &owners {
            for pet_id in &owner.pet_ids {
                if let Some(pet) = self.pets.get(pet_id) {
                    events.push(Event::PetRegistered {
                        id: pet.id,
                        owner_id: pet.owner_id,
                        name: pet.name.clone(),
                        species: pet.species.clone(),
                        size: pet.size,
                        is_dangerous: pet.is_dangerous,
                    });
                }
            }
            for cage_id in &owner.cage_ids {
                let Ok(cage) = self.shared_cage(cage_id) else { continue };
                let guard = cage.read().await;
                events.push(Event::CageRegistered {
                    id: guard.id,
                    owner_id: guard.owner_id,
                    cage: NewCage {
                        name: guard.name.clone(),
                        square_meters: guard.square_meters,
                        is_carpeted: guard.is_carpeted,
                        has_toys: guard.has_toys,
                        allows_dangerous: guard.allows_dangerous,
                        price: guard.price,
                    },
                });
                for w in &guard.windows {
                    events.push(Event::WindowAdded { id: w.id, cage_id: guard.id, span: w.span });
                    if let Some(claim) = w.claim {
                        events.push(Event::WindowClaimed { id: w.id, cage_id: guard.id, claim });
                    }
                }
            }
        }
        events
    }

    /// Rewrite the WAL with only the events needed to recreate the current
    /// state. Commits wait until the swap is done.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let events = self.snapshot_events().await;
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
