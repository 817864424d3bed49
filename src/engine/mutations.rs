use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::validate::{check_email, check_measure, check_name, window_span};
use super::{Engine, EngineError};

impl Engine {
    /// Register an account. The email is the lookup key and must be unused
    /// (compared case-insensitively, surrounding whitespace ignored).
    pub async fn create_account(&self, name: &str, email: &str) -> Result<Owner, EngineError> {
        check_name(name, "account name required")?;
        check_email(email)?;
        let email = email.trim();

        let id = Ulid::new();
        self.store.reserve_email(email, id)?;
        let event = Event::OwnerCreated {
            id,
            name: name.to_string(),
            email: email.to_string(),
        };
        if let Err(e) = self.store.commit(&event).await {
            self.store.release_email(email);
            return Err(e);
        }
        tracing::info!(owner_id = %id, email, "account created");
        self.store.get_owner(&id)
    }

    pub async fn register_pet(
        &self,
        owner_id: Ulid,
        name: &str,
        species: &str,
        size: f64,
        is_dangerous: bool,
    ) -> Result<Pet, EngineError> {
        check_name(name, "pet name required")?;
        check_name(species, "species required")?;
        check_measure(size, "pet size must be a positive number")?;
        let owner = self.store.get_owner(&owner_id)?;
        if owner.pet_ids.len() >= MAX_PETS_PER_OWNER {
            return Err(EngineError::LimitExceeded("too many pets"));
        }

        let id = Ulid::new();
        let event = Event::PetRegistered {
            id,
            owner_id,
            name: name.to_string(),
            species: species.to_string(),
            size,
            is_dangerous,
        };
        self.store.commit(&event).await?;
        tracing::info!(pet_id = %id, %owner_id, "pet registered");
        self.store.get_pet(&id)
    }

    /// Register a cage with no windows yet; see [`Engine::add_availability`].
    pub async fn register_cage(&self, owner_id: Ulid, cage: NewCage) -> Result<CageInfo, EngineError> {
        check_name(&cage.name, "cage name required")?;
        check_measure(cage.square_meters, "square meters must be a positive number")?;
        if !cage.price.is_finite() || cage.price < 0.0 {
            return Err(EngineError::Invalid("price must be a non-negative number"));
        }
        if self.store.cage_count() >= MAX_CAGES {
            return Err(EngineError::LimitExceeded("too many cages"));
        }
        self.store.get_owner(&owner_id)?;

        let id = Ulid::new();
        let event = Event::CageRegistered { id, owner_id, cage };
        self.store.commit(&event).await?;
        tracing::info!(cage_id = %id, %owner_id, "cage registered");
        Ok(self.store.load_cage(&id).await?.info())
    }

    /// Publish an open window `[checkin, checkout]` on a cage. Appended after
    /// the existing windows; claimed windows are untouched.
    pub async fn add_window(&self, cage_id: Ulid, checkin: Ms, checkout: Ms) -> Result<Window, EngineError> {
        let span = window_span(checkin, checkout)?;
        let mut cage = self.store.lock_cage(&cage_id).await?;
        if cage.windows.len() >= MAX_WINDOWS_PER_CAGE {
            return Err(EngineError::LimitExceeded("too many windows on cage"));
        }

        let id = Ulid::new();
        let event = Event::WindowAdded { id, cage_id, span };
        self.store.save_cage(&mut cage, &event).await?;
        tracing::info!(%cage_id, window_id = %id, start = span.start, end = span.end, "window added");
        Ok(Window::open(id, span))
    }

    /// Publish `days` days of availability starting at `start`.
    pub async fn add_availability(&self, cage_id: Ulid, start: Ms, days: u32) -> Result<Window, EngineError> {
        if days == 0 {
            return Err(EngineError::Invalid("availability must last at least one day"));
        }
        if Ms::from(days) > MAX_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("window too long"));
        }
        let end = Ms::from(days)
            .checked_mul(DAY_MS)
            .and_then(|len| start.checked_add(len))
            .ok_or(EngineError::LimitExceeded("timestamp out of range"))?;
        self.add_window(cage_id, start, end).await
    }
}
