use ulid::Ulid;

use crate::model::*;
use crate::observability::{CANDIDATES_RETURNED, SEARCHES_TOTAL};

use super::availability::candidates;
use super::validate::stay_span;
use super::{Engine, EngineError};

impl Engine {
    /// Cages and windows that can host `pet` from `checkin` to `checkout`,
    /// cheapest first. A point-in-time snapshot: nothing is reserved, and a
    /// candidate may be gone by the time it is booked.
    pub async fn find_candidates(&self, checkin: Ms, checkout: Ms, pet: &Pet) -> Result<Vec<Candidate>, EngineError> {
        let stay = stay_span(checkin, checkout)?;
        let cages = self
            .store
            .list_cages_matching(pet.min_capacity(), pet.is_dangerous)
            .await;
        let found = candidates(&cages, &stay, pet);

        metrics::counter!(SEARCHES_TOTAL).increment(1);
        metrics::histogram!(CANDIDATES_RETURNED).record(found.len() as f64);
        tracing::debug!(
            pet_id = %pet.id,
            checkin,
            checkout,
            scanned = cages.len(),
            found = found.len(),
            "candidate search"
        );
        Ok(found)
    }

    /// Every window claimed by `owner_id`, paired with its cage's name.
    pub async fn bookings_for_guest(&self, owner_id: Ulid) -> Result<Vec<GuestBooking>, EngineError> {
        self.store.get_owner(&owner_id)?;
        let bookings = self
            .store
            .list_claimed_cages()
            .await
            .into_iter()
            .flat_map(|cage| {
                let CageState { id, name, windows, .. } = cage;
                windows
                    .into_iter()
                    .filter(move |w| w.claim.is_some_and(|c| c.guest_owner_id == owner_id))
                    .map(move |window| GuestBooking {
                        cage_id: id,
                        cage_name: name.clone(),
                        window,
                    })
            })
            .collect();
        Ok(bookings)
    }

    pub async fn bookings_for_email(&self, email: &str) -> Result<Vec<GuestBooking>, EngineError> {
        let owner = self.store.find_owner_by_email(email)?;
        self.bookings_for_guest(owner.id).await
    }

    pub fn find_account_by_email(&self, email: &str) -> Result<Owner, EngineError> {
        self.store.find_owner_by_email(email)
    }

    pub fn get_owner(&self, owner_id: Ulid) -> Result<Owner, EngineError> {
        self.store.get_owner(&owner_id)
    }

    pub fn get_pet(&self, pet_id: Ulid) -> Result<Pet, EngineError> {
        self.store.get_pet(&pet_id)
    }

    pub async fn get_cage(&self, cage_id: Ulid) -> Result<CageState, EngineError> {
        self.store.load_cage(&cage_id).await
    }

    pub async fn cages_for_owner(&self, owner_id: Ulid) -> Result<Vec<CageInfo>, EngineError> {
        let cages = self.store.list_cages_owned_by(&owner_id).await?;
        Ok(cages.iter().map(CageState::info).collect())
    }

    pub fn pets_for_owner(&self, owner_id: Ulid) -> Result<Vec<Pet>, EngineError> {
        let owner = self.store.get_owner(&owner_id)?;
        owner.pet_ids.iter().map(|id| self.store.get_pet(id)).collect()
    }
}
