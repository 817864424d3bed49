use std::time::Instant;

use ulid::Ulid;

use crate::model::*;
use crate::observability::{booking_status, BOOKINGS_TOTAL, BOOKING_DURATION_SECONDS};

use super::validate::{now_ms, stay_span};
use super::{Engine, EngineError};

impl Engine {
    /// Claim an open window on `cage_id` covering `[checkin, checkout]` for the
    /// guest's pet.
    ///
    /// The cage is re-read under its write lock, so a candidate from an earlier
    /// search is only a hint. Of several eligible windows, the first in stored
    /// order is taken. Fails with [`EngineError::BookingConflict`] when none is
    /// left; callers should search again rather than retry.
    pub async fn attempt_booking(
        &self,
        cage_id: Ulid,
        guest_owner_id: Ulid,
        guest_pet_id: Ulid,
        checkin: Ms,
        checkout: Ms,
    ) -> Result<Window, EngineError> {
        let started = Instant::now();
        let result = self
            .claim_window(cage_id, guest_owner_id, guest_pet_id, checkin, checkout)
            .await;

        metrics::counter!(BOOKINGS_TOTAL, "status" => booking_status(&result)).increment(1);
        metrics::histogram!(BOOKING_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        match &result {
            Ok(window) => tracing::info!(
                %cage_id,
                window_id = %window.id,
                %guest_owner_id,
                %guest_pet_id,
                "window claimed"
            ),
            Err(EngineError::BookingConflict(_)) => {
                tracing::warn!(%cage_id, %guest_owner_id, checkin, checkout, "booking conflict")
            }
            Err(e) => tracing::debug!(%cage_id, "booking rejected: {e}"),
        }
        result
    }

    async fn claim_window(
        &self,
        cage_id: Ulid,
        guest_owner_id: Ulid,
        guest_pet_id: Ulid,
        checkin: Ms,
        checkout: Ms,
    ) -> Result<Window, EngineError> {
        let stay = stay_span(checkin, checkout)?;
        self.store.get_owner(&guest_owner_id)?;
        self.store.get_pet(&guest_pet_id)?;

        let mut cage = self.store.lock_cage(&cage_id).await?;
        let idx = cage
            .first_open_window(&stay)
            .ok_or(EngineError::BookingConflict(cage_id))?;

        let event = Event::WindowClaimed {
            id: cage.windows[idx].id,
            cage_id,
            claim: Claim {
                guest_owner_id,
                guest_pet_id,
                booked_at: now_ms(),
            },
        };
        self.store.save_cage(&mut cage, &event).await?;
        Ok(cage.windows[idx].clone())
    }
}
