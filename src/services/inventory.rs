//! Inventory ledger: the sole authority for seat-count changes.
//!
//! Reservation is one conditional decrement executed by the storage layer.
//! When the decrement reports zero rows a classifying read decides which
//! refusal to surface; if that read says the reservation should have
//! succeeded, the ledger lost a race and retries the conditional update a
//! bounded number of times before surfacing `Conflict`.

use chrono::Utc;

use crate::storage::{Storage, StorageError};

/// Extra attempts after the first conditional update loses a race.
const CONFLICT_RETRIES: u32 = 2;

#[derive(thiserror::Error, Debug)]
pub enum InventoryError {
    #[error("showtime not found")]
    NotFound,

    #[error("not enough seats available")]
    SeatUnavailable,

    #[error("showtime is inactive or already started")]
    ScheduleClosed,

    #[error("lost a storage race on the seat counter")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Reserves `count` seats on a showtime, or says exactly why it cannot.
#[tracing::instrument(skip(storage))]
pub async fn reserve_seats(
    storage: &dyn Storage,
    showtime_id: i64,
    count: i32,
) -> Result<(), InventoryError> {
    for attempt in 0..=CONFLICT_RETRIES {
        let now = Utc::now();
        if storage.try_reserve_seats(showtime_id, count, now).await? {
            tracing::debug!(showtime_id, count, "seats reserved");
            return Ok(());
        }

        // Zero rows updated: read the row to find out which guard failed.
        let showtime = storage
            .fetch_showtime(showtime_id)
            .await?
            .ok_or(InventoryError::NotFound)?;

        if !showtime.is_open_at(now) {
            return Err(InventoryError::ScheduleClosed);
        }
        if showtime.available_seats < count {
            return Err(InventoryError::SeatUnavailable);
        }

        // The row looked reservable on the read, so the conditional update
        // lost to a concurrent writer. Try again.
        tracing::debug!(showtime_id, attempt, "seat reservation lost a race, retrying");
    }

    Err(InventoryError::Conflict)
}

/// Returns `count` seats to the pool, clamped at the showtime's capacity.
/// Idempotence is the caller's concern: CANCELLED is set exactly once
/// upstream, so each cancellation releases at most once.
#[tracing::instrument(skip(storage))]
pub async fn release_seats(
    storage: &dyn Storage,
    showtime_id: i64,
    count: i32,
) -> Result<(), InventoryError> {
    if storage.release_seats(showtime_id, count).await? {
        tracing::debug!(showtime_id, count, "seats released");
        Ok(())
    } else {
        Err(InventoryError::NotFound)
    }
}
