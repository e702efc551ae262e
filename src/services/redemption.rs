//! Redemption service: composes the inventory ledger, the redemption store
//! and the codec/renderer into the externally visible workflows.
//!
//! Seat reservation and credential issuance are two storage round trips,
//! not one ACID unit, so the purchase path carries its own compensation: a
//! reservation whose issuance fails is released again, with at-least-once
//! retries before the failure is escalated for manual reconciliation.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::{QrCredential, Subject, SubjectKind};
use crate::services::inventory::{self, InventoryError};
use crate::services::redemption_store::{self, RedemptionError, SubjectRef, Validation};
use crate::storage::{Storage, StorageError};

/// Attempts at the compensating seat release before escalation.
const RELEASE_ATTEMPTS: u32 = 3;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Redemption(#[from] RedemptionError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Reserves one seat, then issues the ticket + QR credential. The ticket is
/// redeemable until the showtime starts.
#[tracing::instrument(skip(storage))]
pub async fn purchase_ticket(
    storage: &dyn Storage,
    owner_id: i64,
    showtime_id: i64,
    seat_number: i32,
) -> Result<(Subject, QrCredential), ServiceError> {
    let showtime = storage
        .fetch_showtime(showtime_id)
        .await?
        .ok_or(ServiceError::NotFound)?;

    inventory::reserve_seats(storage, showtime_id, 1).await?;

    let issued = redemption_store::issue(
        storage,
        owner_id,
        SubjectRef::Seat {
            showtime_id,
            seat_number,
        },
        showtime.show_time,
    )
    .await;

    match issued {
        Ok(pair) => Ok(pair),
        Err(e) => {
            tracing::warn!(showtime_id, error = %e, "issuance failed after reservation, compensating");
            release_with_retry(storage, showtime_id, 1).await;
            Err(e.into())
        }
    }
}

/// Issues a coupon against an active partner store. No inventory step.
#[tracing::instrument(skip(storage, discount_type))]
pub async fn grant_coupon(
    storage: &dyn Storage,
    owner_id: i64,
    store_id: i64,
    discount_type: String,
    discount_value: i32,
    expires_at: DateTime<Utc>,
) -> Result<(Subject, QrCredential), ServiceError> {
    let store = storage
        .fetch_store(store_id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    if !store.active {
        return Err(ServiceError::NotFound);
    }

    let pair = redemption_store::issue(
        storage,
        owner_id,
        SubjectRef::Discount {
            store_id,
            discount_type,
            discount_value,
        },
        expires_at,
    )
    .await?;

    Ok(pair)
}

/// Non-mutating pre-check for UI feedback. Gives no durability guarantee;
/// the scan path should call `redeem` directly.
pub async fn validate_code(storage: &dyn Storage, code: &str) -> Result<Validation, ServiceError> {
    let validation = redemption_store::validate(storage, code).await?;
    tracing::debug!(result = validation.result_type(), "code validated");
    Ok(validation)
}

/// Consumes the credential at the gate or counter. Exactly one concurrent
/// caller wins; the rest get `AlreadyUsed`.
pub async fn redeem(
    storage: &dyn Storage,
    kind: SubjectKind,
    subject_id: i64,
    caller_owner_id: i64,
) -> Result<QrCredential, ServiceError> {
    let credential = redemption_store::redeem(storage, kind, subject_id, caller_owner_id).await?;
    Ok(credential)
}

/// Rotates the QR secret of a VALID subject.
pub async fn reissue(
    storage: &dyn Storage,
    kind: SubjectKind,
    subject_id: i64,
) -> Result<(String, String), ServiceError> {
    let pair = redemption_store::reissue(storage, kind, subject_id).await?;
    Ok(pair)
}

/// Cancels a VALID subject. Cancelled tickets return their seat to the
/// pool; coupons have nothing to release.
#[tracing::instrument(skip(storage))]
pub async fn cancel(
    storage: &dyn Storage,
    kind: SubjectKind,
    subject_id: i64,
    caller_owner_id: i64,
) -> Result<Subject, ServiceError> {
    let subject = redemption_store::cancel(storage, kind, subject_id, caller_owner_id).await?;

    if let Some(showtime_id) = subject.showtime_id {
        release_with_retry(storage, showtime_id, 1).await;
    }

    Ok(subject)
}

/// At-least-once seat release. A seat stuck in "reserved" is a correctness
/// bug, so failures are retried and then escalated loudly rather than
/// swallowed.
async fn release_with_retry(storage: &dyn Storage, showtime_id: i64, count: i32) {
    for attempt in 1..=RELEASE_ATTEMPTS {
        match inventory::release_seats(storage, showtime_id, count).await {
            Ok(()) => return,
            Err(InventoryError::NotFound) => {
                // Nothing to release against; retrying cannot help.
                tracing::error!(showtime_id, "seat release target missing");
                return;
            }
            Err(e) => {
                tracing::warn!(showtime_id, attempt, error = %e, "seat release failed");
                tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
            }
        }
    }
    tracing::error!(
        showtime_id,
        count,
        "seat release failed after {RELEASE_ATTEMPTS} attempts; manual reconciliation required"
    );
}
