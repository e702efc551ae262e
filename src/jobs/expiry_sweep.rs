//! Scheduled housekeeping: transition overdue VALID subjects to EXPIRED.
//!
//! Runs outside the core on a cron schedule. Redemption is correct without
//! it (expiry is re-checked on every validate/redeem against the stored
//! credential), so a failed sweep run is logged and retried on the next
//! tick rather than escalated.

use chrono::Utc;

use crate::services::redemption_store;
use crate::storage::Storage;

pub async fn run(storage: &dyn Storage) {
    match redemption_store::expire_overdue(storage, Utc::now()).await {
        Ok(expired) => {
            tracing::debug!(expired, "expiry sweep completed");
        }
        Err(e) => {
            tracing::error!(error = %e, "expiry sweep failed");
        }
    }
}
