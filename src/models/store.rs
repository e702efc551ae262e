use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A partner store that accepts coupons. Catalog data, read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PartnerStore {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
