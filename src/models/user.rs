use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Resolved identity from the user directory. The core trusts this record
/// for ownership checks; it never reads ambient session state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
