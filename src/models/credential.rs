use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::subject::SubjectKind;

/// The single live QR secret bound to a subject.
///
/// Reissue overwrites `code`, `image_b64`, `used` and `used_at` on the same
/// row, so a superseded code can never validate again. The credential table
/// is the sole source of truth for codes; there is no side cache.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QrCredential {
    pub id: i64,
    pub subject_id: i64,
    pub subject_kind: SubjectKind,
    pub code: String,
    pub image_b64: String,
    pub valid_until: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QrCredential {
    /// A credential admits redemption only while unused and unexpired.
    /// The stored `valid_until` is authoritative, never the copy embedded
    /// in the code string.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.valid_until > now
    }
}

#[derive(Debug, Clone)]
pub struct NewCredential {
    pub subject_id: i64,
    pub subject_kind: SubjectKind,
    pub code: String,
    pub image_b64: String,
    pub valid_until: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential(used: bool, expires_in_mins: i64) -> QrCredential {
        let now = Utc::now();
        QrCredential {
            id: 1,
            subject_id: 9,
            subject_kind: SubjectKind::Ticket,
            code: "TKT-1700000000-00000009-aB3dE5gH-20261231".to_string(),
            image_b64: String::new(),
            valid_until: now + Duration::minutes(expires_in_mins),
            used,
            used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_live_at() {
        let now = Utc::now();
        assert!(credential(false, 10).is_live_at(now));
        assert!(!credential(true, 10).is_live_at(now));
        assert!(!credential(false, -10).is_live_at(now));
    }
}
