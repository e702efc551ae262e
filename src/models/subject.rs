use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// What a QR credential grants redemption rights over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Ticket,
    Coupon,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Ticket => "TICKET",
            SubjectKind::Coupon => "COUPON",
        }
    }

    /// Short tag embedded as the first field of a redemption code.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            SubjectKind::Ticket => "TKT",
            SubjectKind::Coupon => "CPN",
        }
    }

    pub fn from_code_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "TKT" => Some(SubjectKind::Ticket),
            "CPN" => Some(SubjectKind::Coupon),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unrecognized subject kind: {0}")]
pub struct ParseSubjectKindError(String);

impl FromStr for SubjectKind {
    type Err = ParseSubjectKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TICKET" => Ok(SubjectKind::Ticket),
            "COUPON" => Ok(SubjectKind::Coupon),
            other => Err(ParseSubjectKindError(other.to_string())),
        }
    }
}

/// Lifecycle state of a ticket or coupon.
///
/// USED and CANCELLED are terminal. VALID -> EXPIRED is walked back only by
/// an explicit reissue of the credential, never implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStatus {
    Valid,
    Used,
    Expired,
    Cancelled,
}

impl SubjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::Valid => "VALID",
            SubjectStatus::Used => "USED",
            SubjectStatus::Expired => "EXPIRED",
            SubjectStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unrecognized subject status: {0}")]
pub struct ParseSubjectStatusError(String);

impl FromStr for SubjectStatus {
    type Err = ParseSubjectStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALID" => Ok(SubjectStatus::Valid),
            "USED" => Ok(SubjectStatus::Used),
            "EXPIRED" => Ok(SubjectStatus::Expired),
            "CANCELLED" => Ok(SubjectStatus::Cancelled),
            other => Err(ParseSubjectStatusError(other.to_string())),
        }
    }
}

/// A redeemable ticket or coupon.
///
/// Tickets carry `showtime_id` + `seat_number`; coupons carry `store_id` +
/// discount terms. Rows are never deleted, only soft-retired through
/// `status`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub id: i64,
    pub kind: SubjectKind,
    pub owner_id: i64,
    pub showtime_id: Option<i64>,
    pub seat_number: Option<i32>,
    pub store_id: Option<i64>,
    pub discount_type: Option<String>,
    pub discount_value: Option<i32>,
    pub status: SubjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a subject row about to be created. The id is allocated up
/// front so the redemption code can embed it.
#[derive(Debug, Clone)]
pub struct NewSubject {
    pub id: i64,
    pub kind: SubjectKind,
    pub owner_id: i64,
    pub showtime_id: Option<i64>,
    pub seat_number: Option<i32>,
    pub store_id: Option<i64>,
    pub discount_type: Option<String>,
    pub discount_value: Option<i32>,
}

// The kind/status columns are plain TEXT; delegate the sqlx plumbing to
// &str so runtime query_as decoding stays compatible with TEXT/VARCHAR.

macro_rules! text_column {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                Ok(text.parse()?)
            }
        }
    };
}

text_column!(SubjectKind);
text_column!(SubjectStatus);
