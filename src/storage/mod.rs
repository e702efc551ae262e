//! Storage seam for the redemption core.
//!
//! The ledger and the redemption store never do read-then-write from the
//! caller side: every contended mutation is expressed here as a single
//! conditional update ("decrement if enough seats", "flip used if unused")
//! so the backend can make it atomic at the row level. `PgStorage` is the
//! production backend; `MemoryStorage` applies the same conditional
//! semantics under one lock and backs the property tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::credential::NewCredential;
use crate::models::subject::NewSubject;
use crate::models::{PartnerStore, QrCredential, Showtime, Subject, SubjectKind, SubjectStatus, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Storage: Send + Sync {
    // --- identity and catalog boundaries (read-only) ---

    async fn fetch_user_by_token(&self, token: &str) -> Result<Option<User>, StorageError>;

    async fn fetch_showtime(&self, id: i64) -> Result<Option<Showtime>, StorageError>;

    async fn fetch_store(&self, id: i64) -> Result<Option<PartnerStore>, StorageError>;

    // --- inventory ledger primitives ---

    /// Decrements `available_seats` by `count` iff the showtime is active,
    /// starts after `now` and has at least `count` seats left. Returns
    /// whether the decrement happened. Atomic with respect to concurrent
    /// reservations on the same row.
    async fn try_reserve_seats(
        &self,
        showtime_id: i64,
        count: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Increments `available_seats` by `count`, clamped at `total_seats`.
    /// Returns false when the showtime does not exist.
    async fn release_seats(&self, showtime_id: i64, count: i32) -> Result<bool, StorageError>;

    // --- redemption store primitives ---

    /// Allocates the next subject id. Ids are handed out before insert so
    /// the redemption code, which embeds the id, can be generated first.
    async fn next_subject_id(&self) -> Result<i64, StorageError>;

    /// Creates the subject (status VALID) and its credential together.
    /// Either both rows exist afterwards or neither does.
    async fn insert_subject_with_credential(
        &self,
        subject: NewSubject,
        credential: NewCredential,
    ) -> Result<(Subject, QrCredential), StorageError>;

    async fn fetch_subject(
        &self,
        kind: SubjectKind,
        id: i64,
    ) -> Result<Option<Subject>, StorageError>;

    async fn fetch_credential_by_code(
        &self,
        code: &str,
    ) -> Result<Option<QrCredential>, StorageError>;

    async fn fetch_credential_for_subject(
        &self,
        kind: SubjectKind,
        subject_id: i64,
    ) -> Result<Option<QrCredential>, StorageError>;

    /// The exactly-once flip: sets `used = true` iff it is still false AND
    /// the owning subject is still VALID, transitioning the subject to USED
    /// in the same atomic step. Returns false when another caller already
    /// won the race or the subject left VALID (cancel, expiry sweep).
    async fn mark_redeemed(
        &self,
        credential_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Replaces code and image on the credential row in place and resets
    /// `used`/`used_at`, so the previous code can never validate again.
    /// Returns false when the credential does not exist.
    async fn overwrite_credential(
        &self,
        credential_id: i64,
        code: &str,
        image_b64: &str,
    ) -> Result<bool, StorageError>;

    /// Conditional status transition: `from` -> `to` iff the subject is
    /// currently in `from`. Returns whether the transition happened, which
    /// is what makes CANCELLED get set exactly once.
    async fn set_subject_status_if(
        &self,
        kind: SubjectKind,
        id: i64,
        from: SubjectStatus,
        to: SubjectStatus,
    ) -> Result<bool, StorageError>;

    /// Expires every VALID subject whose credential's `valid_until` is at or
    /// before `now`. Returns the number of subjects transitioned.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}
