use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::credential::NewCredential;
use crate::models::subject::NewSubject;
use crate::models::{PartnerStore, QrCredential, Showtime, Subject, SubjectKind, SubjectStatus, User};
use crate::storage::{Storage, StorageError};

/// Production backend. All contended mutations are single conditional
/// UPDATE statements so Postgres row locking provides the linearizable
/// per-row ordering the core relies on; this holds across any number of
/// server instances sharing the database.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn fetch_user_by_token(&self, token: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users WHERE api_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn fetch_showtime(&self, id: i64) -> Result<Option<Showtime>, StorageError> {
        let showtime = sqlx::query_as::<_, Showtime>(
            r#"
            SELECT * FROM showtimes WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(showtime)
    }

    async fn fetch_store(&self, id: i64) -> Result<Option<PartnerStore>, StorageError> {
        let store = sqlx::query_as::<_, PartnerStore>(
            r#"
            SELECT * FROM partner_stores WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    async fn try_reserve_seats(
        &self,
        showtime_id: i64,
        count: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE showtimes
            SET available_seats = available_seats - $2, updated_at = NOW()
            WHERE id = $1
              AND active = TRUE
              AND show_time > $3
              AND available_seats >= $2
            "#,
        )
        .bind(showtime_id)
        .bind(count)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_seats(&self, showtime_id: i64, count: i32) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE showtimes
            SET available_seats = LEAST(available_seats + $2, total_seats),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(showtime_id)
        .bind(count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn next_subject_id(&self) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            SELECT nextval('redemption_subjects_id_seq')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_subject_with_credential(
        &self,
        subject: NewSubject,
        credential: NewCredential,
    ) -> Result<(Subject, QrCredential), StorageError> {
        let mut tx = self.pool.begin().await?;

        let subject = sqlx::query_as::<_, Subject>(
            r#"
            INSERT INTO redemption_subjects (
                id, kind, owner_id, showtime_id, seat_number,
                store_id, discount_type, discount_value, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'VALID')
            RETURNING *
            "#,
        )
        .bind(subject.id)
        .bind(subject.kind)
        .bind(subject.owner_id)
        .bind(subject.showtime_id)
        .bind(subject.seat_number)
        .bind(subject.store_id)
        .bind(&subject.discount_type)
        .bind(subject.discount_value)
        .fetch_one(&mut *tx)
        .await?;

        let credential = sqlx::query_as::<_, QrCredential>(
            r#"
            INSERT INTO qr_credentials (
                subject_id, subject_kind, code, image_b64, valid_until
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(credential.subject_id)
        .bind(credential.subject_kind)
        .bind(&credential.code)
        .bind(&credential.image_b64)
        .bind(credential.valid_until)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((subject, credential))
    }

    async fn fetch_subject(
        &self,
        kind: SubjectKind,
        id: i64,
    ) -> Result<Option<Subject>, StorageError> {
        let subject = sqlx::query_as::<_, Subject>(
            r#"
            SELECT * FROM redemption_subjects WHERE id = $1 AND kind = $2
            "#,
        )
        .bind(id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subject)
    }

    async fn fetch_credential_by_code(
        &self,
        code: &str,
    ) -> Result<Option<QrCredential>, StorageError> {
        let credential = sqlx::query_as::<_, QrCredential>(
            r#"
            SELECT * FROM qr_credentials WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn fetch_credential_for_subject(
        &self,
        kind: SubjectKind,
        subject_id: i64,
    ) -> Result<Option<QrCredential>, StorageError> {
        let credential = sqlx::query_as::<_, QrCredential>(
            r#"
            SELECT * FROM qr_credentials WHERE subject_id = $1 AND subject_kind = $2
            "#,
        )
        .bind(subject_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn mark_redeemed(
        &self,
        credential_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        // The conditional flip decides the race; everything after it only
        // runs for the single winner.
        let won: Option<(i64, SubjectKind)> = sqlx::query_as(
            r#"
            UPDATE qr_credentials
            SET used = TRUE, used_at = $2, updated_at = $2
            WHERE id = $1 AND used = FALSE
            RETURNING subject_id, subject_kind
            "#,
        )
        .bind(credential_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((subject_id, subject_kind)) = won else {
            tx.rollback().await?;
            return Ok(false);
        };

        // The subject transition is guarded too: if a cancel or the expiry
        // sweep moved the subject off VALID since the caller's read, the
        // flip above is rolled back rather than resurrecting the subject.
        let result = sqlx::query(
            r#"
            UPDATE redemption_subjects
            SET status = 'USED', updated_at = $3
            WHERE id = $1 AND kind = $2 AND status = 'VALID'
            "#,
        )
        .bind(subject_id)
        .bind(subject_kind)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;

        Ok(true)
    }

    async fn overwrite_credential(
        &self,
        credential_id: i64,
        code: &str,
        image_b64: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE qr_credentials
            SET code = $2, image_b64 = $3, used = FALSE, used_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(credential_id)
        .bind(code)
        .bind(image_b64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_subject_status_if(
        &self,
        kind: SubjectKind,
        id: i64,
        from: SubjectStatus,
        to: SubjectStatus,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE redemption_subjects
            SET status = $4, updated_at = NOW()
            WHERE id = $1 AND kind = $2 AND status = $3
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE redemption_subjects s
            SET status = 'EXPIRED', updated_at = $1
            FROM qr_credentials c
            WHERE c.subject_id = s.id
              AND c.subject_kind = s.kind
              AND s.status = 'VALID'
              AND c.valid_until <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
