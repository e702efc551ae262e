use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::credential::NewCredential;
use crate::models::subject::NewSubject;
use crate::models::{PartnerStore, QrCredential, Showtime, Subject, SubjectKind, SubjectStatus, User};
use crate::storage::{Storage, StorageError};

/// In-memory backend with the same conditional-update semantics as
/// `PgStorage`: every mutation checks its guard and applies its write under
/// one lock hold, so the exactly-once and no-oversell contracts hold under
/// concurrent tasks. Used by the test suite and for running the server
/// without a database.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    stores: HashMap<i64, PartnerStore>,
    showtimes: HashMap<i64, Showtime>,
    subjects: HashMap<(SubjectKind, i64), Subject>,
    credentials: HashMap<i64, QrCredential>,
    code_index: HashMap<String, i64>,
    subject_index: HashMap<(SubjectKind, i64), i64>,
    next_subject_id: i64,
    next_row_id: i64,
}

impl Inner {
    fn next_row_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, display_name: &str, api_token: &str, role: &str) -> User {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let user = User {
            id: inner.next_row_id(),
            display_name: display_name.to_string(),
            api_token: api_token.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    pub fn seed_store(&self, name: &str, active: bool) -> PartnerStore {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let store = PartnerStore {
            id: inner.next_row_id(),
            name: name.to_string(),
            active,
            created_at: Utc::now(),
        };
        inner.stores.insert(store.id, store.clone());
        store
    }

    pub fn seed_showtime(
        &self,
        movie_id: i64,
        hall: &str,
        show_time: DateTime<Utc>,
        total_seats: i32,
        active: bool,
    ) -> Showtime {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let now = Utc::now();
        let showtime = Showtime {
            id: inner.next_row_id(),
            movie_id,
            hall: hall.to_string(),
            show_time,
            total_seats,
            available_seats: total_seats,
            active,
            created_at: now,
            updated_at: now,
        };
        inner.showtimes.insert(showtime.id, showtime.clone());
        showtime
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch_user_by_token(&self, token: &str) -> Result<Option<User>, StorageError> {
        let inner = self.inner.lock().expect("storage lock poisoned");
        Ok(inner.users.values().find(|u| u.api_token == token).cloned())
    }

    async fn fetch_showtime(&self, id: i64) -> Result<Option<Showtime>, StorageError> {
        let inner = self.inner.lock().expect("storage lock poisoned");
        Ok(inner.showtimes.get(&id).cloned())
    }

    async fn fetch_store(&self, id: i64) -> Result<Option<PartnerStore>, StorageError> {
        let inner = self.inner.lock().expect("storage lock poisoned");
        Ok(inner.stores.get(&id).cloned())
    }

    async fn try_reserve_seats(
        &self,
        showtime_id: i64,
        count: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let Some(showtime) = inner.showtimes.get_mut(&showtime_id) else {
            return Ok(false);
        };
        if !showtime.active || showtime.show_time <= now || showtime.available_seats < count {
            return Ok(false);
        }
        showtime.available_seats -= count;
        showtime.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_seats(&self, showtime_id: i64, count: i32) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let Some(showtime) = inner.showtimes.get_mut(&showtime_id) else {
            return Ok(false);
        };
        showtime.available_seats = (showtime.available_seats + count).min(showtime.total_seats);
        showtime.updated_at = Utc::now();
        Ok(true)
    }

    async fn next_subject_id(&self) -> Result<i64, StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        inner.next_subject_id += 1;
        Ok(inner.next_subject_id)
    }

    async fn insert_subject_with_credential(
        &self,
        subject: NewSubject,
        credential: NewCredential,
    ) -> Result<(Subject, QrCredential), StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let now = Utc::now();

        let subject = Subject {
            id: subject.id,
            kind: subject.kind,
            owner_id: subject.owner_id,
            showtime_id: subject.showtime_id,
            seat_number: subject.seat_number,
            store_id: subject.store_id,
            discount_type: subject.discount_type,
            discount_value: subject.discount_value,
            status: SubjectStatus::Valid,
            created_at: now,
            updated_at: now,
        };

        let credential = QrCredential {
            id: inner.next_row_id(),
            subject_id: credential.subject_id,
            subject_kind: credential.subject_kind,
            code: credential.code,
            image_b64: credential.image_b64,
            valid_until: credential.valid_until,
            used: false,
            used_at: None,
            created_at: now,
            updated_at: now,
        };

        inner
            .subjects
            .insert((subject.kind, subject.id), subject.clone());
        inner
            .code_index
            .insert(credential.code.clone(), credential.id);
        inner
            .subject_index
            .insert((credential.subject_kind, credential.subject_id), credential.id);
        inner.credentials.insert(credential.id, credential.clone());

        Ok((subject, credential))
    }

    async fn fetch_subject(
        &self,
        kind: SubjectKind,
        id: i64,
    ) -> Result<Option<Subject>, StorageError> {
        let inner = self.inner.lock().expect("storage lock poisoned");
        Ok(inner.subjects.get(&(kind, id)).cloned())
    }

    async fn fetch_credential_by_code(
        &self,
        code: &str,
    ) -> Result<Option<QrCredential>, StorageError> {
        let inner = self.inner.lock().expect("storage lock poisoned");
        let id = inner.code_index.get(code);
        Ok(id.and_then(|id| inner.credentials.get(id)).cloned())
    }

    async fn fetch_credential_for_subject(
        &self,
        kind: SubjectKind,
        subject_id: i64,
    ) -> Result<Option<QrCredential>, StorageError> {
        let inner = self.inner.lock().expect("storage lock poisoned");
        let id = inner.subject_index.get(&(kind, subject_id));
        Ok(id.and_then(|id| inner.credentials.get(id)).cloned())
    }

    async fn mark_redeemed(
        &self,
        credential_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let Some(credential) = inner.credentials.get(&credential_id) else {
            return Ok(false);
        };
        if credential.used {
            return Ok(false);
        }
        let key = (credential.subject_kind, credential.subject_id);

        // Both guards pass before either write: a subject a cancel or the
        // expiry sweep already moved off VALID must not come back as USED.
        match inner.subjects.get(&key) {
            Some(subject) if subject.status == SubjectStatus::Valid => {}
            _ => return Ok(false),
        }

        let credential = inner
            .credentials
            .get_mut(&credential_id)
            .expect("credential checked above");
        credential.used = true;
        credential.used_at = Some(now);
        credential.updated_at = now;

        let subject = inner.subjects.get_mut(&key).expect("subject checked above");
        subject.status = SubjectStatus::Used;
        subject.updated_at = now;
        Ok(true)
    }

    async fn overwrite_credential(
        &self,
        credential_id: i64,
        code: &str,
        image_b64: &str,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let Some(mut credential) = inner.credentials.remove(&credential_id) else {
            return Ok(false);
        };
        inner.code_index.remove(&credential.code);

        credential.code = code.to_string();
        credential.image_b64 = image_b64.to_string();
        credential.used = false;
        credential.used_at = None;
        credential.updated_at = Utc::now();

        inner.code_index.insert(credential.code.clone(), credential.id);
        inner.credentials.insert(credential.id, credential);
        Ok(true)
    }

    async fn set_subject_status_if(
        &self,
        kind: SubjectKind,
        id: i64,
        from: SubjectStatus,
        to: SubjectStatus,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let Some(subject) = inner.subjects.get_mut(&(kind, id)) else {
            return Ok(false);
        };
        if subject.status != from {
            return Ok(false);
        }
        subject.status = to;
        subject.updated_at = Utc::now();
        Ok(true)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut inner = self.inner.lock().expect("storage lock poisoned");
        let overdue: Vec<(SubjectKind, i64)> = inner
            .credentials
            .values()
            .filter(|c| c.valid_until <= now)
            .map(|c| (c.subject_kind, c.subject_id))
            .collect();

        let mut expired = 0;
        for key in overdue {
            if let Some(subject) = inner.subjects.get_mut(&key) {
                if subject.status == SubjectStatus::Valid {
                    subject.status = SubjectStatus::Expired;
                    subject.updated_at = now;
                    expired += 1;
                }
            }
        }
        Ok(expired)
    }
}
