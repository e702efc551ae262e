use axum::Router;
use serde::Serialize;
use std::sync::Arc;

use crate::models::{QrCredential, Subject, SubjectKind, SubjectStatus};
use crate::storage::Storage;

pub mod auth;
pub mod coupons;
pub mod health;
pub mod redemptions;
pub mod subjects;
pub mod tickets;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

/// The full operation surface; state is attached by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(tickets::router())
        .merge(coupons::router())
        .merge(redemptions::router())
        .merge(subjects::router())
}

/// Response body for both issuance endpoints: the new subject plus the
/// scannable credential.
#[derive(Debug, Serialize)]
pub struct IssuedResponse {
    pub id: i64,
    pub kind: SubjectKind,
    pub status: SubjectStatus,
    pub code: String,
    pub qr_image_b64: String,
    pub valid_until: chrono::DateTime<chrono::Utc>,
}

impl IssuedResponse {
    pub fn from_parts(subject: &Subject, credential: &QrCredential) -> Self {
        Self {
            id: subject.id,
            kind: subject.kind,
            status: subject.status,
            code: credential.code.clone(),
            qr_image_b64: credential.image_b64.clone(),
            valid_until: credential.valid_until,
        }
    }
}
