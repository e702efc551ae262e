use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::api::{auth, AppState};
use crate::error::AppError;
use crate::models::{SubjectKind, SubjectStatus};
use crate::services::redemption;

fn parse_kind(kind: &str) -> Result<SubjectKind, AppError> {
    kind.parse().map_err(|_| AppError::NotFound)
}

#[derive(Debug, Serialize)]
struct ReissueResponse {
    code: String,
    qr_image_b64: String,
}

/// Rotates the QR secret for a VALID subject. The superseded code stops
/// validating the moment this returns.
async fn reissue(
    State(state): State<AppState>,
    Path((kind, subject_id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<ReissueResponse>, AppError> {
    auth::authenticate(&state, &headers).await?;
    let kind = parse_kind(&kind)?;

    let (code, qr_image_b64) = redemption::reissue(state.storage.as_ref(), kind, subject_id).await?;

    Ok(Json(ReissueResponse { code, qr_image_b64 }))
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    id: i64,
    status: SubjectStatus,
}

/// Cancels a VALID subject the caller owns. A cancelled ticket's seat goes
/// back into the pool.
async fn cancel(
    State(state): State<AppState>,
    Path((kind, subject_id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<CancelResponse>, AppError> {
    let user = auth::authenticate(&state, &headers).await?;
    let kind = parse_kind(&kind)?;

    let subject = redemption::cancel(state.storage.as_ref(), kind, subject_id, user.id).await?;

    Ok(Json(CancelResponse {
        id: subject.id,
        status: subject.status,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subjects/:kind/:id/reissue", post(reissue))
        .route("/subjects/:kind/:id/cancel", post(cancel))
}
