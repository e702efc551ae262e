use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{auth, AppState};
use crate::error::AppError;
use crate::models::SubjectKind;
use crate::services::redemption;
use crate::services::redemption_store::Validation;

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    code: String,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<SubjectKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_id: Option<i64>,
    result: &'static str,
}

/// Read-only scan pre-check. Always 200; the `ok` flag carries the verdict.
/// Well-formed but unknown, used, expired or superseded codes all come back
/// `ok = false` without distinguishing detail beyond the result tag.
async fn validate_code(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, AppError> {
    let validation = redemption::validate_code(state.storage.as_ref(), &req.code).await?;

    let response = match &validation {
        Validation::Valid { kind, subject_id } => ValidateResponse {
            ok: true,
            kind: Some(*kind),
            subject_id: Some(*subject_id),
            result: validation.result_type(),
        },
        Validation::Invalid { .. } => ValidateResponse {
            ok: false,
            kind: None,
            subject_id: None,
            result: validation.result_type(),
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct RedeemRequest {
    kind: SubjectKind,
    subject_id: i64,
}

#[derive(Debug, Serialize)]
struct RedeemResponse {
    redeemed: bool,
    used_at: Option<DateTime<Utc>>,
}

/// The durable mark-used step. Exactly one of any number of concurrent
/// calls for the same subject succeeds.
async fn redeem(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, AppError> {
    let user = auth::authenticate(&state, &headers).await?;

    let credential =
        redemption::redeem(state.storage.as_ref(), req.kind, req.subject_id, user.id).await?;

    Ok(Json(RedeemResponse {
        redeemed: true,
        used_at: credential.used_at,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/redemptions/validate", post(validate_code))
        .route("/redemptions/redeem", post(redeem))
}
