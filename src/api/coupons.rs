use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::{auth, AppState, IssuedResponse};
use crate::error::AppError;
use crate::services::redemption;

#[derive(Debug, Deserialize)]
struct GrantCouponRequest {
    store_id: i64,
    discount_type: String,
    discount_value: i32,
    expires_at: DateTime<Utc>,
}

/// Grants a discount coupon for an active partner store.
async fn grant_coupon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GrantCouponRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth::authenticate(&state, &headers).await?;

    let (subject, credential) = redemption::grant_coupon(
        state.storage.as_ref(),
        user.id,
        req.store_id,
        req.discount_type,
        req.discount_value,
        req.expires_at,
    )
    .await?;

    tracing::info!(coupon_id = subject.id, owner_id = user.id, "coupon granted");

    Ok((
        StatusCode::CREATED,
        Json(IssuedResponse::from_parts(&subject, &credential)),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/coupons", post(grant_coupon))
}
