use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::api::{auth, AppState, IssuedResponse};
use crate::error::AppError;
use crate::services::redemption;

#[derive(Debug, Deserialize)]
struct PurchaseTicketRequest {
    showtime_id: i64,
    seat_number: i32,
}

/// Buys one seat on a showtime and returns the ticket with its QR
/// credential. Overselling is refused with 409.
async fn purchase_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PurchaseTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth::authenticate(&state, &headers).await?;

    let (subject, credential) = redemption::purchase_ticket(
        state.storage.as_ref(),
        user.id,
        req.showtime_id,
        req.seat_number,
    )
    .await?;

    tracing::info!(ticket_id = subject.id, owner_id = user.id, "ticket purchased");

    Ok((
        StatusCode::CREATED,
        Json(IssuedResponse::from_parts(&subject, &credential)),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/tickets", post(purchase_ticket))
}
