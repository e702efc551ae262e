//! Identity boundary: opaque bearer token -> resolved user.
//!
//! Every mutating handler resolves identity first, so an unauthenticated
//! call stops before any state changes. The resolved id is passed
//! explicitly into the core; nothing below this layer reads ambient state.

use axum::http::{header, HeaderMap};

use crate::api::AppState;
use crate::error::AppError;
use crate::models::User;

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    state
        .storage
        .fetch_user_by_token(token)
        .await?
        .ok_or(AppError::Unauthenticated)
}
