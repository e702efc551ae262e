use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::api::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
