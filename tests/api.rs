//! HTTP surface tests: the axum router wired to the in-memory backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use gatepass::api::{self, AppState};
use gatepass::storage::{MemoryStorage, Storage};

fn app(storage: Arc<MemoryStorage>) -> axum::Router {
    api::router().with_state(AppState { storage })
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let storage = Arc::new(MemoryStorage::new());
    let response = app(storage)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mutations_require_authentication() {
    let storage = Arc::new(MemoryStorage::new());
    let showtime = storage.seed_showtime(1, "A", Utc::now() + Duration::hours(1), 10, true);

    let request = post(
        "/tickets",
        None,
        json!({ "showtime_id": showtime.id, "seat_number": 1 }),
    );
    let response = app(storage.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Nothing was reserved.
    let after = storage.fetch_showtime(showtime.id).await.unwrap().unwrap();
    assert_eq!(after.available_seats, 10);
}

#[tokio::test]
async fn ticket_purchase_and_redemption_flow() {
    let storage = Arc::new(MemoryStorage::new());
    let user = storage.seed_user("Alice", "token-alice", "member");
    let showtime = storage.seed_showtime(1, "A", Utc::now() + Duration::hours(1), 10, true);

    // Purchase
    let response = app(storage.clone())
        .oneshot(post(
            "/tickets",
            Some(&user.api_token),
            json!({ "showtime_id": showtime.id, "seat_number": 4 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let issued = body_json(response).await;
    assert_eq!(issued["kind"], "ticket");
    assert_eq!(issued["status"], "valid");
    let ticket_id = issued["id"].as_i64().unwrap();
    let code = issued["code"].as_str().unwrap().to_string();
    assert!(!issued["qr_image_b64"].as_str().unwrap().is_empty());

    // Pre-check the code
    let response = app(storage.clone())
        .oneshot(post("/redemptions/validate", None, json!({ "code": code })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let validation = body_json(response).await;
    assert_eq!(validation["ok"], true);
    assert_eq!(validation["kind"], "ticket");
    assert_eq!(validation["subject_id"], ticket_id);

    // Redeem at the gate
    let response = app(storage.clone())
        .oneshot(post(
            "/redemptions/redeem",
            Some(&user.api_token),
            json!({ "kind": "ticket", "subject_id": ticket_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Second redemption is refused
    let response = app(storage.clone())
        .oneshot(post(
            "/redemptions/redeem",
            Some(&user.api_token),
            json!({ "kind": "ticket", "subject_id": ticket_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // And the code no longer validates
    let response = app(storage.clone())
        .oneshot(post("/redemptions/validate", None, json!({ "code": code })))
        .await
        .unwrap();
    let validation = body_json(response).await;
    assert_eq!(validation["ok"], false);
}

#[tokio::test]
async fn sold_out_showtime_returns_conflict() {
    let storage = Arc::new(MemoryStorage::new());
    let user = storage.seed_user("Alice", "token-alice", "member");
    let showtime = storage.seed_showtime(1, "A", Utc::now() + Duration::hours(1), 1, true);

    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let response = app(storage.clone())
            .oneshot(post(
                "/tickets",
                Some(&user.api_token),
                json!({ "showtime_id": showtime.id, "seat_number": 1 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn coupon_reissue_and_cancel_flow() {
    let storage = Arc::new(MemoryStorage::new());
    let user = storage.seed_user("Alice", "token-alice", "member");
    let store = storage.seed_store("Popcorn Plus", true);

    let response = app(storage.clone())
        .oneshot(post(
            "/coupons",
            Some(&user.api_token),
            json!({
                "store_id": store.id,
                "discount_type": "percent",
                "discount_value": 15,
                "expires_at": Utc::now() + Duration::days(30),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let issued = body_json(response).await;
    let coupon_id = issued["id"].as_i64().unwrap();
    let old_code = issued["code"].as_str().unwrap().to_string();

    // Rotate the secret
    let response = app(storage.clone())
        .oneshot(post(
            &format!("/subjects/coupon/{coupon_id}/reissue"),
            Some(&user.api_token),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reissued = body_json(response).await;
    assert_ne!(reissued["code"].as_str().unwrap(), old_code);

    // The superseded code is dead
    let response = app(storage.clone())
        .oneshot(post("/redemptions/validate", None, json!({ "code": old_code })))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["ok"], false);

    // Cancel the coupon
    let response = app(storage.clone())
        .oneshot(post(
            &format!("/subjects/coupon/{coupon_id}/cancel"),
            Some(&user.api_token),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");
}

#[tokio::test]
async fn foreign_subject_redemption_is_forbidden() {
    let storage = Arc::new(MemoryStorage::new());
    let alice = storage.seed_user("Alice", "token-alice", "member");
    let bob = storage.seed_user("Bob", "token-bob", "member");
    let store = storage.seed_store("Candy Corner", true);

    let response = app(storage.clone())
        .oneshot(post(
            "/coupons",
            Some(&alice.api_token),
            json!({
                "store_id": store.id,
                "discount_type": "amount",
                "discount_value": 100,
                "expires_at": Utc::now() + Duration::days(7),
            }),
        ))
        .await
        .unwrap();
    let coupon_id = body_json(response).await["id"].as_i64().unwrap();

    let response = app(storage.clone())
        .oneshot(post(
            "/redemptions/redeem",
            Some(&bob.api_token),
            json!({ "kind": "coupon", "subject_id": coupon_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn error_bodies_carry_stable_tags() {
    let storage = Arc::new(MemoryStorage::new());
    let user = storage.seed_user("Alice", "token-alice", "member");
    let showtime = storage.seed_showtime(1, "A", Utc::now() + Duration::hours(1), 1, true);

    let response = app(storage.clone())
        .oneshot(post(
            "/tickets",
            None,
            json!({ "showtime_id": showtime.id, "seat_number": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthenticated");

    let response = app(storage.clone())
        .oneshot(post(
            "/tickets",
            Some(&user.api_token),
            json!({ "showtime_id": showtime.id, "seat_number": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app(storage.clone())
        .oneshot(post(
            "/tickets",
            Some(&user.api_token),
            json!({ "showtime_id": showtime.id, "seat_number": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "seat_unavailable");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn unknown_subject_kind_in_path_is_not_found() {
    let storage = Arc::new(MemoryStorage::new());
    let user = storage.seed_user("Alice", "token-alice", "member");

    let response = app(storage)
        .oneshot(post(
            "/subjects/voucher/1/cancel",
            Some(&user.api_token),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
