use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use turnstile_api::{app, AppState};
use turnstile_core::{BookingRules, Clock, ManualClock};
use turnstile_store::seed::{demo_events, demo_seats};
use turnstile_store::{CatalogLoader, MemoryStore};

const EVENT: &str = "f1-gp-2025";

async fn test_app() -> (Router, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    store
        .load_catalog(&demo_events(), &demo_seats())
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::default());
    let state = AppState::new(store, clock.clone(), BookingRules::default()).unwrap();
    (app(state), clock)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn hold_seat(app: &Router, seat_id: &str, holder_id: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/v1/holds",
        Some(json!({ "event_id": EVENT, "seat_id": seat_id, "holder_id": holder_id })),
    )
    .await
}

#[tokio::test]
async fn test_hold_and_confirm_flow() {
    let (app, clock) = test_app().await;

    let (status, body) = hold_seat(&app, "D1-1", "user-1").await;
    assert_eq!(status, StatusCode::OK);
    let hold_id = body["hold_id"].as_str().unwrap().to_string();
    let expected_expiry = (clock.now() + Duration::minutes(10)).timestamp_millis();
    assert_eq!(body["expire_at"].as_i64().unwrap(), expected_expiry);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/holds/{hold_id}/confirm"),
        Some(json!({ "idempotency_key": "req-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["amount"], 104);
    assert_eq!(body["order"]["status"], "PAID");
    assert_eq!(body["ticket"]["seat_id"], "D1-1");
    assert_eq!(body["replayed"], false);
    let code = body["ticket"]["code"].as_str().unwrap().to_string();
    assert!(code.starts_with("TRN-"));

    let (_, seat_map) = send(&app, "GET", &format!("/v1/events/{EVENT}/seats?section=D"), None).await;
    let row = seat_map["inventory"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["seat_id"] == "D1-1")
        .unwrap()
        .clone();
    assert_eq!(row["status"], "SOLD");
    assert!(row["hold_id"].is_null());

    let (_, tickets) = send(&app, "GET", "/v1/holders/user-1/tickets", None).await;
    assert_eq!(tickets[0]["code"], code.as_str());
    let (_, orders) = send(&app, "GET", "/v1/holders/user-1/orders", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_confirm_retry_is_replayed() {
    let (app, _clock) = test_app().await;
    let (_, body) = hold_seat(&app, "A1-1", "user-1").await;
    let hold_id = body["hold_id"].as_str().unwrap().to_string();
    let uri = format!("/v1/holds/{hold_id}/confirm");

    let (_, first) = send(&app, "POST", &uri, Some(json!({ "idempotency_key": "req-1" }))).await;

    // Same key through the header this time.
    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("idempotency-key", "req-1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let second: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(second["replayed"], true);
    assert_eq!(first["order"]["id"], second["order"]["id"]);
    let (_, orders) = send(&app, "GET", "/v1/holders/user-1/orders", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_hold_on_seat_conflicts() {
    let (app, _clock) = test_app().await;

    let (status, _) = hold_seat(&app, "A1-2", "user-1").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = hold_seat(&app, "A1-2", "user-2").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "seat_unavailable");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_simultaneous_holds_one_winner() {
    let (app, _clock) = test_app().await;

    let (a, b) = tokio::join!(hold_seat(&app, "A1-3", "user-a"), hold_seat(&app, "A1-3", "user-b"));
    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);
}

#[tokio::test]
async fn test_confirm_after_expiry_is_gone() {
    let (app, clock) = test_app().await;
    let (_, body) = hold_seat(&app, "B1-1", "user-1").await;
    let hold_id = body["hold_id"].as_str().unwrap().to_string();

    clock.advance(Duration::minutes(11));
    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/holds/{hold_id}/confirm"),
        Some(json!({ "idempotency_key": "req-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "hold_expired");

    let (_, hold) = send(&app, "GET", &format!("/v1/holds/{hold_id}"), None).await;
    assert_eq!(hold["status"], "EXPIRED");
}

#[tokio::test]
async fn test_release_frees_seat_and_is_idempotent() {
    let (app, _clock) = test_app().await;
    let (_, body) = hold_seat(&app, "C1-1", "user-1").await;
    let hold_id = body["hold_id"].as_str().unwrap().to_string();
    let uri = format!("/v1/holds/{hold_id}/release");

    for _ in 0..2 {
        let (status, body) = send(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    let (status, _) = hold_seat(&app, "C1-1", "user-2").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bad_requests() {
    let (app, _clock) = test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/holds",
        Some(json!({ "event_id": EVENT, "holder_id": "user-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (_, body) = hold_seat(&app, "E1-1", "user-1").await;
    let hold_id = body["hold_id"].as_str().unwrap().to_string();
    let (status, body) = send(&app, "POST", &format!("/v1/holds/{hold_id}/confirm"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = send(&app, "GET", "/v1/events/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_multi_seat_hold_and_snapshot() {
    let (app, _clock) = test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/holds",
        Some(json!({ "event_id": EVENT, "seat_ids": ["A2-1", "A2-2"], "holder_id": "user-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let hold_id = body["hold_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/v1/holds",
        Some(json!({ "event_id": EVENT, "seat_ids": ["A2-3", "A2-2"], "holder_id": "user-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "seat_unavailable");

    let (_, snapshot) = send(&app, "GET", "/v1/admin/snapshot", None).await;
    assert_eq!(snapshot["metrics"]["held_seats"], 2);
    assert_eq!(snapshot["metrics"]["total_seats"], 400);
    assert_eq!(snapshot["active_holds"][0]["id"], hold_id.as_str());
}

#[tokio::test]
async fn test_events_health_and_metrics() {
    let (app, _clock) = test_app().await;

    let (status, events) = send(&app, "GET", "/v1/events", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.as_array().unwrap().len(), 2);

    let (_, event) = send(&app, "GET", &format!("/v1/events/{EVENT}"), None).await;
    assert_eq!(event["venue"], "Las Vegas Street Circuit");

    hold_seat(&app, "A3-1", "user-1").await;
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("turnstile_holds_created_total 1"));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
