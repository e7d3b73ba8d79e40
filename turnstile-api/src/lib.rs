use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod error;
pub mod events;
pub mod holds;
pub mod metrics;
pub mod orders;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::USER_AGENT,
            HeaderName::from_static(holds::IDEMPOTENCY_HEADER),
        ]);

    let api = Router::new()
        .route("/v1/events", get(events::list_events))
        .route("/v1/events/{event_id}", get(events::get_event))
        .route("/v1/events/{event_id}/seats", get(events::seat_map))
        .route("/v1/events/{event_id}/stream", get(events::stream_inventory))
        .route("/v1/holds", post(holds::create_hold))
        .route("/v1/holds/{hold_id}", get(holds::get_hold))
        .route("/v1/holds/{hold_id}/release", post(holds::release_hold))
        .route("/v1/holds/{hold_id}/confirm", post(holds::confirm_hold))
        .route("/v1/holders/{holder_id}/orders", get(orders::list_orders))
        .route("/v1/holders/{holder_id}/tickets", get(orders::list_tickets))
        .route("/v1/admin/snapshot", get(admin::snapshot));

    let api = if state.redis.is_some() {
        api.layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
    } else {
        api
    };

    Router::new()
        .merge(api)
        .route("/health", get(|| async { "ok" }))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("ratelimit:{}", ip);

    match redis
        .check_rate_limit(&key, state.rate_limit.requests, state.rate_limit.window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "Rate limit exceeded",
                "retryable": true,
            })),
        )
            .into_response(),
        Err(err) => {
            // Fail open
            tracing::warn!(error = %err, "Rate limiter unavailable");
            next.run(req).await
        }
    }
}
