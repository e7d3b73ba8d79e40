use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use turnstile_core::BookingError;
use turnstile_shared::{Hold, Order, Ticket};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub event_id: String,
    pub seat_id: Option<String>,
    pub seat_ids: Option<Vec<String>>,
    pub holder_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateHoldResponse {
    pub hold_id: Uuid,
    /// Epoch milliseconds.
    pub expire_at: i64,
}

#[derive(Debug, Serialize)]
pub struct ReleaseHoldResponse {
    pub ok: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmHoldRequest {
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmHoldResponse {
    pub ticket: Ticket,
    pub tickets: Vec<Ticket>,
    pub order: Order,
    pub replayed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_hold(
    State(state): State<AppState>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<Json<CreateHoldResponse>, AppError> {
    let seat_ids = match (req.seat_id, req.seat_ids) {
        (Some(seat_id), None) => vec![seat_id],
        (None, Some(seat_ids)) => seat_ids,
        _ => {
            return Err(AppError::BadRequest(
                "provide exactly one of seat_id or seat_ids".to_string(),
            ))
        }
    };

    match state
        .holds
        .create_hold_for_seats(&req.event_id, &seat_ids, &req.holder_id)
        .await
    {
        Ok(hold) => {
            state.metrics.holds_created.inc();
            Ok(Json(CreateHoldResponse {
                hold_id: hold.id,
                expire_at: hold.expire_at.timestamp_millis(),
            }))
        }
        Err(err) => {
            if matches!(err, BookingError::SeatUnavailable { .. }) {
                state.metrics.hold_conflicts.inc();
            }
            Err(err.into())
        }
    }
}

pub async fn get_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
) -> Result<Json<Hold>, AppError> {
    Ok(Json(state.queries.hold(hold_id).await?))
}

pub async fn release_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
) -> Result<Json<ReleaseHoldResponse>, AppError> {
    if state.holds.release_hold(hold_id).await? {
        state.metrics.holds_released.inc();
    }
    Ok(Json(ReleaseHoldResponse { ok: true }))
}

/// The idempotency key comes from the JSON body or the `Idempotency-Key`
/// header; the body wins when both are present.
pub async fn confirm_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ConfirmHoldResponse>, AppError> {
    let req: ConfirmHoldRequest = if body.is_empty() {
        ConfirmHoldRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let key = req
        .idempotency_key
        .or_else(|| {
            headers
                .get(IDEMPOTENCY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let settlement = match state.settlement.confirm_hold(hold_id, &key).await {
        Ok(settlement) => settlement,
        Err(err) => {
            let outcome = match &err {
                BookingError::HoldExpired(_) => "hold_expired",
                BookingError::IdempotencyConflict { .. } => "idempotency_conflict",
                BookingError::ConsistencyFault { .. } => {
                    state.metrics.consistency_faults.inc();
                    "consistency_fault"
                }
                _ => "error",
            };
            state.metrics.record_settlement(outcome);
            return Err(AppError::from(err)
                .with_retry_hint("Temporarily unavailable; safe to retry with the same idempotency key"));
        }
    };

    state
        .metrics
        .record_settlement(if settlement.replayed { "replayed" } else { "committed" });

    let ticket = settlement
        .tickets
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("order {} has no tickets", settlement.order.id))?;
    Ok(Json(ConfirmHoldResponse {
        ticket,
        tickets: settlement.tickets,
        order: settlement.order,
        replayed: settlement.replayed,
    }))
}
