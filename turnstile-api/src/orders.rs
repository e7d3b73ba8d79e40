use axum::{
    extract::{Path, State},
    Json,
};
use turnstile_shared::{Order, Ticket};

use crate::error::AppError;
use crate::state::AppState;

pub async fn list_orders(
    State(state): State<AppState>,
    Path(holder_id): Path<String>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.queries.orders_for(&holder_id).await?))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Path(holder_id): Path<String>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    Ok(Json(state.queries.tickets_for(&holder_id).await?))
}
