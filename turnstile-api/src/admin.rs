use axum::{extract::State, Json};
use turnstile_order::AdminSnapshot;

use crate::error::AppError;
use crate::state::AppState;

/// Unauthenticated; deploy behind an internal network boundary.
pub async fn snapshot(State(state): State<AppState>) -> Result<Json<AdminSnapshot>, AppError> {
    Ok(Json(state.queries.admin_snapshot().await?))
}
