use axum::{
    extract::{Path, Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use turnstile_order::{SeatMap, SeatMapFilters};
use turnstile_shared::Event;

use crate::error::AppError;
use crate::state::AppState;

pub async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(state.queries.events().await?))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(state.queries.event(&event_id).await?))
}

pub async fn seat_map(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(filters): Query<SeatMapFilters>,
) -> Result<Json<SeatMap>, AppError> {
    Ok(Json(state.queries.seat_map(&event_id, &filters).await?))
}

/// Live seat changes for one event as server-sent events named `inventory`.
/// Slow subscribers skip what they missed and should refetch the seat map.
pub async fn stream_inventory(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::Error>>> {
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event_id = event_id.clone();
        async move {
            match result {
                Ok(change) if change.event_id == event_id => {
                    Some(SseEvent::default().event("inventory").json_data(&change))
                }
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!(error = %err, "Inventory subscriber lagged");
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
