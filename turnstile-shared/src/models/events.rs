use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::inventory::SeatStatus;

/// Published after seats change state, for live seat-map subscribers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InventoryChange {
    pub event_id: String,
    pub seat_ids: Vec<String>,
    pub status: SeatStatus,
    pub hold_id: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

impl InventoryChange {
    pub fn new(event_id: &str, seat_ids: &[String], status: SeatStatus, hold_id: Option<Uuid>) -> Self {
        Self {
            event_id: event_id.to_string(),
            seat_ids: seat_ids.to_vec(),
            status,
            hold_id,
            changed_at: Utc::now(),
        }
    }
}
