use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseStatusError;

/// Allocation state of one seat for one event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Sold,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Sold => "SOLD",
        }
    }

    /// AVAILABLE -> HELD -> {AVAILABLE, SOLD}. SOLD never moves.
    pub fn can_transition_to(&self, next: SeatStatus) -> bool {
        matches!(
            (self, next),
            (SeatStatus::Available, SeatStatus::Held)
                | (SeatStatus::Held, SeatStatus::Available)
                | (SeatStatus::Held, SeatStatus::Sold)
        )
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "HELD" => Ok(SeatStatus::Held),
            "SOLD" => Ok(SeatStatus::Sold),
            other => Err(ParseStatusError::new("seat", other)),
        }
    }
}

/// The mutable allocation record for an (event, seat) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatInventory {
    pub event_id: String,
    pub seat_id: String,
    pub status: SeatStatus,
    pub hold_id: Option<Uuid>,
    pub holder_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SeatInventory {
    pub fn available(event_id: impl Into<String>, seat_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            seat_id: seat_id.into(),
            status: SeatStatus::Available,
            hold_id: None,
            holder_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_held_by(&self, hold_id: Uuid) -> bool {
        self.status == SeatStatus::Held && self.hold_id == Some(hold_id)
    }
}
