use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseStatusError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    Active,
    Expired,
    Confirmed,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "ACTIVE",
            HoldStatus::Expired => "EXPIRED",
            HoldStatus::Confirmed => "CONFIRMED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Active)
    }
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HoldStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(HoldStatus::Active),
            "EXPIRED" => Ok(HoldStatus::Expired),
            "CONFIRMED" => Ok(HoldStatus::Confirmed),
            other => Err(ParseStatusError::new("hold", other)),
        }
    }
}

/// A time-boxed exclusive claim on one or more seats of a single event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hold {
    pub id: Uuid,
    pub event_id: String,
    pub seat_ids: Vec<String>,
    pub holder_id: String,
    pub expire_at: DateTime<Utc>,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
}

impl Hold {
    pub fn new(
        event_id: String,
        seat_ids: Vec<String>,
        holder_id: String,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            seat_ids,
            holder_id,
            expire_at: now + duration,
            status: HoldStatus::Active,
            created_at: now,
        }
    }

    /// Stored expiry is authoritative; the status alone can be stale until swept.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at < now
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Active && !self.is_expired_at(now)
    }
}
