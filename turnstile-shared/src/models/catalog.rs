use serde::{Deserialize, Serialize};

/// A ticketed occurrence seats are sold for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: String,
    pub venue: String,
    pub image_url: Option<String>,
    pub status: String,
}

impl Event {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Immutable catalog entry for a physical seat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: String,
    pub section: String,
    pub row: String,
    pub number: String,
    pub price: i32,
    pub is_accessible: bool,
}
