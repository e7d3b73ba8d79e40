pub mod clock;
pub mod repository;
pub mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use repository::{
    BookingStore, CatalogRepository, CommitOutcome, HoldRepository, InventoryStore,
    OrderRepository, SeatTransition, SettlementCommit, SettlementStore,
};
pub use rules::{BookingRules, HolderPolicy};

use turnstile_shared::ParseStatusError;
use uuid::Uuid;

/// Failures of the backing store. `Unavailable` is transient and safe to retry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<ParseStatusError> for StoreError {
    fn from(err: ParseStatusError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Seat {seat_id} is unavailable for event {event_id}")]
    SeatUnavailable { event_id: String, seat_id: String },

    #[error("Hold {0} has expired or is no longer active")]
    HoldExpired(Uuid),

    #[error("Consistency fault: seat {seat_id} is no longer linked to active hold {hold_id}")]
    ConsistencyFault { hold_id: Uuid, seat_id: String },

    #[error("Holder {holder_id} already has an active hold")]
    HolderLimitReached { holder_id: String },

    #[error("Idempotency key {key} was already used for a different hold")]
    IdempotencyConflict { key: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::SeatUnavailable { .. } => "seat_unavailable",
            BookingError::HoldExpired(_) => "hold_expired",
            BookingError::ConsistencyFault { .. } => "consistency_fault",
            BookingError::HolderLimitReached { .. } => "holder_limit_reached",
            BookingError::IdempotencyConflict { .. } => "idempotency_conflict",
            BookingError::NotFound(_) => "not_found",
            BookingError::InvalidRequest(_) => "invalid_request",
            BookingError::Store(e) if e.is_retryable() => "store_unavailable",
            BookingError::Store(_) => "store_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            BookingError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
