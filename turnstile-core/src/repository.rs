use async_trait::async_trait;
use chrono::{DateTime, Utc};
use turnstile_shared::{Event, Hold, HoldStatus, Order, Seat, SeatInventory, SeatStatus, Ticket};
use uuid::Uuid;

use crate::StoreResult;

/// A conditional update of one inventory row.
///
/// Applies only when the row is currently in `expected` and, when
/// `expected_hold` is set, still linked to that hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatTransition {
    pub event_id: String,
    pub seat_id: String,
    pub expected: SeatStatus,
    pub expected_hold: Option<Uuid>,
    pub next: SeatStatus,
    pub hold_id: Option<Uuid>,
    pub holder_id: Option<String>,
}

impl SeatTransition {
    /// AVAILABLE -> HELD, claimed by `hold_id`.
    pub fn acquire(event_id: &str, seat_id: &str, hold_id: Uuid, holder_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            seat_id: seat_id.to_string(),
            expected: SeatStatus::Available,
            expected_hold: None,
            next: SeatStatus::Held,
            hold_id: Some(hold_id),
            holder_id: Some(holder_id.to_string()),
        }
    }

    /// HELD by `hold_id` -> AVAILABLE.
    pub fn release(event_id: &str, seat_id: &str, hold_id: Uuid) -> Self {
        Self {
            event_id: event_id.to_string(),
            seat_id: seat_id.to_string(),
            expected: SeatStatus::Held,
            expected_hold: Some(hold_id),
            next: SeatStatus::Available,
            hold_id: None,
            holder_id: None,
        }
    }

    /// HELD by `hold_id` -> SOLD.
    pub fn sell(event_id: &str, seat_id: &str, hold_id: Uuid) -> Self {
        Self {
            event_id: event_id.to_string(),
            seat_id: seat_id.to_string(),
            expected: SeatStatus::Held,
            expected_hold: Some(hold_id),
            next: SeatStatus::Sold,
            hold_id: None,
            holder_id: None,
        }
    }

    /// Whether the data model allows `expected -> next` at all. Stores refuse
    /// anything else, so a SOLD seat can never be handed back.
    pub fn is_permitted(&self) -> bool {
        self.expected.can_transition_to(self.next)
    }

    pub fn matches(&self, row: &SeatInventory) -> bool {
        self.is_permitted()
            && row.status == self.expected
            && self.expected_hold.map_or(true, |hold| row.hold_id == Some(hold))
    }
}

/// Seat allocation records. `compare_and_set_status` is the only way rows change
/// outside a settlement commit, and must be atomic per (event, seat).
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_inventory(&self, event_id: &str) -> StoreResult<Vec<SeatInventory>>;

    async fn get_seat_inventory(
        &self,
        event_id: &str,
        seat_id: &str,
    ) -> StoreResult<Option<SeatInventory>>;

    async fn all_inventory(&self) -> StoreResult<Vec<SeatInventory>>;

    /// Returns `false` when the row did not match (the caller lost the race)
    /// or the transition is not one the seat lifecycle allows.
    async fn compare_and_set_status(&self, transition: &SeatTransition) -> StoreResult<bool>;
}

#[async_trait]
pub trait HoldRepository: Send + Sync {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()>;

    async fn get_hold(&self, id: Uuid) -> StoreResult<Option<Hold>>;

    /// Status-guarded update; `false` when the hold is missing or not in `from`.
    async fn transition_hold(&self, id: Uuid, from: HoldStatus, to: HoldStatus) -> StoreResult<bool>;

    /// Removes an ACTIVE hold that never acquired its seats.
    async fn delete_unclaimed_hold(&self, id: Uuid) -> StoreResult<()>;

    /// Newest first.
    async fn list_holds(&self, status: HoldStatus) -> StoreResult<Vec<Hold>>;

    /// ACTIVE holds whose expiry is before `now`, oldest expiry first.
    async fn find_expired_holds(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Uuid>>;

    /// EXPIRED holds that still own a HELD seat, left behind by a release
    /// that failed part way.
    async fn find_stranded_holds(&self, limit: usize) -> StoreResult<Vec<Uuid>>;

    async fn active_holds_for(&self, holder_id: &str) -> StoreResult<Vec<Hold>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>>;

    async fn tickets_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>>;

    /// Newest first.
    async fn orders_for(&self, holder_id: &str) -> StoreResult<Vec<Order>>;

    /// Newest first.
    async fn tickets_for(&self, holder_id: &str) -> StoreResult<Vec<Ticket>>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Active events ordered by date.
    async fn list_events(&self) -> StoreResult<Vec<Event>>;

    async fn get_event(&self, event_id: &str) -> StoreResult<Option<Event>>;

    /// All seats ordered by section, row, number.
    async fn list_seats(&self) -> StoreResult<Vec<Seat>>;

    async fn get_seat(&self, seat_id: &str) -> StoreResult<Option<Seat>>;
}

/// Everything a settlement writes, committed as one unit.
#[derive(Debug, Clone)]
pub struct SettlementCommit {
    pub hold: Hold,
    pub order: Order,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// An order with the same idempotency key already exists.
    DuplicateKey,
    /// The hold was no longer ACTIVE (or had expired) when the commit ran.
    HoldNotActive,
    /// The hold was ACTIVE but a seat was no longer linked to it.
    InventoryDetached { seat_id: String },
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Inserts order and tickets, confirms the hold and sells its seats, or
    /// changes nothing and reports which guard failed.
    async fn commit_settlement(
        &self,
        commit: &SettlementCommit,
        now: DateTime<Utc>,
    ) -> StoreResult<CommitOutcome>;
}

/// The full store surface the booking services run against.
pub trait BookingStore:
    InventoryStore + HoldRepository + OrderRepository + CatalogRepository + SettlementStore
{
}

impl<T> BookingStore for T where
    T: InventoryStore + HoldRepository + OrderRepository + CatalogRepository + SettlementStore
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_guard_requires_matching_hold() {
        let hold_id = Uuid::new_v4();
        let mut row = SeatInventory::available("event-1", "A101");
        row.status = SeatStatus::Held;
        row.hold_id = Some(hold_id);
        row.holder_id = Some("user-1".to_string());

        assert!(SeatTransition::release("event-1", "A101", hold_id).matches(&row));
        assert!(!SeatTransition::release("event-1", "A101", Uuid::new_v4()).matches(&row));
        assert!(!SeatTransition::acquire("event-1", "A101", Uuid::new_v4(), "user-2").matches(&row));

        row.status = SeatStatus::Sold;
        row.hold_id = None;
        assert!(!SeatTransition::release("event-1", "A101", hold_id).matches(&row));
    }

    #[test]
    fn test_sold_seat_cannot_be_handed_back() {
        let mut row = SeatInventory::available("event-1", "A101");
        row.status = SeatStatus::Sold;

        let unsell = SeatTransition {
            event_id: "event-1".to_string(),
            seat_id: "A101".to_string(),
            expected: SeatStatus::Sold,
            expected_hold: None,
            next: SeatStatus::Available,
            hold_id: None,
            holder_id: None,
        };
        assert!(!unsell.is_permitted());
        assert!(!unsell.matches(&row));

        assert!(SeatTransition::acquire("event-1", "A101", Uuid::new_v4(), "user-1").is_permitted());
        assert!(SeatTransition::sell("event-1", "A101", Uuid::new_v4()).is_permitted());
    }
}
