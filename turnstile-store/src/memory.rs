use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use turnstile_core::{
    CatalogRepository, CommitOutcome, HoldRepository, InventoryStore, OrderRepository,
    SeatTransition, SettlementCommit, SettlementStore, StoreError, StoreResult,
};
use turnstile_shared::{Event, Hold, HoldStatus, Order, Seat, SeatInventory, SeatStatus, Ticket};
use uuid::Uuid;

use crate::CatalogLoader;

#[derive(Default)]
struct Tables {
    events: BTreeMap<String, Event>,
    seats: BTreeMap<String, Seat>,
    inventory: HashMap<(String, String), SeatInventory>,
    holds: HashMap<Uuid, Hold>,
    orders: HashMap<Uuid, Order>,
    orders_by_key: HashMap<String, Uuid>,
    tickets: Vec<Ticket>,
}

/// In-process store. Every operation runs inside one short critical section,
/// which makes each compare-and-set and each settlement commit atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn natural_key(value: &str) -> (u32, String) {
    (value.parse().unwrap_or(u32::MAX), value.to_string())
}

fn sort_seats(seats: &mut [Seat]) {
    seats.sort_by(|a, b| {
        (&a.section, natural_key(&a.row), natural_key(&a.number))
            .cmp(&(&b.section, natural_key(&b.row), natural_key(&b.number)))
    });
}

#[async_trait]
impl CatalogLoader for MemoryStore {
    async fn load_catalog(&self, events: &[Event], seats: &[Seat]) -> StoreResult<()> {
        let mut t = self.lock()?;
        for event in events {
            t.events.entry(event.id.clone()).or_insert_with(|| event.clone());
        }
        for seat in seats {
            t.seats.entry(seat.id.clone()).or_insert_with(|| seat.clone());
        }
        for event in events {
            for seat in seats {
                t.inventory
                    .entry((event.id.clone(), seat.id.clone()))
                    .or_insert_with(|| SeatInventory::available(&event.id, &seat.id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn get_inventory(&self, event_id: &str) -> StoreResult<Vec<SeatInventory>> {
        let t = self.lock()?;
        let mut rows: Vec<SeatInventory> = t
            .inventory
            .values()
            .filter(|row| row.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.seat_id.cmp(&b.seat_id));
        Ok(rows)
    }

    async fn get_seat_inventory(
        &self,
        event_id: &str,
        seat_id: &str,
    ) -> StoreResult<Option<SeatInventory>> {
        let t = self.lock()?;
        Ok(t
            .inventory
            .get(&(event_id.to_string(), seat_id.to_string()))
            .cloned())
    }

    async fn all_inventory(&self) -> StoreResult<Vec<SeatInventory>> {
        let t = self.lock()?;
        let mut rows: Vec<SeatInventory> = t.inventory.values().cloned().collect();
        rows.sort_by(|a, b| (&a.event_id, &a.seat_id).cmp(&(&b.event_id, &b.seat_id)));
        Ok(rows)
    }

    async fn compare_and_set_status(&self, transition: &SeatTransition) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let key = (transition.event_id.clone(), transition.seat_id.clone());
        let Some(row) = t.inventory.get_mut(&key) else {
            return Ok(false);
        };
        if !transition.matches(row) {
            return Ok(false);
        }

        row.status = transition.next;
        row.hold_id = transition.hold_id;
        row.holder_id = transition.holder_id.clone();
        row.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl HoldRepository for MemoryStore {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.holds.contains_key(&hold.id) {
            return Err(StoreError::Database(format!("duplicate hold id {}", hold.id)));
        }
        t.holds.insert(hold.id, hold.clone());
        Ok(())
    }

    async fn get_hold(&self, id: Uuid) -> StoreResult<Option<Hold>> {
        let t = self.lock()?;
        Ok(t.holds.get(&id).cloned())
    }

    async fn transition_hold(&self, id: Uuid, from: HoldStatus, to: HoldStatus) -> StoreResult<bool> {
        let mut t = self.lock()?;
        match t.holds.get_mut(&id) {
            Some(hold) if hold.status == from => {
                hold.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_unclaimed_hold(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.lock()?;
        if matches!(t.holds.get(&id), Some(hold) if hold.status == HoldStatus::Active) {
            t.holds.remove(&id);
        }
        Ok(())
    }

    async fn list_holds(&self, status: HoldStatus) -> StoreResult<Vec<Hold>> {
        let t = self.lock()?;
        let mut holds: Vec<Hold> = t
            .holds
            .values()
            .filter(|h| h.status == status)
            .cloned()
            .collect();
        holds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(holds)
    }

    async fn find_expired_holds(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Uuid>> {
        let t = self.lock()?;
        let mut expired: Vec<&Hold> = t
            .holds
            .values()
            .filter(|h| h.status == HoldStatus::Active && h.is_expired_at(now))
            .collect();
        expired.sort_by_key(|h| h.expire_at);
        Ok(expired.into_iter().take(limit).map(|h| h.id).collect())
    }

    async fn find_stranded_holds(&self, limit: usize) -> StoreResult<Vec<Uuid>> {
        let t = self.lock()?;
        let mut stranded: Vec<&Hold> = t
            .inventory
            .values()
            .filter(|row| row.status == SeatStatus::Held)
            .filter_map(|row| row.hold_id.and_then(|id| t.holds.get(&id)))
            .filter(|h| h.status == HoldStatus::Expired)
            .collect();
        stranded.sort_by_key(|h| (h.expire_at, h.id));
        stranded.dedup_by_key(|h| h.id);
        Ok(stranded.into_iter().take(limit).map(|h| h.id).collect())
    }

    async fn active_holds_for(&self, holder_id: &str) -> StoreResult<Vec<Hold>> {
        let t = self.lock()?;
        Ok(t
            .holds
            .values()
            .filter(|h| h.status == HoldStatus::Active && h.holder_id == holder_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn find_order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>> {
        let t = self.lock()?;
        Ok(t
            .orders_by_key
            .get(key)
            .and_then(|id| t.orders.get(id))
            .cloned())
    }

    async fn tickets_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let t = self.lock()?;
        Ok(t
            .tickets
            .iter()
            .filter(|ticket| ticket.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn orders_for(&self, holder_id: &str) -> StoreResult<Vec<Order>> {
        let t = self.lock()?;
        let mut orders: Vec<Order> = t
            .orders
            .values()
            .filter(|o| o.holder_id == holder_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn tickets_for(&self, holder_id: &str) -> StoreResult<Vec<Ticket>> {
        let t = self.lock()?;
        let mut tickets: Vec<Ticket> = t
            .tickets
            .iter()
            .filter(|ticket| ticket.holder_id == holder_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let t = self.lock()?;
        let mut events: Vec<Event> = t.events.values().filter(|e| e.is_active()).cloned().collect();
        events.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(events)
    }

    async fn get_event(&self, event_id: &str) -> StoreResult<Option<Event>> {
        let t = self.lock()?;
        Ok(t.events.get(event_id).cloned())
    }

    async fn list_seats(&self) -> StoreResult<Vec<Seat>> {
        let t = self.lock()?;
        let mut seats: Vec<Seat> = t.seats.values().cloned().collect();
        sort_seats(&mut seats);
        Ok(seats)
    }

    async fn get_seat(&self, seat_id: &str) -> StoreResult<Option<Seat>> {
        let t = self.lock()?;
        Ok(t.seats.get(seat_id).cloned())
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn commit_settlement(
        &self,
        commit: &SettlementCommit,
        now: DateTime<Utc>,
    ) -> StoreResult<CommitOutcome> {
        let mut t = self.lock()?;
        let hold_id = commit.hold.id;

        if t.orders_by_key.contains_key(&commit.order.idempotency_key) {
            return Ok(CommitOutcome::DuplicateKey);
        }

        let (event_id, seat_ids) = match t.holds.get(&hold_id) {
            Some(hold) if hold.is_live_at(now) => (hold.event_id.clone(), hold.seat_ids.clone()),
            _ => return Ok(CommitOutcome::HoldNotActive),
        };

        // Check every guard before touching anything.
        for seat_id in &seat_ids {
            let linked = t
                .inventory
                .get(&(event_id.clone(), seat_id.clone()))
                .is_some_and(|row| row.is_held_by(hold_id));
            if !linked {
                return Ok(CommitOutcome::InventoryDetached {
                    seat_id: seat_id.clone(),
                });
            }
        }

        if let Some(hold) = t.holds.get_mut(&hold_id) {
            hold.status = HoldStatus::Confirmed;
        }
        for seat_id in &seat_ids {
            if let Some(row) = t.inventory.get_mut(&(event_id.clone(), seat_id.clone())) {
                row.status = SeatStatus::Sold;
                row.hold_id = None;
                row.holder_id = None;
                row.updated_at = now;
            }
        }
        t.orders_by_key
            .insert(commit.order.idempotency_key.clone(), commit.order.id);
        t.orders.insert(commit.order.id, commit.order.clone());
        t.tickets.extend(commit.tickets.iter().cloned());

        Ok(CommitOutcome::Committed)
    }
}
