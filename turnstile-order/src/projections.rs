use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use turnstile_core::{BookingError, BookingResult, BookingStore};
use turnstile_shared::{Event, Hold, HoldStatus, Order, Seat, SeatInventory, SeatStatus, Ticket};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeatMapFilters {
    pub section: Option<String>,
    pub max_price: Option<i32>,
    #[serde(default)]
    pub accessible_only: bool,
}

impl SeatMapFilters {
    fn accepts(&self, seat: &Seat) -> bool {
        self.section.as_deref().map_or(true, |s| seat.section == s)
            && self.max_price.map_or(true, |max| seat.price <= max)
            && (!self.accessible_only || seat.is_accessible)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub seats: Vec<Seat>,
    pub inventory: Vec<SeatInventory>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct InventoryMetrics {
    pub total_seats: usize,
    pub sold_seats: usize,
    pub held_seats: usize,
    pub available_seats: usize,
}

impl InventoryMetrics {
    fn tally(rows: &[SeatInventory]) -> Self {
        let mut metrics = Self {
            total_seats: rows.len(),
            ..Self::default()
        };
        for row in rows {
            match row.status {
                SeatStatus::Sold => metrics.sold_seats += 1,
                SeatStatus::Held => metrics.held_seats += 1,
                SeatStatus::Available => metrics.available_seats += 1,
            }
        }
        metrics
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSnapshot {
    pub active_holds: Vec<Hold>,
    pub sold_seats: Vec<SeatInventory>,
    pub expired_holds: Vec<Hold>,
    pub metrics: InventoryMetrics,
}

/// Read-only views over the store. Results may be slightly stale.
pub struct QueryFacade {
    store: Arc<dyn BookingStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn events(&self) -> BookingResult<Vec<Event>> {
        Ok(self.store.list_events().await?)
    }

    pub async fn event(&self, event_id: &str) -> BookingResult<Event> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("event {event_id}")))
    }

    pub async fn seat_map(&self, event_id: &str, filters: &SeatMapFilters) -> BookingResult<SeatMap> {
        self.event(event_id).await?;

        let seats: Vec<Seat> = self
            .store
            .list_seats()
            .await?
            .into_iter()
            .filter(|seat| filters.accepts(seat))
            .collect();
        let seat_ids: HashSet<&str> = seats.iter().map(|s| s.id.as_str()).collect();
        let inventory = self
            .store
            .get_inventory(event_id)
            .await?
            .into_iter()
            .filter(|row| seat_ids.contains(row.seat_id.as_str()))
            .collect();

        Ok(SeatMap { seats, inventory })
    }

    pub async fn hold(&self, hold_id: Uuid) -> BookingResult<Hold> {
        self.store
            .get_hold(hold_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("hold {hold_id}")))
    }

    pub async fn orders_for(&self, holder_id: &str) -> BookingResult<Vec<Order>> {
        Ok(self.store.orders_for(holder_id).await?)
    }

    pub async fn tickets_for(&self, holder_id: &str) -> BookingResult<Vec<Ticket>> {
        Ok(self.store.tickets_for(holder_id).await?)
    }

    pub async fn admin_snapshot(&self) -> BookingResult<AdminSnapshot> {
        let active_holds = self.store.list_holds(HoldStatus::Active).await?;
        let expired_holds = self.store.list_holds(HoldStatus::Expired).await?;
        let inventory = self.store.all_inventory().await?;

        let metrics = InventoryMetrics::tally(&inventory);
        let sold_seats = inventory
            .into_iter()
            .filter(|row| row.status == SeatStatus::Sold)
            .collect();

        Ok(AdminSnapshot {
            active_holds,
            sold_seats,
            expired_holds,
            metrics,
        })
    }
}
