use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};
use turnstile_core::{
    BookingError, BookingResult, BookingRules, BookingStore, Clock, HolderPolicy, SeatTransition,
};
use turnstile_shared::{Hold, HoldStatus, InventoryChange, SeatStatus};
use uuid::Uuid;

/// Grants and releases holds. Never takes a lock of its own: every seat
/// change goes through the store's compare-and-set.
pub struct HoldManager {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    rules: BookingRules,
    changes: Option<broadcast::Sender<InventoryChange>>,
}

impl HoldManager {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>, rules: BookingRules) -> Self {
        Self {
            store,
            clock,
            rules,
            changes: None,
        }
    }

    /// Publish every seat transition on `changes`.
    pub fn with_changes(mut self, changes: broadcast::Sender<InventoryChange>) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    /// Hold a single seat.
    pub async fn create_hold(&self, event_id: &str, seat_id: &str, holder_id: &str) -> BookingResult<Hold> {
        self.create_hold_for_seats(event_id, &[seat_id.to_string()], holder_id)
            .await
    }

    /// Hold every seat in `seat_ids` or none of them.
    pub async fn create_hold_for_seats(
        &self,
        event_id: &str,
        seat_ids: &[String],
        holder_id: &str,
    ) -> BookingResult<Hold> {
        let seat_ids = validate_request(event_id, seat_ids, holder_id)?;
        self.apply_holder_policy(holder_id).await?;

        for seat_id in &seat_ids {
            let available = self
                .store
                .get_seat_inventory(event_id, seat_id)
                .await?
                .is_some_and(|row| row.status == SeatStatus::Available);
            if !available {
                return Err(seat_unavailable(event_id, seat_id));
            }
        }

        let hold = Hold::new(
            event_id.to_string(),
            seat_ids,
            holder_id.to_string(),
            self.clock.now(),
            self.rules.hold_duration(),
        );
        self.store.insert_hold(&hold).await?;

        if self.rules.holder_policy == HolderPolicy::Single && self.holder_has_other_hold(&hold).await? {
            // Lost to a concurrent request from the same holder.
            self.abandon(&hold, &[]).await;
            return Err(BookingError::HolderLimitReached {
                holder_id: holder_id.to_string(),
            });
        }

        let mut acquired: Vec<&str> = Vec::with_capacity(hold.seat_ids.len());
        for seat_id in &hold.seat_ids {
            let won = match self
                .store
                .compare_and_set_status(&SeatTransition::acquire(event_id, seat_id, hold.id, holder_id))
                .await
            {
                Ok(won) => won,
                Err(err) => {
                    self.abandon(&hold, &acquired).await;
                    return Err(err.into());
                }
            };

            if !won {
                warn!(event_id, seat_id = %seat_id, holder_id, "Lost race for seat");
                self.abandon(&hold, &acquired).await;
                return Err(seat_unavailable(event_id, seat_id));
            }
            acquired.push(seat_id);
        }

        info!(
            hold_id = %hold.id,
            event_id,
            seats = ?hold.seat_ids,
            holder_id,
            expire_at = %hold.expire_at,
            "Hold created"
        );
        self.publish(&hold.event_id, &hold.seat_ids, SeatStatus::Held, Some(hold.id));
        Ok(hold)
    }

    /// Idempotent and safe to retry. Expires an ACTIVE hold and frees every
    /// seat still HELD for it; an already EXPIRED hold gets its leftover
    /// seats freed. Returns `true` when this call changed anything. CONFIRMED
    /// and missing holds are left alone.
    pub async fn release_hold(&self, hold_id: Uuid) -> BookingResult<bool> {
        let Some(hold) = self.store.get_hold(hold_id).await? else {
            return Ok(false);
        };
        let expired_now = match hold.status {
            HoldStatus::Confirmed => return Ok(false),
            HoldStatus::Expired => false,
            HoldStatus::Active => {
                if !self
                    .store
                    .transition_hold(hold_id, HoldStatus::Active, HoldStatus::Expired)
                    .await?
                {
                    // A concurrent confirm or release got there first.
                    return Ok(false);
                }
                true
            }
        };

        let mut freed = Vec::with_capacity(hold.seat_ids.len());
        let mut first_error = None;
        for seat_id in &hold.seat_ids {
            let transition = SeatTransition::release(&hold.event_id, seat_id, hold_id);
            match self.store.compare_and_set_status(&transition).await {
                Ok(true) => freed.push(seat_id.clone()),
                Ok(false) if expired_now => {
                    warn!(%hold_id, seat_id = %seat_id, "Seat was not linked to released hold");
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(%hold_id, seat_id = %seat_id, error = %err, "Failed to free seat of released hold");
                    first_error.get_or_insert(err);
                }
            }
        }

        if !freed.is_empty() {
            self.publish(&hold.event_id, &freed, SeatStatus::Available, None);
        }
        if let Some(err) = first_error {
            return Err(err.into());
        }

        if expired_now {
            info!(%hold_id, event_id = %hold.event_id, seats = ?hold.seat_ids, "Hold released");
        } else if !freed.is_empty() {
            info!(%hold_id, event_id = %hold.event_id, seats = ?freed, "Freed seats of expired hold");
        }
        Ok(expired_now || !freed.is_empty())
    }

    /// ACTIVE holds already past their expiry, oldest first.
    pub async fn expired_holds(&self, limit: usize) -> BookingResult<Vec<Uuid>> {
        Ok(self.store.find_expired_holds(self.clock.now(), limit).await?)
    }

    /// EXPIRED holds whose release did not free every seat.
    pub async fn stranded_holds(&self, limit: usize) -> BookingResult<Vec<Uuid>> {
        Ok(self.store.find_stranded_holds(limit).await?)
    }

    async fn apply_holder_policy(&self, holder_id: &str) -> BookingResult<()> {
        match self.rules.holder_policy {
            HolderPolicy::Unlimited => Ok(()),
            HolderPolicy::Single => {
                let now = self.clock.now();
                let live = self
                    .store
                    .active_holds_for(holder_id)
                    .await?
                    .iter()
                    .any(|hold| hold.is_live_at(now));
                if live {
                    Err(BookingError::HolderLimitReached {
                        holder_id: holder_id.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            HolderPolicy::Replace => {
                for hold in self.store.active_holds_for(holder_id).await? {
                    if self.release_hold(hold.id).await? {
                        info!(hold_id = %hold.id, holder_id, "Replaced previous hold");
                    }
                }
                Ok(())
            }
        }
    }

    async fn holder_has_other_hold(&self, hold: &Hold) -> BookingResult<bool> {
        let now = self.clock.now();
        Ok(self
            .store
            .active_holds_for(&hold.holder_id)
            .await?
            .iter()
            .any(|other| other.id != hold.id && other.is_live_at(now)))
    }

    /// Give back seats already taken for `hold` and drop the hold record.
    async fn abandon(&self, hold: &Hold, acquired: &[&str]) {
        for seat_id in acquired {
            let transition = SeatTransition::release(&hold.event_id, seat_id, hold.id);
            match self.store.compare_and_set_status(&transition).await {
                Ok(true) => {}
                Ok(false) => warn!(hold_id = %hold.id, seat_id, "Rollback found seat already moved"),
                Err(err) => warn!(hold_id = %hold.id, seat_id, error = %err, "Rollback failed"),
            }
        }
        if let Err(err) = self.store.delete_unclaimed_hold(hold.id).await {
            warn!(hold_id = %hold.id, error = %err, "Failed to delete unclaimed hold");
        }
    }

    fn publish(&self, event_id: &str, seat_ids: &[String], status: SeatStatus, hold_id: Option<Uuid>) {
        if let Some(changes) = &self.changes {
            // No subscribers is fine.
            let _ = changes.send(InventoryChange::new(event_id, seat_ids, status, hold_id));
        }
    }
}

fn seat_unavailable(event_id: &str, seat_id: &str) -> BookingError {
    BookingError::SeatUnavailable {
        event_id: event_id.to_string(),
        seat_id: seat_id.to_string(),
    }
}

/// Sorted, de-duplicated seat list, or the reason the request is malformed.
fn validate_request(event_id: &str, seat_ids: &[String], holder_id: &str) -> BookingResult<Vec<String>> {
    if event_id.trim().is_empty() {
        return Err(BookingError::InvalidRequest("event_id is required".to_string()));
    }
    if holder_id.trim().is_empty() {
        return Err(BookingError::InvalidRequest("holder_id is required".to_string()));
    }
    if seat_ids.is_empty() {
        return Err(BookingError::InvalidRequest("at least one seat is required".to_string()));
    }

    let mut seen = HashSet::new();
    for seat_id in seat_ids {
        if seat_id.trim().is_empty() {
            return Err(BookingError::InvalidRequest("seat ids must not be empty".to_string()));
        }
        if !seen.insert(seat_id.as_str()) {
            return Err(BookingError::InvalidRequest(format!("duplicate seat {seat_id}")));
        }
    }

    let mut sorted = seat_ids.to_vec();
    sorted.sort();
    Ok(sorted)
}
