use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use turnstile_core::{
    BookingError, BookingResult, BookingStore, Clock, CommitOutcome, SettlementCommit, StoreError,
};
use turnstile_hold::HoldManager;
use turnstile_shared::{Hold, HoldStatus, InventoryChange, Order, OrderStatus, SeatStatus, Ticket};
use uuid::Uuid;

use crate::fulfillment::TicketIssuer;

/// Result of a confirm call. `replayed` is set when the idempotency key had
/// already settled this hold and nothing new was written.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub order: Order,
    pub tickets: Vec<Ticket>,
    pub replayed: bool,
}

/// Turns an ACTIVE hold into a paid order, exactly once per idempotency key.
pub struct SettlementEngine {
    store: Arc<dyn BookingStore>,
    holds: Arc<HoldManager>,
    clock: Arc<dyn Clock>,
    issuer: TicketIssuer,
    changes: Option<broadcast::Sender<InventoryChange>>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn BookingStore>, holds: Arc<HoldManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            holds,
            clock,
            issuer: TicketIssuer::new(),
            changes: None,
        }
    }

    pub fn with_changes(mut self, changes: broadcast::Sender<InventoryChange>) -> Self {
        self.changes = Some(changes);
        self
    }

    pub async fn confirm_hold(&self, hold_id: Uuid, idempotency_key: &str) -> BookingResult<Settlement> {
        let key = idempotency_key.trim();
        if key.is_empty() {
            return Err(BookingError::InvalidRequest("idempotency_key is required".to_string()));
        }

        if let Some(order) = self.store.find_order_by_idempotency_key(key).await? {
            return self.replay(order, hold_id, key).await;
        }

        let hold = match self.store.get_hold(hold_id).await? {
            Some(hold) if hold.status == HoldStatus::Active => hold,
            Some(hold) if hold.status == HoldStatus::Confirmed => {
                // A concurrent request with this key may have confirmed it
                // since the lookup above.
                return match self.store.find_order_by_idempotency_key(key).await? {
                    Some(order) => self.replay(order, hold_id, key).await,
                    None => Err(BookingError::HoldExpired(hold_id)),
                };
            }
            _ => return Err(BookingError::HoldExpired(hold_id)),
        };

        let now = self.clock.now();
        if hold.is_expired_at(now) {
            info!(%hold_id, expire_at = %hold.expire_at, "Confirm arrived after expiry");
            self.holds.release_hold(hold_id).await?;
            return Err(BookingError::HoldExpired(hold_id));
        }

        let order = Order {
            id: Uuid::new_v4(),
            holder_id: hold.holder_id.clone(),
            event_id: hold.event_id.clone(),
            seat_ids: hold.seat_ids.clone(),
            amount: self.total_for(&hold).await?,
            status: OrderStatus::Paid,
            idempotency_key: key.to_string(),
            hold_id,
            created_at: now,
        };
        let tickets = self.issuer.issue(&order, now)?;
        let commit = SettlementCommit {
            hold,
            order,
            tickets,
        };

        match self.store.commit_settlement(&commit, now).await? {
            CommitOutcome::Committed => {
                let SettlementCommit { hold, order, tickets } = commit;
                info!(
                    order_id = %order.id,
                    %hold_id,
                    amount = order.amount,
                    seats = ?order.seat_ids,
                    "Hold confirmed"
                );
                if let Some(changes) = &self.changes {
                    let _ = changes.send(InventoryChange::new(
                        &hold.event_id,
                        &hold.seat_ids,
                        SeatStatus::Sold,
                        None,
                    ));
                }
                Ok(Settlement {
                    order,
                    tickets,
                    replayed: false,
                })
            }
            CommitOutcome::DuplicateKey => {
                // A concurrent request with the same key committed first.
                match self.store.find_order_by_idempotency_key(key).await? {
                    Some(order) => self.replay(order, hold_id, key).await,
                    None => Err(StoreError::Unavailable(format!(
                        "order for idempotency key {key} is not readable yet"
                    ))
                    .into()),
                }
            }
            CommitOutcome::HoldNotActive => {
                warn!(%hold_id, "Hold stopped being active before settlement committed");
                Err(BookingError::HoldExpired(hold_id))
            }
            CommitOutcome::InventoryDetached { seat_id } => {
                error!(%hold_id, seat_id = %seat_id, "Active hold lost its seat; settlement aborted");
                Err(BookingError::ConsistencyFault { hold_id, seat_id })
            }
        }
    }

    async fn replay(&self, order: Order, hold_id: Uuid, key: &str) -> BookingResult<Settlement> {
        if order.hold_id != hold_id {
            warn!(%hold_id, settled_hold = %order.hold_id, key, "Idempotency key reused for another hold");
            return Err(BookingError::IdempotencyConflict { key: key.to_string() });
        }

        let tickets = self.store.tickets_for_order(order.id).await?;
        info!(order_id = %order.id, %hold_id, "Replayed settlement");
        Ok(Settlement {
            order,
            tickets,
            replayed: true,
        })
    }

    async fn total_for(&self, hold: &Hold) -> BookingResult<i32> {
        let mut total = self.holds.rules().service_fee;
        for seat_id in &hold.seat_ids {
            let seat = self
                .store
                .get_seat(seat_id)
                .await?
                .ok_or_else(|| BookingError::NotFound(format!("seat {seat_id}")))?;
            total += seat.price;
        }
        Ok(total)
    }
}
