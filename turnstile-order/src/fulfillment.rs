use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use turnstile_core::{BookingError, StoreError};
use turnstile_shared::{Order, Ticket};
use uuid::Uuid;

const CODE_PREFIX: &str = "TRN";
const CODE_RANDOM_LEN: usize = 10;

/// Issues the tickets that go with a settled order, one per seat.
#[derive(Debug, Default, Clone, Copy)]
pub struct TicketIssuer;

impl TicketIssuer {
    pub fn new() -> Self {
        Self
    }

    pub fn issue(&self, order: &Order, now: DateTime<Utc>) -> Result<Vec<Ticket>, FulfillmentError> {
        if order.seat_ids.is_empty() {
            return Err(FulfillmentError::NoSeats(order.id));
        }

        Ok(order
            .seat_ids
            .iter()
            .map(|seat_id| Ticket {
                id: Uuid::new_v4(),
                event_id: order.event_id.clone(),
                seat_id: seat_id.clone(),
                holder_id: order.holder_id.clone(),
                code: self.generate_code(&order.id),
                order_id: order.id,
                created_at: now,
            })
            .collect())
    }

    /// Format: TRN-{order short id}-{10 random alphanumerics}, upper case.
    pub fn generate_code(&self, order_id: &Uuid) -> String {
        let short_id = &order_id.simple().to_string()[..8];
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_RANDOM_LEN)
            .map(char::from)
            .collect();
        format!("{CODE_PREFIX}-{short_id}-{random}").to_uppercase()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("Order {0} has no seats to ticket")]
    NoSeats(Uuid),
}

impl From<FulfillmentError> for BookingError {
    fn from(err: FulfillmentError) -> Self {
        // Only reachable with a malformed persisted hold.
        BookingError::Store(StoreError::Corrupt(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use turnstile_shared::OrderStatus;

    fn order(seat_ids: &[&str]) -> Order {
        Order {
            id: Uuid::new_v4(),
            holder_id: "user-1".to_string(),
            event_id: "event-1".to_string(),
            seat_ids: seat_ids.iter().map(|s| s.to_string()).collect(),
            amount: 104,
            status: OrderStatus::Paid,
            idempotency_key: "req-1".to_string(),
            hold_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_one_ticket_per_seat() {
        let order = order(&["A1-1", "A1-2"]);
        let tickets = TicketIssuer::new().issue(&order, Utc::now()).unwrap();

        assert_eq!(tickets.len(), 2);
        assert!(tickets.iter().all(|t| t.order_id == order.id && t.holder_id == "user-1"));
        let codes: HashSet<_> = tickets.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes.len(), 2);
    }

    #[test]
    fn test_code_format() {
        let order_id = Uuid::new_v4();
        let code = TicketIssuer::new().generate_code(&order_id);
        let parts: Vec<&str> = code.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TRN");
        assert_eq!(parts[1], order_id.simple().to_string()[..8].to_uppercase());
        assert_eq!(parts[2].len(), 10);
        assert_eq!(code, code.to_uppercase());
    }

    #[test]
    fn test_empty_order_is_rejected() {
        let err = TicketIssuer::new().issue(&order(&[]), Utc::now()).unwrap_err();
        assert!(matches!(err, FulfillmentError::NoSeats(_)));
        assert_eq!(BookingError::from(err).code(), "store_error");
    }
}
