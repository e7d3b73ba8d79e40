use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use turnstile_core::{
    CatalogRepository, CommitOutcome, HoldRepository, InventoryStore, OrderRepository,
    SeatTransition, SettlementCommit, SettlementStore, StoreError, StoreResult,
};
use turnstile_shared::{Event, Hold, HoldStatus, Order, Seat, SeatInventory, Ticket};
use uuid::Uuid;

use crate::database::db_err;
use crate::CatalogLoader;

/// Postgres-backed store. Every conditional write is a single guarded
/// `UPDATE`, so Postgres row locking decides who wins a race.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    name: String,
    date: String,
    venue: String,
    image_url: Option<String>,
    status: String,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            name: row.name,
            date: row.date,
            venue: row.venue,
            image_url: row.image_url,
            status: row.status,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: String,
    section: String,
    row: String,
    number: String,
    price: i32,
    is_accessible: bool,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Seat {
            id: row.id,
            section: row.section,
            row: row.row,
            number: row.number,
            price: row.price,
            is_accessible: row.is_accessible,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    event_id: String,
    seat_id: String,
    status: String,
    hold_id: Option<Uuid>,
    holder_id: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InventoryRow> for SeatInventory {
    type Error = StoreError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        Ok(SeatInventory {
            event_id: row.event_id,
            seat_id: row.seat_id,
            status: row.status.parse()?,
            hold_id: row.hold_id,
            holder_id: row.holder_id,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    event_id: String,
    seat_ids: Vec<String>,
    holder_id: String,
    expire_at: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HoldRow> for Hold {
    type Error = StoreError;

    fn try_from(row: HoldRow) -> Result<Self, Self::Error> {
        Ok(Hold {
            id: row.id,
            event_id: row.event_id,
            seat_ids: row.seat_ids,
            holder_id: row.holder_id,
            expire_at: row.expire_at,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    holder_id: String,
    event_id: String,
    seat_ids: Vec<String>,
    amount: i32,
    status: String,
    payment_request_id: String,
    hold_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            holder_id: row.holder_id,
            event_id: row.event_id,
            seat_ids: row.seat_ids,
            amount: row.amount,
            status: row.status.parse()?,
            idempotency_key: row.payment_request_id,
            hold_id: row.hold_id,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    event_id: String,
    seat_id: String,
    holder_id: String,
    code: String,
    order_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            event_id: row.event_id,
            seat_id: row.seat_id,
            holder_id: row.holder_id,
            code: row.code,
            order_id: row.order_id,
            created_at: row.created_at,
        }
    }
}

const INVENTORY_COLUMNS: &str = "event_id, seat_id, status, hold_id, holder_id, updated_at";
const HOLD_COLUMNS: &str = "id, event_id, seat_ids, holder_id, expire_at, status, created_at";
const ORDER_COLUMNS: &str =
    "id, holder_id, event_id, seat_ids, amount, status, payment_request_id, hold_id, created_at";
const TICKET_COLUMNS: &str = "id, event_id, seat_id, holder_id, code, order_id, created_at";
const SEAT_COLUMNS: &str = r#"id, section, "row", number, price, is_accessible"#;

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl CatalogLoader for PostgresStore {
    async fn load_catalog(&self, events: &[Event], seats: &[Seat]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (id, name, date, venue, image_url, status)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&event.id)
            .bind(&event.name)
            .bind(&event.date)
            .bind(&event.venue)
            .bind(&event.image_url)
            .bind(&event.status)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for seat in seats {
            sqlx::query(
                r#"
                INSERT INTO seats (id, section, "row", number, price, is_accessible)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&seat.id)
            .bind(&seat.section)
            .bind(&seat.row)
            .bind(&seat.number)
            .bind(seat.price)
            .bind(seat.is_accessible)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let event_ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
        let seat_ids: Vec<String> = seats.iter().map(|s| s.id.clone()).collect();
        let created = sqlx::query(
            r#"
            INSERT INTO seat_inventory (event_id, seat_id, status)
            SELECT e.id, s.id, 'AVAILABLE'
            FROM unnest($1::TEXT[]) AS e(id) CROSS JOIN unnest($2::TEXT[]) AS s(id)
            ON CONFLICT (event_id, seat_id) DO NOTHING
            "#,
        )
        .bind(&event_ids)
        .bind(&seat_ids)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        tx.commit().await.map_err(db_err)?;
        debug!(events = events.len(), seats = seats.len(), created, "Catalog loaded");
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn get_inventory(&self, event_id: &str) -> StoreResult<Vec<SeatInventory>> {
        let rows: Vec<InventoryRow> = sqlx::query_as(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM seat_inventory WHERE event_id = $1 ORDER BY seat_id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        convert_all(rows)
    }

    async fn get_seat_inventory(
        &self,
        event_id: &str,
        seat_id: &str,
    ) -> StoreResult<Option<SeatInventory>> {
        let row: Option<InventoryRow> = sqlx::query_as(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM seat_inventory WHERE event_id = $1 AND seat_id = $2"
        ))
        .bind(event_id)
        .bind(seat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(SeatInventory::try_from).transpose()
    }

    async fn all_inventory(&self) -> StoreResult<Vec<SeatInventory>> {
        let rows: Vec<InventoryRow> = sqlx::query_as(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM seat_inventory ORDER BY event_id, seat_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        convert_all(rows)
    }

    async fn compare_and_set_status(&self, transition: &SeatTransition) -> StoreResult<bool> {
        if !transition.is_permitted() {
            return Ok(false);
        }
        let result = sqlx::query(
            r#"
            UPDATE seat_inventory
            SET status = $3, hold_id = $4, holder_id = $5, updated_at = now()
            WHERE event_id = $1 AND seat_id = $2 AND status = $6 AND status <> 'SOLD'
              AND ($7::UUID IS NULL OR hold_id = $7)
            "#,
        )
        .bind(&transition.event_id)
        .bind(&transition.seat_id)
        .bind(transition.next.as_str())
        .bind(transition.hold_id)
        .bind(&transition.holder_id)
        .bind(transition.expected.as_str())
        .bind(transition.expected_hold)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl HoldRepository for PostgresStore {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO holds (id, event_id, seat_ids, holder_id, expire_at, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(hold.id)
        .bind(&hold.event_id)
        .bind(&hold.seat_ids)
        .bind(&hold.holder_id)
        .bind(hold.expire_at)
        .bind(hold.status.as_str())
        .bind(hold.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_hold(&self, id: Uuid) -> StoreResult<Option<Hold>> {
        let row: Option<HoldRow> =
            sqlx::query_as(&format!("SELECT {HOLD_COLUMNS} FROM holds WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Hold::try_from).transpose()
    }

    async fn transition_hold(&self, id: Uuid, from: HoldStatus, to: HoldStatus) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE holds SET status = $3, updated_at = now() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_unclaimed_hold(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            DELETE FROM holds
            WHERE id = $1 AND status = 'ACTIVE'
              AND NOT EXISTS (SELECT 1 FROM seat_inventory WHERE hold_id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_holds(&self, status: HoldStatus) -> StoreResult<Vec<Hold>> {
        let rows: Vec<HoldRow> = sqlx::query_as(&format!(
            "SELECT {HOLD_COLUMNS} FROM holds WHERE status = $1 ORDER BY created_at DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        convert_all(rows)
    }

    async fn find_expired_holds(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM holds
            WHERE status = 'ACTIVE' AND expire_at < $1
            ORDER BY expire_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn find_stranded_holds(&self, limit: usize) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT h.id FROM holds h
            WHERE h.status = 'EXPIRED'
              AND EXISTS (
                SELECT 1 FROM seat_inventory si
                WHERE si.hold_id = h.id AND si.status = 'HELD'
              )
            ORDER BY h.expire_at
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn active_holds_for(&self, holder_id: &str) -> StoreResult<Vec<Hold>> {
        let rows: Vec<HoldRow> = sqlx::query_as(&format!(
            "SELECT {HOLD_COLUMNS} FROM holds WHERE status = 'ACTIVE' AND holder_id = $1"
        ))
        .bind(holder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        convert_all(rows)
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn find_order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_request_id = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(Order::try_from).transpose()
    }

    async fn tickets_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let rows: Vec<TicketRow> = sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE order_id = $1 ORDER BY seat_id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn orders_for(&self, holder_id: &str) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE holder_id = $1 ORDER BY created_at DESC"
        ))
        .bind(holder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        convert_all(rows)
    }

    async fn tickets_for(&self, holder_id: &str) -> StoreResult<Vec<Ticket>> {
        let rows: Vec<TicketRow> = sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE holder_id = $1 ORDER BY created_at DESC"
        ))
        .bind(holder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }
}

#[async_trait]
impl CatalogRepository for PostgresStore {
    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, name, date, venue, image_url, status FROM events WHERE status = 'active' ORDER BY date",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn get_event(&self, event_id: &str) -> StoreResult<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT id, name, date, venue, image_url, status FROM events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Event::from))
    }

    async fn list_seats(&self) -> StoreResult<Vec<Seat>> {
        // Length first so row "10" sorts after row "9".
        let rows: Vec<SeatRow> = sqlx::query_as(&format!(
            r#"SELECT {SEAT_COLUMNS} FROM seats
               ORDER BY section, length("row"), "row", length(number), number"#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Seat::from).collect())
    }

    async fn get_seat(&self, seat_id: &str) -> StoreResult<Option<Seat>> {
        let row: Option<SeatRow> =
            sqlx::query_as(&format!("SELECT {SEAT_COLUMNS} FROM seats WHERE id = $1"))
                .bind(seat_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Seat::from))
    }
}

/// Rolls back and reports which guard failed.
async fn abort(
    tx: Transaction<'_, Postgres>,
    outcome: CommitOutcome,
) -> StoreResult<CommitOutcome> {
    tx.rollback().await.map_err(db_err)?;
    Ok(outcome)
}

#[async_trait]
impl SettlementStore for PostgresStore {
    async fn commit_settlement(
        &self,
        commit: &SettlementCommit,
        now: DateTime<Utc>,
    ) -> StoreResult<CommitOutcome> {
        let order = &commit.order;
        let hold = &commit.hold;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, holder_id, event_id, seat_ids, amount, status, payment_request_id, hold_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (payment_request_id) DO NOTHING
            "#,
        )
        .bind(order.id)
        .bind(&order.holder_id)
        .bind(&order.event_id)
        .bind(&order.seat_ids)
        .bind(order.amount)
        .bind(order.status.as_str())
        .bind(&order.idempotency_key)
        .bind(order.hold_id)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();
        if inserted == 0 {
            return abort(tx, CommitOutcome::DuplicateKey).await;
        }

        let confirmed = sqlx::query(
            r#"
            UPDATE holds SET status = 'CONFIRMED', updated_at = now()
            WHERE id = $1 AND status = 'ACTIVE' AND expire_at >= $2
            "#,
        )
        .bind(hold.id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();
        if confirmed == 0 {
            return abort(tx, CommitOutcome::HoldNotActive).await;
        }

        for seat_id in &hold.seat_ids {
            let sold = sqlx::query(
                r#"
                UPDATE seat_inventory
                SET status = 'SOLD', hold_id = NULL, holder_id = NULL, updated_at = now()
                WHERE event_id = $1 AND seat_id = $2 AND status = 'HELD' AND hold_id = $3
                "#,
            )
            .bind(&hold.event_id)
            .bind(seat_id)
            .bind(hold.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
            if sold == 0 {
                warn!(hold_id = %hold.id, seat_id = %seat_id, "Seat no longer linked to confirming hold");
                return abort(
                    tx,
                    CommitOutcome::InventoryDetached {
                        seat_id: seat_id.clone(),
                    },
                )
                .await;
            }
        }

        for ticket in &commit.tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (id, event_id, seat_id, holder_id, code, order_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(ticket.id)
            .bind(&ticket.event_id)
            .bind(&ticket.seat_id)
            .bind(&ticket.holder_id)
            .bind(&ticket.code)
            .bind(ticket.order_id)
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(order_id = %order.id, hold_id = %hold.id, "Settlement committed");
        Ok(CommitOutcome::Committed)
    }
}
