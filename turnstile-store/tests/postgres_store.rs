//! Runs against a live Postgres. Start one and set DATABASE_URL, then
//! `cargo test -p turnstile-store -- --ignored`.
//!
//! Every test books seats on an event of its own, so tests can run in
//! parallel and repeated runs never exhaust the demo seats.

use chrono::{DateTime, Duration, Utc};
use turnstile_core::{
    CommitOutcome, HoldRepository, InventoryStore, OrderRepository, SeatTransition,
    SettlementCommit, SettlementStore,
};
use turnstile_shared::{Event, Hold, HoldStatus, Order, OrderStatus, SeatStatus, Ticket};
use turnstile_store::app_config::DatabaseConfig;
use turnstile_store::seed::demo_seats;
use turnstile_store::{CatalogLoader, DbClient, PostgresStore};
use uuid::Uuid;

async fn connect() -> PostgresStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = DbClient::new(&DatabaseConfig {
        url,
        max_connections: 5,
        acquire_timeout_seconds: 3,
    })
    .await
    .expect("connect");
    db.migrate().await.expect("migrate");
    PostgresStore::new(db.pool.clone())
}

async fn fresh_event(store: &PostgresStore) -> String {
    let event = Event {
        id: format!("it-{}", Uuid::new_v4()),
        name: "Integration Grand Prix".to_string(),
        date: "Nov 23, 2025 3:00 PM".to_string(),
        venue: "Test Circuit".to_string(),
        image_url: None,
        status: "active".to_string(),
    };
    store
        .load_catalog(&[event.clone()], &demo_seats())
        .await
        .expect("seed");
    event.id
}

/// Inserts a hold on `seats` and acquires each of `acquire` for it.
async fn hold_on(
    store: &PostgresStore,
    event_id: &str,
    seats: &[&str],
    acquire: &[&str],
    created_at: DateTime<Utc>,
) -> Hold {
    let hold = Hold::new(
        event_id.to_string(),
        seats.iter().map(|s| s.to_string()).collect(),
        "it-user".to_string(),
        created_at,
        Duration::minutes(10),
    );
    store.insert_hold(&hold).await.unwrap();
    for seat_id in acquire {
        let t = SeatTransition::acquire(event_id, seat_id, hold.id, "it-user");
        assert!(store.compare_and_set_status(&t).await.unwrap());
    }
    hold
}

fn commit_for(hold: &Hold, key: &str) -> SettlementCommit {
    let order = Order {
        id: Uuid::new_v4(),
        holder_id: hold.holder_id.clone(),
        event_id: hold.event_id.clone(),
        seat_ids: hold.seat_ids.clone(),
        amount: 104,
        status: OrderStatus::Paid,
        idempotency_key: key.to_string(),
        hold_id: hold.id,
        created_at: Utc::now(),
    };
    let tickets = hold
        .seat_ids
        .iter()
        .map(|seat_id| Ticket {
            id: Uuid::new_v4(),
            event_id: hold.event_id.clone(),
            seat_id: seat_id.clone(),
            holder_id: hold.holder_id.clone(),
            code: format!("TRN-IT-{}", Uuid::new_v4().simple()),
            order_id: order.id,
            created_at: Utc::now(),
        })
        .collect();
    SettlementCommit {
        hold: hold.clone(),
        order,
        tickets,
    }
}

async fn seat_row(store: &PostgresStore, event_id: &str, seat_id: &str) -> turnstile_shared::SeatInventory {
    store
        .get_seat_inventory(event_id, seat_id)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_cas_acquire_and_release() {
    let store = connect().await;
    let event_id = fresh_event(&store).await;
    let hold = hold_on(&store, &event_id, &["A1-1"], &[], Utc::now()).await;

    let acquire = SeatTransition::acquire(&event_id, "A1-1", hold.id, "it-user");
    assert!(store.compare_and_set_status(&acquire).await.unwrap());
    assert!(!store.compare_and_set_status(&acquire).await.unwrap());

    let release = SeatTransition::release(&event_id, "A1-1", hold.id);
    assert!(store.compare_and_set_status(&release).await.unwrap());
    let row = seat_row(&store, &event_id, "A1-1").await;
    assert_eq!(row.status, SeatStatus::Available);
    assert!(row.hold_id.is_none());
}

#[tokio::test]
#[ignore]
async fn test_sold_seat_refuses_unsell() {
    let store = connect().await;
    let event_id = fresh_event(&store).await;
    let hold = hold_on(&store, &event_id, &["A1-1"], &["A1-1"], Utc::now()).await;
    assert!(store
        .compare_and_set_status(&SeatTransition::sell(&event_id, "A1-1", hold.id))
        .await
        .unwrap());

    let unsell = SeatTransition {
        event_id: event_id.clone(),
        seat_id: "A1-1".to_string(),
        expected: SeatStatus::Sold,
        expected_hold: None,
        next: SeatStatus::Available,
        hold_id: None,
        holder_id: None,
    };
    assert!(!store.compare_and_set_status(&unsell).await.unwrap());
    assert_eq!(seat_row(&store, &event_id, "A1-1").await.status, SeatStatus::Sold);
}

#[tokio::test]
#[ignore]
async fn test_settlement_commits_then_reports_duplicate_key() {
    let store = connect().await;
    let event_id = fresh_event(&store).await;
    let hold = hold_on(&store, &event_id, &["A1-1", "A1-2"], &["A1-1", "A1-2"], Utc::now()).await;
    let key = format!("it-{}", Uuid::new_v4());

    let commit = commit_for(&hold, &key);
    let outcome = store.commit_settlement(&commit, Utc::now()).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Committed);

    let order = store.find_order_by_idempotency_key(&key).await.unwrap().unwrap();
    assert_eq!(order.id, commit.order.id);
    assert_eq!(store.tickets_for_order(order.id).await.unwrap().len(), 2);
    assert_eq!(store.get_hold(hold.id).await.unwrap().unwrap().status, HoldStatus::Confirmed);
    for seat_id in ["A1-1", "A1-2"] {
        let row = seat_row(&store, &event_id, seat_id).await;
        assert_eq!(row.status, SeatStatus::Sold);
        assert!(row.hold_id.is_none());
    }

    // A retry builds a new order under the same key.
    let retry = commit_for(&hold, &key);
    let outcome = store.commit_settlement(&retry, Utc::now()).await.unwrap();
    assert_eq!(outcome, CommitOutcome::DuplicateKey);
    let order = store.find_order_by_idempotency_key(&key).await.unwrap().unwrap();
    assert_eq!(order.id, commit.order.id);
    assert_eq!(store.tickets_for_order(retry.order.id).await.unwrap().len(), 0);
}

#[tokio::test]
#[ignore]
async fn test_settlement_after_expiry_changes_nothing() {
    let store = connect().await;
    let event_id = fresh_event(&store).await;
    let created = Utc::now() - Duration::minutes(20);
    let hold = hold_on(&store, &event_id, &["B1-1"], &["B1-1"], created).await;
    let key = format!("it-{}", Uuid::new_v4());

    let outcome = store
        .commit_settlement(&commit_for(&hold, &key), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::HoldNotActive);

    assert!(store.find_order_by_idempotency_key(&key).await.unwrap().is_none());
    assert_eq!(store.get_hold(hold.id).await.unwrap().unwrap().status, HoldStatus::Active);
    let row = seat_row(&store, &event_id, "B1-1").await;
    assert_eq!(row.status, SeatStatus::Held);
    assert_eq!(row.hold_id, Some(hold.id));

    let expired = store.find_expired_holds(Utc::now(), 10_000).await.unwrap();
    assert!(expired.contains(&hold.id));
}

#[tokio::test]
#[ignore]
async fn test_settlement_with_detached_seat_rolls_back() {
    let store = connect().await;
    let event_id = fresh_event(&store).await;
    // Second seat never acquired: it is not linked to the hold.
    let hold = hold_on(&store, &event_id, &["C1-1", "C1-2"], &["C1-1"], Utc::now()).await;
    let key = format!("it-{}", Uuid::new_v4());

    let outcome = store
        .commit_settlement(&commit_for(&hold, &key), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CommitOutcome::InventoryDetached {
            seat_id: "C1-2".to_string()
        }
    );

    assert!(store.find_order_by_idempotency_key(&key).await.unwrap().is_none());
    assert_eq!(store.get_hold(hold.id).await.unwrap().unwrap().status, HoldStatus::Active);
    let row = seat_row(&store, &event_id, "C1-1").await;
    assert_eq!(row.status, SeatStatus::Held);
    assert_eq!(row.hold_id, Some(hold.id));
    assert_eq!(seat_row(&store, &event_id, "C1-2").await.status, SeatStatus::Available);
}

#[tokio::test]
#[ignore]
async fn test_hold_transitions_and_stranded_lookup() {
    let store = connect().await;
    let event_id = fresh_event(&store).await;
    let hold = hold_on(&store, &event_id, &["D1-1"], &["D1-1"], Utc::now()).await;

    assert!(!store
        .transition_hold(hold.id, HoldStatus::Confirmed, HoldStatus::Expired)
        .await
        .unwrap());
    assert!(store
        .transition_hold(hold.id, HoldStatus::Active, HoldStatus::Expired)
        .await
        .unwrap());
    assert!(store.find_stranded_holds(10_000).await.unwrap().contains(&hold.id));

    store
        .compare_and_set_status(&SeatTransition::release(&event_id, "D1-1", hold.id))
        .await
        .unwrap();
    assert!(!store.find_stranded_holds(10_000).await.unwrap().contains(&hold.id));
}

#[tokio::test]
#[ignore]
async fn test_delete_unclaimed_hold_keeps_holds_with_seats() {
    let store = connect().await;
    let event_id = fresh_event(&store).await;

    let claimed = hold_on(&store, &event_id, &["E1-1"], &["E1-1"], Utc::now()).await;
    store.delete_unclaimed_hold(claimed.id).await.unwrap();
    assert!(store.get_hold(claimed.id).await.unwrap().is_some());

    let unclaimed = hold_on(&store, &event_id, &["E1-2"], &[], Utc::now()).await;
    store.delete_unclaimed_hold(unclaimed.id).await.unwrap();
    assert!(store.get_hold(unclaimed.id).await.unwrap().is_none());
}
