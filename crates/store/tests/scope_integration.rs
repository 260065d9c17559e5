//! Transaction scope tests against the in-memory store.

use std::time::Duration;

use common::{AddressId, OrderId, ProductId, UserId};
use domain::{Money, Order, OrderLine, OrderNumber};
use store::{InMemoryStore, OrderStore, StoreError, TransactionScope, TransactionalStore};

fn order(number: &str) -> Order {
    Order::place(
        OrderId::new(),
        OrderNumber::parse(number).unwrap(),
        UserId::new(),
        AddressId::new(),
        vec![OrderLine::new(
            ProductId::new(),
            "Widget",
            1,
            Money::from_cents(1000),
        )],
    )
    .unwrap()
}

#[tokio::test]
async fn ok_result_commits() {
    let store = InMemoryStore::new();
    let scope = TransactionScope::new(store.clone());
    let placed = order("ORD-2026-000001");
    let order_id = placed.id();

    let id = scope
        .execute(move |tx| {
            Box::pin(async move {
                tx.insert_order(&placed).await?;
                Ok::<_, StoreError>(placed.id())
            })
        })
        .await
        .unwrap();

    assert_eq!(id, order_id);
    assert_eq!(store.order_count().await, 1);
}

#[tokio::test]
async fn err_result_rolls_back_every_write() {
    let store = InMemoryStore::new();
    let scope = TransactionScope::new(store.clone());
    let first = order("ORD-2026-000001");
    let second = order("ORD-2026-000002");

    let result: Result<(), StoreError> = scope
        .execute(move |tx| {
            Box::pin(async move {
                tx.insert_order(&first).await?;
                tx.insert_order(&second).await?;
                Err(StoreError::Injected("after both inserts".into()))
            })
        })
        .await;

    assert!(matches!(result, Err(StoreError::Injected(_))));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn timeout_rolls_back() {
    let store = InMemoryStore::new();
    store.delay_order_inserts(Duration::from_millis(200)).await;
    let scope = TransactionScope::new(store.clone()).with_timeout(Duration::from_millis(20));
    let placed = order("ORD-2026-000001");

    let result = scope
        .execute(move |tx| Box::pin(async move { tx.insert_order(&placed).await }))
        .await;

    assert!(matches!(result, Err(StoreError::Timeout(_))));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn cancellation_rolls_back() {
    let store = InMemoryStore::new();
    let scope = TransactionScope::new(store.clone());
    let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
    let placed = order("ORD-2026-000001");

    let run = scope.execute_until(
        async move {
            let _ = cancel_rx.await;
        },
        move |tx| {
            Box::pin(async move {
                tx.insert_order(&placed).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
        },
    );
    let (result, _) = tokio::join!(run, async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _ = cancel_tx.send(());
    });

    assert!(matches!(result, Err(StoreError::Cancelled)));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn later_commit_loses_on_duplicate_number() {
    let store = InMemoryStore::new();
    let scope = TransactionScope::new(store.clone());

    // Competing transaction opened before the scope commits the same number.
    let mut competitor = store.begin().await.unwrap();
    competitor
        .insert_order(&order("ORD-2026-000001"))
        .await
        .unwrap();

    let placed = order("ORD-2026-000001");
    scope
        .execute(move |tx| Box::pin(async move { tx.insert_order(&placed).await }))
        .await
        .unwrap();

    let result = store::UnitOfWork::commit(competitor).await;
    assert!(matches!(result, Err(StoreError::DuplicateOrderNumber(_))));
    assert_eq!(store.order_count().await, 1);
}
