//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{AddressId, OrderId, ProductId, UserId};
use domain::{Cart, Money, Order, OrderLine, OrderNumber, OrderStatus, Payment, PaymentMethod};
use sqlx::PgPool;
use store::{
    CartStore, OrderStore, PaymentStore, PostgresStore, Product, ProductCatalog, StoreError,
    TransactionScope, TransactionalStore, UnitOfWork,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_commerce_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE payments, order_items, orders, cart_items, carts, products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn order(number: &str, product_id: ProductId) -> Order {
    Order::place(
        OrderId::new(),
        OrderNumber::parse(number).unwrap(),
        UserId::new(),
        AddressId::new(),
        vec![
            OrderLine::new(product_id, "Product A", 2, Money::from_cents(1000)),
            OrderLine::new(ProductId::new(), "Product B", 1, Money::from_cents(2500)),
        ],
    )
    .unwrap()
}

async fn committed_cart(store: &PostgresStore) -> Cart {
    let mut cart = Cart::new(UserId::new()).unwrap();
    cart.add_item(ProductId::new(), 2, Money::from_cents(1000))
        .unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.insert_cart(&cart).await.unwrap();
    tx.commit().await.unwrap();
    cart
}

#[tokio::test]
async fn order_round_trips_with_items_in_order() {
    let store = get_test_store().await;
    let placed = order("ORD-2026-000001", ProductId::new());

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&placed).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.find_order(placed.id()).await.unwrap().unwrap();
    assert_eq!(loaded.order_number().as_str(), "ORD-2026-000001");
    assert_eq!(loaded.total_amount(), Money::from_cents(4500));
    assert_eq!(loaded.status(), OrderStatus::Pending);
    let names: Vec<_> = loaded.items().iter().map(|i| i.product_name()).collect();
    assert_eq!(names, vec!["Product A", "Product B"]);

    let by_number = tx
        .find_order_by_number(placed.order_number())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_number.id(), placed.id());
}

#[tokio::test]
async fn duplicate_order_number_is_reported() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order("ORD-2026-000001", ProductId::new()))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .insert_order(&order("ORD-2026-000001", ProductId::new()))
        .await;
    assert!(matches!(result, Err(StoreError::DuplicateOrderNumber(_))));
}

#[tokio::test]
async fn rollback_discards_order_and_items() {
    let store = get_test_store().await;
    let placed = order("ORD-2026-000001", ProductId::new());

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&placed).await.unwrap();
    tx.rollback().await.unwrap();

    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
        .fetch_one(store.pool())
        .await
        .unwrap();
    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_order(placed.id()).await.unwrap().is_none());
    assert_eq!(items, 0);
}

#[tokio::test]
async fn claim_cart_only_once() {
    let store = get_test_store().await;
    let cart = committed_cart(&store).await;
    let winner = OrderId::new();

    let mut tx = store.begin().await.unwrap();
    tx.claim_cart(cart.id(), winner, Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx.claim_cart(cart.id(), OrderId::new(), Utc::now()).await;
    assert!(matches!(
        result,
        Err(StoreError::CartAlreadyConverted { order_id, .. }) if order_id == winner
    ));
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() {
    let store = get_test_store().await;
    let cart = committed_cart(&store).await;

    let mut first = store.begin().await.unwrap();
    first
        .claim_cart(cart.id(), OrderId::new(), Utc::now())
        .await
        .unwrap();

    let contender = {
        let store = store.clone();
        let cart_id = cart.id();
        tokio::spawn(async move {
            let mut second = store.begin().await.unwrap();
            // Blocks on the row lock until the first claim commits.
            let result = second.claim_cart(cart_id, OrderId::new(), Utc::now()).await;
            second.rollback().await.unwrap();
            result
        })
    };

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    first.commit().await.unwrap();

    let result = contender.await.unwrap();
    assert!(matches!(result, Err(StoreError::CartAlreadyConverted { .. })));
}

#[tokio::test]
async fn claim_missing_cart_is_not_found() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let result = tx
        .claim_cart(common::CartId::new(), OrderId::new(), Utc::now())
        .await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn one_open_cart_per_user() {
    let store = get_test_store().await;
    let cart = committed_cart(&store).await;

    let mut tx = store.begin().await.unwrap();
    let result = tx.insert_cart(&Cart::new(cart.user_id()).unwrap()).await;
    assert!(matches!(result, Err(StoreError::OpenCartExists { .. })));
}

#[tokio::test]
async fn cart_items_upsert_by_product() {
    let store = get_test_store().await;
    let mut cart = committed_cart(&store).await;
    let product = cart.items()[0].product_id();

    let mut tx = store.begin().await.unwrap();
    let item = cart.add_item(product, 3, Money::from_cents(1000)).unwrap();
    tx.save_cart_item(item).await.unwrap();
    tx.update_cart(&cart).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.find_open_cart(cart.user_id()).await.unwrap().unwrap();
    assert_eq!(loaded.distinct_items(), 1);
    assert_eq!(loaded.item(product).unwrap().quantity(), 5);
}

#[tokio::test]
async fn update_cart_after_claim_conflicts() {
    let store = get_test_store().await;
    let cart = committed_cart(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.claim_cart(cart.id(), OrderId::new(), Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx.update_cart(&cart).await;
    assert!(matches!(result, Err(StoreError::CartAlreadyConverted { .. })));
}

#[tokio::test]
async fn max_order_sequence_reads_numeric_suffix() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    for number in ["ORD-2026-000007", "ORD-2026-000012", "ORD-2025-000099"] {
        tx.insert_order(&order(number, ProductId::new()))
            .await
            .unwrap();
    }

    assert_eq!(tx.max_order_sequence("ORD-2026-").await.unwrap(), Some(12));
    assert_eq!(tx.max_order_sequence("ORD-2027-").await.unwrap(), None);
}

#[tokio::test]
async fn payments_load_with_order() {
    let store = get_test_store().await;
    let placed = order("ORD-2026-000001", ProductId::new());
    let mut payment = Payment::new(
        placed.id(),
        Money::from_cents(4500),
        PaymentMethod::CreditCard,
        Some("gw-1"),
    )
    .unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&placed).await.unwrap();
    tx.insert_payment(&payment).await.unwrap();
    payment.start_processing().unwrap();
    payment.complete().unwrap();
    tx.update_payment(&payment).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.find_order(placed.id()).await.unwrap().unwrap();
    assert!(loaded.is_fully_paid());
    assert_eq!(loaded.payments()[0].transaction_id(), Some("gw-1"));
    assert!(loaded.payments()[0].processed_at().is_some());
}

#[tokio::test]
async fn scope_rolls_back_on_error() {
    let store = get_test_store().await;
    let scope = TransactionScope::new(store.clone());
    let product = Product::new(ProductId::new(), "Widget", Money::from_cents(999));
    let placed = order("ORD-2026-000001", ProductId::new());
    let order_id = placed.id();

    let result: Result<(), StoreError> = scope
        .execute(move |tx| {
            Box::pin(async move {
                tx.save_product(&product).await?;
                tx.insert_order(&placed).await?;
                Err(StoreError::Injected("abort".into()))
            })
        })
        .await;
    assert!(result.is_err());

    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_order(order_id).await.unwrap().is_none());
    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(products, 0);
}
