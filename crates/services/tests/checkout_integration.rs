//! Integration tests for checkout against the in-memory store.

use std::collections::HashSet;
use std::time::Duration;

use common::{AddressId, CartId, ProductId, UserId};
use domain::{ErrorKind, Money, OrderStatus};
use services::{
    AddCartItem, CartService, Checkout, CheckoutConfig, CheckoutService, OrderService,
    ServiceError,
};
use store::{InMemoryStore, Product, TransactionScope};

struct TestHarness {
    store: InMemoryStore,
    carts: CartService<InMemoryStore>,
    checkout: CheckoutService<InMemoryStore>,
    orders: OrderService<InMemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(CheckoutConfig::default())
    }

    fn with_config(config: CheckoutConfig) -> Self {
        let store = InMemoryStore::new();
        let scope = TransactionScope::new(store.clone());
        Self {
            carts: CartService::new(scope.clone()),
            orders: OrderService::new(scope),
            checkout: CheckoutService::new(store.clone(), &config),
            store,
        }
    }

    async fn product(&self, name: &str, cents: i64) -> ProductId {
        let product = Product::new(ProductId::new(), name, Money::from_cents(cents));
        let id = product.id;
        self.store.seed_product(product).await;
        id
    }

    async fn reprice(&self, product_id: ProductId, name: &str, cents: i64) {
        self.store
            .seed_product(Product::new(product_id, name, Money::from_cents(cents)))
            .await;
    }

    /// A cart holding 2 x $10.00 and 1 x $25.00.
    async fn filled_cart(&self) -> (CartId, ProductId, ProductId) {
        let widget = self.product("Widget", 1000).await;
        let gadget = self.product("Gadget", 2500).await;
        let user_id = UserId::new();
        self.carts
            .add_item(AddCartItem::new(user_id, widget, 2))
            .await
            .unwrap();
        let cart = self
            .carts
            .add_item(AddCartItem::new(user_id, gadget, 1))
            .await
            .unwrap();
        (cart.id(), widget, gadget)
    }
}

#[tokio::test]
async fn test_checkout_places_pending_order() {
    let h = TestHarness::new();
    let (cart_id, _, _) = h.filled_cart().await;

    let order = h
        .checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap();

    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.total_amount(), Money::from_cents(4500));
    assert_eq!(order.item_count(), 2);
    assert_eq!(order.items()[0].total_price(), Money::from_cents(2000));
    assert_eq!(order.items()[1].total_price(), Money::from_cents(2500));

    let cart = h.carts.get_cart_by_id(cart_id).await.unwrap();
    assert_eq!(cart.converted_order_id(), Some(order.id()));

    let loaded = h.orders.get_order(order.id()).await.unwrap();
    assert_eq!(loaded.order_number(), order.order_number());
    assert_eq!(h.store.order_item_count().await, 2);
}

#[tokio::test]
async fn test_checkout_snapshots_live_catalog_price() {
    let h = TestHarness::new();
    let (cart_id, widget, _) = h.filled_cart().await;
    h.reprice(widget, "Widget Deluxe", 1200).await;

    let order = h
        .checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap();

    assert_eq!(order.items()[0].product_name(), "Widget Deluxe");
    assert_eq!(order.items()[0].unit_price(), Money::from_cents(1200));
    assert_eq!(order.total_amount(), Money::from_cents(4900));

    // Later catalog changes do not reach the placed order.
    h.reprice(widget, "Widget", 9999).await;
    let loaded = h.orders.get_order(order.id()).await.unwrap();
    assert_eq!(loaded.items()[0].unit_price(), Money::from_cents(1200));
}

#[tokio::test]
async fn test_order_number_format_and_sequence() {
    let h = TestHarness::new();
    let (first, _, _) = h.filled_cart().await;
    let (second, _, _) = h.filled_cart().await;

    let a = h
        .checkout
        .checkout(Checkout::new(first, AddressId::new()))
        .await
        .unwrap();
    let b = h
        .checkout
        .checkout(Checkout::new(second, AddressId::new()))
        .await
        .unwrap();

    let prefix = h
        .checkout
        .order_numbers()
        .partition_prefix(chrono::Utc::now());
    assert_eq!(a.order_number().as_str(), format!("{prefix}000001"));
    assert_eq!(b.order_number().as_str(), format!("{prefix}000002"));
}

#[tokio::test]
async fn test_second_checkout_of_same_cart_conflicts() {
    let h = TestHarness::new();
    let (cart_id, _, _) = h.filled_cart().await;
    let first = h
        .checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap();

    let err = h
        .checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::CartAlreadyConverted { order_id, .. } if order_id == first.id()
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_checkouts_of_same_cart_place_one_order() {
    let h = TestHarness::new();
    let (cart_id, _, _) = h.filled_cart().await;

    let (a, b) = tokio::join!(
        h.checkout.checkout(Checkout::new(cart_id, AddressId::new())),
        h.checkout.checkout(Checkout::new(cart_id, AddressId::new())),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let loser = a.err().or(b.err()).unwrap();
    assert!(matches!(loser, ServiceError::CartAlreadyConverted { .. }));
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_checkouts_get_unique_numbers() {
    let config = CheckoutConfig {
        max_attempts: 10,
        ..CheckoutConfig::default()
    };
    let h = TestHarness::with_config(config);
    let mut carts = Vec::new();
    for _ in 0..8 {
        carts.push(h.filled_cart().await.0);
    }

    let handles: Vec<_> = carts
        .into_iter()
        .map(|cart_id| {
            let checkout = h.checkout.clone();
            tokio::spawn(async move {
                checkout
                    .checkout(Checkout::new(cart_id, AddressId::new()))
                    .await
            })
        })
        .collect();

    let mut numbers = HashSet::new();
    for result in futures_util::future::join_all(handles).await {
        let order = result.unwrap().unwrap();
        assert!(numbers.insert(order.order_number().as_str().to_string()));
    }
    assert_eq!(numbers.len(), 8);
    assert_eq!(h.store.order_count().await, 8);
}

#[tokio::test]
async fn test_failed_item_insert_leaves_nothing_behind() {
    let h = TestHarness::new();
    let (cart_id, _, gadget) = h.filled_cart().await;
    h.store.fail_order_items_for(gadget).await;

    let err = h
        .checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.order_item_count().await, 0);
    let cart = h.carts.get_cart_by_id(cart_id).await.unwrap();
    assert!(!cart.is_converted());

    // The cart is still usable once the fault is gone.
    h.store.clear_faults().await;
    h.checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_timed_out_checkout_rolls_back() {
    let config = CheckoutConfig {
        timeout: Duration::from_millis(20),
        ..CheckoutConfig::default()
    };
    let h = TestHarness::with_config(config);
    let (cart_id, _, _) = h.filled_cart().await;
    h.store.delay_order_inserts(Duration::from_millis(200)).await;

    let err = h
        .checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Store(store::StoreError::Timeout(_))
    ));
    assert_eq!(h.store.order_count().await, 0);
    assert!(
        !h.carts
            .get_cart_by_id(cart_id)
            .await
            .unwrap()
            .is_converted()
    );
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let h = TestHarness::new();
    let cart = h.carts.get_or_create_cart(UserId::new()).await.unwrap();

    let err = h
        .checkout
        .checkout(Checkout::new(cart.id(), AddressId::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::EmptyCart { .. }));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(
        !h.carts
            .get_cart_by_id(cart.id())
            .await
            .unwrap()
            .is_converted()
    );
}

#[tokio::test]
async fn test_missing_cart_is_not_found() {
    let h = TestHarness::new();

    let err = h
        .checkout
        .checkout(Checkout::new(CartId::new(), AddressId::new()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_discontinued_product_blocks_checkout() {
    let h = TestHarness::new();
    let (cart_id, widget, _) = h.filled_cart().await;
    let mut product = Product::new(widget, "Widget", Money::from_cents(1000));
    product.is_active = false;
    h.store.seed_product(product).await;

    let err = h
        .checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::ProductUnavailable(id) if id == widget));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_user_gets_a_new_cart_after_checkout() {
    let h = TestHarness::new();
    let (cart_id, widget, _) = h.filled_cart().await;
    let user_id = h.carts.get_cart_by_id(cart_id).await.unwrap().user_id();
    h.checkout
        .checkout(Checkout::new(cart_id, AddressId::new()))
        .await
        .unwrap();

    assert!(h.carts.get_cart(user_id).await.unwrap().is_none());
    let next = h
        .carts
        .add_item(AddCartItem::new(user_id, widget, 1))
        .await
        .unwrap();
    assert_ne!(next.id(), cart_id);
    assert_eq!(next.distinct_items(), 1);
}
