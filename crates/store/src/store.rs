use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, OrderId, PaymentId, ProductId, UserId};
use domain::{Cart, CartItem, Money, Order, OrderNumber, Payment};

use crate::Result;

/// Catalog entry as seen by checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub is_active: bool,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            is_active: true,
        }
    }
}

/// Cart persistence.
///
/// Every method runs inside the unit of work that owns `self`.
#[async_trait]
pub trait CartStore: Send {
    /// Loads a cart with its lines in insertion order.
    async fn find_cart(&mut self, cart_id: CartId) -> Result<Option<Cart>>;

    /// Loads the user's unconverted cart, if any.
    async fn find_open_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Inserts a new cart. Fails with `OpenCartExists` if the user already
    /// owns an unconverted one.
    async fn insert_cart(&mut self, cart: &Cart) -> Result<()>;

    /// Writes the cart header. Fails with `CartAlreadyConverted` once the
    /// cart was claimed, so line writes after it cannot race a checkout.
    async fn update_cart(&mut self, cart: &Cart) -> Result<()>;

    async fn delete_cart(&mut self, cart_id: CartId) -> Result<()>;

    /// Inserts or replaces the line for the item's product.
    async fn save_cart_item(&mut self, item: &CartItem) -> Result<()>;

    async fn delete_cart_item(&mut self, cart_id: CartId, product_id: ProductId) -> Result<()>;

    async fn clear_cart_items(&mut self, cart_id: CartId) -> Result<()>;

    /// Atomically marks an unconverted cart as converted into `order_id`.
    ///
    /// This is a compare-and-set: exactly one claimant succeeds, every
    /// other one gets `CartAlreadyConverted`.
    async fn claim_cart(
        &mut self,
        cart_id: CartId,
        order_id: OrderId,
        converted_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send {
    /// Loads an order with its lines and payments.
    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_number(&mut self, number: &OrderNumber) -> Result<Option<Order>>;

    /// Inserts the order header and all of its lines.
    ///
    /// Fails with `DuplicateOrderNumber` if the number is taken.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Writes status, total, shipping address and timestamp.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Returns the highest numeric suffix among order numbers that start
    /// with `prefix`.
    async fn max_order_sequence(&mut self, prefix: &str) -> Result<Option<u32>>;
}

/// Payment persistence.
#[async_trait]
pub trait PaymentStore: Send {
    async fn find_payment(&mut self, payment_id: PaymentId) -> Result<Option<Payment>>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    /// Writes amount, status, transaction id and timestamps.
    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;
}

/// Current product data used to snapshot order lines.
#[async_trait]
pub trait ProductCatalog: Send {
    async fn find_product(&mut self, product_id: ProductId) -> Result<Option<Product>>;

    async fn save_product(&mut self, product: &Product) -> Result<()>;
}

/// One open transaction shared by every gateway taking part in it.
///
/// Dropping a unit of work without committing rolls it back.
#[async_trait]
pub trait UnitOfWork: CartStore + OrderStore + PaymentStore + ProductCatalog + Send + Sized {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// A store that can open units of work.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    type Tx: UnitOfWork + 'static;

    async fn begin(&self) -> Result<Self::Tx>;
}
