use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, OrderId, PaymentId, ProductId, UserId};
use domain::{
    Cart, CartItem, CartItemRecord, CartRecord, Order, OrderItem, OrderItemRecord, OrderNumber,
    OrderRecord, Payment, PaymentRecord,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{CartStore, OrderStore, PaymentStore, Product, ProductCatalog, TransactionalStore, UnitOfWork},
};

/// In-memory store implementation for testing.
///
/// Each unit of work operates on a private copy of the tables and records
/// which rows it touched. Commit re-checks the uniqueness and
/// compare-and-set conditions against the shared tables under a write lock
/// and then publishes the touched rows, so concurrent units of work behave
/// like serializable database transactions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<Faults>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    carts: HashMap<CartId, CartRow>,
    cart_items: HashMap<CartItemId, (u64, CartItemRecord)>,
    orders: HashMap<OrderId, (OrderRecord, Vec<OrderItemRecord>)>,
    payments: HashMap<PaymentId, PaymentRecord>,
    products: HashMap<ProductId, Product>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    converted_order_id: Option<OrderId>,
    converted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct Faults {
    fail_order_items_for: Option<ProductId>,
    order_insert_delay: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Cart(CartId),
    CartItem(CartItemId),
    Order(OrderId),
    Payment(PaymentId),
    Product(ProductId),
}

#[derive(Debug, Clone)]
enum Check {
    CartOpen(CartId),
    UniqueOrderNumber { order_id: OrderId, number: String },
    SingleOpenCart { user_id: UserId, cart_id: CartId },
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog entry outside of any unit of work.
    pub async fn seed_product(&self, product: Product) {
        self.tables
            .write()
            .await
            .products
            .insert(product.id, product);
    }

    /// Makes every order insert containing `product_id` fail.
    pub async fn fail_order_items_for(&self, product_id: ProductId) {
        self.faults.write().await.fail_order_items_for = Some(product_id);
    }

    /// Delays every order insert.
    pub async fn delay_order_inserts(&self, delay: Duration) {
        self.faults.write().await.order_insert_delay = Some(delay);
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn order_item_count(&self) -> usize {
        self.tables
            .read()
            .await
            .orders
            .values()
            .map(|(_, items)| items.len())
            .sum()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        Ok(InMemoryTx {
            shared: Arc::clone(&self.tables),
            working: self.tables.read().await.clone(),
            faults: self.faults.read().await.clone(),
            dirty: HashSet::new(),
            checks: Vec::new(),
        })
    }
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryTx {
    shared: Arc<RwLock<Tables>>,
    working: Tables,
    faults: Faults,
    dirty: HashSet<Key>,
    checks: Vec<Check>,
}

impl InMemoryTx {
    fn load_cart(&self, row: &CartRow) -> Cart {
        let mut items: Vec<_> = self
            .working
            .cart_items
            .values()
            .filter(|(_, item)| item.cart_id == row.id)
            .collect();
        items.sort_by_key(|(seq, _)| *seq);

        Cart::restore(CartRecord {
            id: row.id,
            user_id: row.user_id,
            items: items
                .into_iter()
                .map(|(_, item)| CartItem::restore(item.clone()))
                .collect(),
            converted_order_id: row.converted_order_id,
            converted_at: row.converted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn load_order(&self, record: &OrderRecord, items: &[OrderItemRecord]) -> Result<Order> {
        let items = items
            .iter()
            .cloned()
            .map(OrderItem::restore)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::corrupt)?;

        let mut payments: Vec<_> = self
            .working
            .payments
            .values()
            .filter(|payment| payment.order_id == record.id)
            .cloned()
            .collect();
        payments.sort_by_key(|payment| payment.created_at);

        Ok(Order::restore(
            record.clone(),
            items,
            payments.into_iter().map(Payment::restore).collect(),
        ))
    }

    fn open_cart_row(&mut self, cart_id: CartId) -> Result<&mut CartRow> {
        let row = self
            .working
            .carts
            .get_mut(&cart_id)
            .ok_or_else(|| StoreError::not_found("cart", cart_id))?;
        if let Some(order_id) = row.converted_order_id {
            return Err(StoreError::CartAlreadyConverted { cart_id, order_id });
        }
        Ok(row)
    }

    /// Carts inserted by this unit of work are not in the shared tables yet;
    /// their commit check is `SingleOpenCart`.
    fn expect_open(&mut self, cart_id: CartId) {
        let inserted = self.checks.iter().any(
            |check| matches!(check, Check::SingleOpenCart { cart_id: id, .. } if *id == cart_id),
        );
        if !inserted {
            self.checks.push(Check::CartOpen(cart_id));
        }
    }

    fn cart_item_ids(&self, cart_id: CartId, product_id: Option<ProductId>) -> Vec<CartItemId> {
        self.working
            .cart_items
            .values()
            .filter(|(_, item)| {
                item.cart_id == cart_id && product_id.is_none_or(|p| item.product_id == p)
            })
            .map(|(_, item)| item.id)
            .collect()
    }
}

#[async_trait]
impl CartStore for InMemoryTx {
    async fn find_cart(&mut self, cart_id: CartId) -> Result<Option<Cart>> {
        Ok(self
            .working
            .carts
            .get(&cart_id)
            .map(|row| self.load_cart(row)))
    }

    async fn find_open_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self
            .working
            .carts
            .values()
            .find(|row| row.user_id == user_id && row.converted_order_id.is_none())
            .map(|row| self.load_cart(row)))
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<()> {
        let user_id = cart.user_id();
        let taken = self
            .working
            .carts
            .values()
            .any(|row| row.user_id == user_id && row.converted_order_id.is_none());
        if taken {
            return Err(StoreError::OpenCartExists { user_id });
        }

        self.working.carts.insert(
            cart.id(),
            CartRow {
                id: cart.id(),
                user_id,
                converted_order_id: cart.converted_order_id(),
                converted_at: cart.converted_at(),
                created_at: cart.created_at(),
                updated_at: cart.updated_at(),
            },
        );
        self.dirty.insert(Key::Cart(cart.id()));
        self.checks.push(Check::SingleOpenCart {
            user_id,
            cart_id: cart.id(),
        });
        for item in cart.items() {
            self.save_cart_item(item).await?;
        }
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> Result<()> {
        let row = self.open_cart_row(cart.id())?;
        row.updated_at = cart.updated_at();
        self.dirty.insert(Key::Cart(cart.id()));
        self.expect_open(cart.id());
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: CartId) -> Result<()> {
        if self.working.carts.remove(&cart_id).is_none() {
            return Err(StoreError::not_found("cart", cart_id));
        }
        self.dirty.insert(Key::Cart(cart_id));
        for id in self.cart_item_ids(cart_id, None) {
            self.working.cart_items.remove(&id);
            self.dirty.insert(Key::CartItem(id));
        }
        Ok(())
    }

    async fn save_cart_item(&mut self, item: &CartItem) -> Result<()> {
        if !self.working.carts.contains_key(&item.cart_id()) {
            return Err(StoreError::not_found("cart", item.cart_id()));
        }

        let mut seq = None;
        for id in self.cart_item_ids(item.cart_id(), Some(item.product_id())) {
            if let Some((existing, _)) = self.working.cart_items.remove(&id) {
                seq = Some(existing);
            }
            self.dirty.insert(Key::CartItem(id));
        }
        let seq = seq.unwrap_or_else(|| {
            self.working.next_seq += 1;
            self.working.next_seq
        });

        self.working
            .cart_items
            .insert(item.id(), (seq, item.to_record()));
        self.dirty.insert(Key::CartItem(item.id()));
        Ok(())
    }

    async fn delete_cart_item(&mut self, cart_id: CartId, product_id: ProductId) -> Result<()> {
        for id in self.cart_item_ids(cart_id, Some(product_id)) {
            self.working.cart_items.remove(&id);
            self.dirty.insert(Key::CartItem(id));
        }
        Ok(())
    }

    async fn clear_cart_items(&mut self, cart_id: CartId) -> Result<()> {
        for id in self.cart_item_ids(cart_id, None) {
            self.working.cart_items.remove(&id);
            self.dirty.insert(Key::CartItem(id));
        }
        Ok(())
    }

    async fn claim_cart(
        &mut self,
        cart_id: CartId,
        order_id: OrderId,
        converted_at: DateTime<Utc>,
    ) -> Result<()> {
        let row = self.open_cart_row(cart_id)?;
        row.converted_order_id = Some(order_id);
        row.converted_at = Some(converted_at);
        row.updated_at = converted_at;
        self.dirty.insert(Key::Cart(cart_id));
        self.expect_open(cart_id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryTx {
    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.working
            .orders
            .get(&order_id)
            .map(|(record, items)| self.load_order(record, items))
            .transpose()
    }

    async fn find_order_by_number(&mut self, number: &OrderNumber) -> Result<Option<Order>> {
        self.working
            .orders
            .values()
            .find(|(record, _)| &record.order_number == number)
            .map(|(record, items)| self.load_order(record, items))
            .transpose()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if let Some(delay) = self.faults.order_insert_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(product_id) = self.faults.fail_order_items_for
            && order.items().iter().any(|item| item.product_id() == product_id)
        {
            return Err(StoreError::Injected(format!(
                "order item insert for product {product_id}"
            )));
        }

        let number = order.order_number();
        if self
            .working
            .orders
            .values()
            .any(|(record, _)| &record.order_number == number)
        {
            return Err(StoreError::DuplicateOrderNumber(number.to_string()));
        }

        let items = order.items().iter().map(OrderItem::to_record).collect();
        self.working
            .orders
            .insert(order.id(), (order.to_record(), items));
        self.dirty.insert(Key::Order(order.id()));
        self.checks.push(Check::UniqueOrderNumber {
            order_id: order.id(),
            number: number.to_string(),
        });
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let (record, _) = self
            .working
            .orders
            .get_mut(&order.id())
            .ok_or_else(|| StoreError::not_found("order", order.id()))?;
        *record = order.to_record();
        self.dirty.insert(Key::Order(order.id()));
        Ok(())
    }

    async fn max_order_sequence(&mut self, prefix: &str) -> Result<Option<u32>> {
        Ok(self
            .working
            .orders
            .values()
            .filter_map(|(record, _)| record.order_number.as_str().strip_prefix(prefix))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max())
    }
}

#[async_trait]
impl PaymentStore for InMemoryTx {
    async fn find_payment(&mut self, payment_id: PaymentId) -> Result<Option<Payment>> {
        Ok(self
            .working
            .payments
            .get(&payment_id)
            .cloned()
            .map(Payment::restore))
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        if !self.working.orders.contains_key(&payment.order_id()) {
            return Err(StoreError::not_found("order", payment.order_id()));
        }
        self.working
            .payments
            .insert(payment.id(), payment.to_record());
        self.dirty.insert(Key::Payment(payment.id()));
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        let record = self
            .working
            .payments
            .get_mut(&payment.id())
            .ok_or_else(|| StoreError::not_found("payment", payment.id()))?;
        *record = payment.to_record();
        self.dirty.insert(Key::Payment(payment.id()));
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryTx {
    async fn find_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&product_id).cloned())
    }

    async fn save_product(&mut self, product: &Product) -> Result<()> {
        self.working.products.insert(product.id, product.clone());
        self.dirty.insert(Key::Product(product.id));
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryTx {
    async fn commit(self) -> Result<()> {
        let mut shared = self.shared.write().await;

        for check in &self.checks {
            verify(&shared, check)?;
        }

        for key in &self.dirty {
            publish(&self.working, &mut shared, *key);
        }
        shared.next_seq = shared.next_seq.max(self.working.next_seq);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

fn verify(shared: &Tables, check: &Check) -> Result<()> {
    match check {
        Check::CartOpen(cart_id) => match shared.carts.get(cart_id) {
            None => Err(StoreError::not_found("cart", cart_id)),
            Some(CartRow {
                converted_order_id: Some(order_id),
                ..
            }) => Err(StoreError::CartAlreadyConverted {
                cart_id: *cart_id,
                order_id: *order_id,
            }),
            Some(_) => Ok(()),
        },
        Check::UniqueOrderNumber { order_id, number } => {
            let taken = shared
                .orders
                .values()
                .any(|(record, _)| record.id != *order_id && record.order_number.as_str() == number);
            if taken {
                return Err(StoreError::DuplicateOrderNumber(number.clone()));
            }
            Ok(())
        }
        Check::SingleOpenCart { user_id, cart_id } => {
            let taken = shared.carts.values().any(|row| {
                row.user_id == *user_id && row.id != *cart_id && row.converted_order_id.is_none()
            });
            if taken {
                return Err(StoreError::OpenCartExists { user_id: *user_id });
            }
            Ok(())
        }
    }
}

fn publish(working: &Tables, shared: &mut Tables, key: Key) {
    fn copy<K: std::hash::Hash + Eq + Copy, V: Clone>(
        from: &HashMap<K, V>,
        to: &mut HashMap<K, V>,
        key: K,
    ) {
        match from.get(&key) {
            Some(value) => {
                to.insert(key, value.clone());
            }
            None => {
                to.remove(&key);
            }
        }
    }

    match key {
        Key::Cart(id) => copy(&working.carts, &mut shared.carts, id),
        Key::CartItem(id) => copy(&working.cart_items, &mut shared.cart_items, id),
        Key::Order(id) => copy(&working.orders, &mut shared.orders, id),
        Key::Payment(id) => copy(&working.payments, &mut shared.payments, id),
        Key::Product(id) => copy(&working.products, &mut shared.products, id),
    }
}
