use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, CartId, CartItemId, OrderId, OrderItemId, PaymentId, ProductId, UserId};
use domain::{
    Cart, CartItem, CartItemRecord, CartRecord, Money, Order, OrderItem, OrderItemRecord,
    OrderNumber, OrderRecord, OrderStatus, Payment, PaymentMethod, PaymentRecord, PaymentStatus,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CartStore, OrderStore, PaymentStore, Product, ProductCatalog, TransactionalStore, UnitOfWork},
};

const UNIQUE_ORDER_NUMBER: &str = "unique_order_number";
const UNIQUE_OPEN_CART: &str = "unique_open_cart_per_user";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// Unit of work over one PostgreSQL transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn is_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

impl PostgresTx {
    async fn load_cart(&mut self, row: PgRow) -> Result<Cart> {
        let cart_id: Uuid = row.try_get("id")?;
        let item_rows = sqlx::query(
            r#"
            SELECT id, cart_id, product_id, quantity, unit_price_cents, created_at, updated_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let items = item_rows
            .into_iter()
            .map(|item| {
                Ok(CartItem::restore(CartItemRecord {
                    id: CartItemId::from_uuid(item.try_get("id")?),
                    cart_id: CartId::from_uuid(item.try_get("cart_id")?),
                    product_id: ProductId::from_uuid(item.try_get("product_id")?),
                    quantity: to_u32(item.try_get("quantity")?, "quantity")?,
                    unit_price: Money::from_cents(item.try_get("unit_price_cents")?),
                    created_at: item.try_get("created_at")?,
                    updated_at: item.try_get("updated_at")?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Cart::restore(CartRecord {
            id: CartId::from_uuid(cart_id),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            items,
            converted_order_id: row
                .try_get::<Option<Uuid>, _>("converted_order_id")?
                .map(OrderId::from_uuid),
            converted_at: row.try_get("converted_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn load_order(&mut self, row: PgRow) -> Result<Order> {
        let order_id: Uuid = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let number: String = row.try_get("order_number")?;
        let record = OrderRecord {
            id: OrderId::from_uuid(order_id),
            order_number: OrderNumber::parse(&number).map_err(StoreError::corrupt)?,
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            shipping_address_id: AddressId::from_uuid(row.try_get("shipping_address_id")?),
            status: status.parse::<OrderStatus>().map_err(StoreError::corrupt)?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            placed_at: row.try_get("placed_at")?,
            updated_at: row.try_get("updated_at")?,
        };

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price_cents,
                   total_price_cents, created_at
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let items = item_rows
            .into_iter()
            .map(|item| {
                OrderItem::restore(OrderItemRecord {
                    id: OrderItemId::from_uuid(item.try_get("id")?),
                    order_id: OrderId::from_uuid(item.try_get("order_id")?),
                    product_id: ProductId::from_uuid(item.try_get("product_id")?),
                    product_name: item.try_get("product_name")?,
                    quantity: to_u32(item.try_get("quantity")?, "quantity")?,
                    unit_price: Money::from_cents(item.try_get("unit_price_cents")?),
                    total_price: Money::from_cents(item.try_get("total_price_cents")?),
                    created_at: item.try_get("created_at")?,
                })
                .map_err(StoreError::corrupt)
            })
            .collect::<Result<Vec<_>>>()?;

        let payment_rows = sqlx::query(
            r#"
            SELECT id, order_id, amount_cents, method, status, transaction_id,
                   processed_at, created_at, updated_at
            FROM payments
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let payments = payment_rows
            .into_iter()
            .map(row_to_payment)
            .collect::<Result<Vec<_>>>()?;

        Ok(Order::restore(record, items, payments))
    }

    /// Reports why a conditional cart write matched no row.
    async fn cart_conflict(&mut self, cart_id: CartId) -> StoreError {
        let converted: std::result::Result<Option<Option<Uuid>>, sqlx::Error> =
            sqlx::query_scalar("SELECT converted_order_id FROM carts WHERE id = $1")
                .bind(cart_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await;

        match converted {
            Ok(Some(Some(order_id))) => StoreError::CartAlreadyConverted {
                cart_id,
                order_id: OrderId::from_uuid(order_id),
            },
            Ok(_) => StoreError::not_found("cart", cart_id),
            Err(err) => StoreError::Database(err),
        }
    }
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    let method: String = row.try_get("method")?;
    let status: String = row.try_get("status")?;
    Ok(Payment::restore(PaymentRecord {
        id: PaymentId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        method: method.parse::<PaymentMethod>().map_err(StoreError::corrupt)?,
        status: status.parse::<PaymentStatus>().map_err(StoreError::corrupt)?,
        transaction_id: row.try_get("transaction_id")?,
        processed_at: row.try_get("processed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

const CART_COLUMNS: &str =
    "id, user_id, converted_order_id, converted_at, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, order_number, user_id, shipping_address_id, status, \
     total_amount_cents, placed_at, updated_at";

#[async_trait]
impl CartStore for PostgresTx {
    async fn find_cart(&mut self, cart_id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1"))
            .bind(cart_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_cart(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_open_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 AND converted_order_id IS NULL"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_cart(row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<()> {
        let user_id = cart.user_id();
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, converted_order_id, converted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(cart.id().as_uuid())
        .bind(user_id.as_uuid())
        .bind(cart.converted_order_id().map(|id| id.as_uuid()))
        .bind(cart.converted_at())
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_violation(&e, UNIQUE_OPEN_CART) {
                return StoreError::OpenCartExists { user_id };
            }
            StoreError::Database(e)
        })?;

        for item in cart.items() {
            self.save_cart_item(item).await?;
        }
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> Result<()> {
        let result = sqlx::query(
            "UPDATE carts SET updated_at = $2 WHERE id = $1 AND converted_order_id IS NULL",
        )
        .bind(cart.id().as_uuid())
        .bind(cart.updated_at())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.cart_conflict(cart.id()).await);
        }
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: CartId) -> Result<()> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart", cart_id));
        }
        Ok(())
    }

    async fn save_cart_item(&mut self, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                unit_price_cents = EXCLUDED.unit_price_cents,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(item.id().as_uuid())
        .bind(item.cart_id().as_uuid())
        .bind(item.product_id().as_uuid())
        .bind(item.quantity() as i32)
        .bind(item.unit_price().cents())
        .bind(item.created_at())
        .bind(item.updated_at())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_cart_item(&mut self, cart_id: CartId, product_id: ProductId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn clear_cart_items(&mut self, cart_id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn claim_cart(
        &mut self,
        cart_id: CartId,
        order_id: OrderId,
        converted_at: DateTime<Utc>,
    ) -> Result<()> {
        // The row lock taken here serializes concurrent claims; a loser
        // re-evaluates the predicate after the winner commits.
        let result = sqlx::query(
            r#"
            UPDATE carts
            SET converted_order_id = $2, converted_at = $3, updated_at = $3
            WHERE id = $1 AND converted_order_id IS NULL
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(order_id.as_uuid())
        .bind(converted_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.cart_conflict(cart_id).await);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresTx {
    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_order_by_number(&mut self, number: &OrderNumber) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(number.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, shipping_address_id, status,
                                total_amount_cents, placed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.user_id().as_uuid())
        .bind(order.shipping_address_id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.total_amount().cents())
        .bind(order.placed_at())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_violation(&e, UNIQUE_ORDER_NUMBER) {
                return StoreError::DuplicateOrderNumber(order.order_number().to_string());
            }
            StoreError::Database(e)
        })?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity,
                                         unit_price_cents, total_price_cents, created_at, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.id().as_uuid())
            .bind(item.order_id().as_uuid())
            .bind(item.product_id().as_uuid())
            .bind(item.product_name())
            .bind(item.quantity() as i32)
            .bind(item.unit_price().cents())
            .bind(item.total_price().cents())
            .bind(item.created_at())
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, total_amount_cents = $3, shipping_address_id = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.total_amount().cents())
        .bind(order.shipping_address_id().as_uuid())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", order.id()));
        }
        Ok(())
    }

    async fn max_order_sequence(&mut self, prefix: &str) -> Result<Option<u32>> {
        let pattern = format!(
            "{}%",
            prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(SUBSTRING(order_number FROM $2) AS BIGINT))
            FROM orders
            WHERE order_number LIKE $1
              AND SUBSTRING(order_number FROM $2) ~ '^[0-9]{1,9}$'
            "#,
        )
        .bind(pattern)
        .bind(prefix.chars().count() as i32 + 1)
        .fetch_one(&mut *self.tx)
        .await?;

        max.map(|value| {
            u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("sequence {value}")))
        })
        .transpose()
    }
}

#[async_trait]
impl PaymentStore for PostgresTx {
    async fn find_payment(&mut self, payment_id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, amount_cents, method, status, transaction_id,
                   processed_at, created_at, updated_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(payment_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_payment).transpose()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, amount_cents, method, status, transaction_id,
                                  processed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.order_id().as_uuid())
        .bind(payment.amount().cents())
        .bind(payment.method().as_str())
        .bind(payment.status().as_str())
        .bind(payment.transaction_id())
        .bind(payment.processed_at())
        .bind(payment.created_at())
        .bind(payment.updated_at())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET amount_cents = $2, status = $3, transaction_id = $4,
                processed_at = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.amount().cents())
        .bind(payment.status().as_str())
        .bind(payment.transaction_id())
        .bind(payment.processed_at())
        .bind(payment.updated_at())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("payment", payment.id()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PostgresTx {
    async fn find_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, is_active FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(Product {
                id: ProductId::from_uuid(row.try_get("id")?),
                name: row.try_get("name")?,
                price: Money::from_cents(row.try_get("price_cents")?),
                is_active: row.try_get("is_active")?,
            })),
            None => Ok(None),
        }
    }

    async fn save_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, is_active, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.is_active)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PostgresTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
