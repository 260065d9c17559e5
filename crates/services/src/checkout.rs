//! The checkout orchestrator.

use std::time::Instant;

use chrono::Utc;
use common::OrderId;
use domain::{Order, OrderLine};
use store::{TransactionScope, TransactionalStore, UnitOfWork};

use crate::commands::Checkout;
use crate::config::CheckoutConfig;
use crate::order_number::OrderNumberGenerator;
use crate::{Result, ServiceError};

/// Turns carts into orders.
///
/// One checkout is one transaction: claiming the cart, snapshotting live
/// catalog prices into order lines, allocating the order number and
/// inserting the order either all commit or all roll back. Losing an
/// order-number race restarts the whole transaction.
#[derive(Clone)]
pub struct CheckoutService<S> {
    scope: TransactionScope<S>,
    numbers: OrderNumberGenerator,
    max_attempts: u32,
}

impl<S: TransactionalStore> CheckoutService<S> {
    /// Creates a checkout service over `store`.
    pub fn new(store: S, config: &CheckoutConfig) -> Self {
        Self {
            scope: TransactionScope::new(store).with_timeout(config.timeout),
            numbers: config.order_numbers(),
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub fn order_numbers(&self) -> &OrderNumberGenerator {
        &self.numbers
    }

    /// Converts the cart into a pending order.
    ///
    /// Fails with `CartAlreadyConverted` if another checkout claimed the
    /// cart first and with `EmptyCart` if it has no lines.
    #[tracing::instrument(skip(self), fields(cart_id = %cmd.cart_id))]
    pub async fn checkout(&self, cmd: Checkout) -> Result<Order> {
        let start = Instant::now();

        let result = self.checkout_with_retry(cmd).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(_) => "placed",
            Err(e) => e.kind().as_str(),
        };
        metrics::counter!("checkout_total", "outcome" => outcome).increment(1);

        match &result {
            Ok(order) => tracing::info!(
                order_id = %order.id(),
                order_number = %order.order_number(),
                total = %order.total_amount(),
                items = order.item_count(),
                "Order placed"
            ),
            Err(e) => tracing::warn!(error = %e, kind = %e.kind(), "Checkout failed"),
        }
        result
    }

    async fn checkout_with_retry(&self, cmd: Checkout) -> Result<Order> {
        for attempt in 1..=self.max_attempts {
            let numbers = self.numbers.clone();
            let result = self
                .scope
                .execute(move |tx| Box::pin(place_order(tx, cmd, numbers)))
                .await;

            match result {
                Err(e) if e.is_order_number_conflict() => {
                    metrics::counter!("order_number_retries_total").increment(1);
                    tracing::warn!(attempt, error = %e, "Order number taken, retrying checkout");
                }
                other => return other,
            }
        }
        Err(ServiceError::OrderNumberExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Runs one checkout attempt inside `tx`.
async fn place_order<Tx: UnitOfWork>(
    tx: &mut Tx,
    cmd: Checkout,
    numbers: OrderNumberGenerator,
) -> Result<Order> {
    let now = Utc::now();
    let order_id = OrderId::new();

    // First write: a second checkout of the same cart stops here.
    tx.claim_cart(cmd.cart_id, order_id, now).await?;

    let cart = tx
        .find_cart(cmd.cart_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("cart", cmd.cart_id))?;
    if cart.is_empty() {
        return Err(ServiceError::EmptyCart {
            cart_id: cmd.cart_id,
        });
    }

    let mut lines = Vec::with_capacity(cart.distinct_items());
    for item in cart.items() {
        let product = tx
            .find_product(item.product_id())
            .await?
            .ok_or_else(|| ServiceError::not_found("product", item.product_id()))?;
        if !product.is_active {
            return Err(ServiceError::ProductUnavailable(product.id));
        }
        lines.push(OrderLine::new(
            product.id,
            product.name,
            item.quantity(),
            product.price,
        ));
    }

    let number = numbers.next(tx, now).await?;
    let order = Order::place(
        order_id,
        number,
        cart.user_id(),
        cmd.shipping_address_id,
        lines,
    )?;
    tx.insert_order(&order).await?;

    tracing::debug!(order_number = %order.order_number(), "Order staged");
    Ok(order)
}
