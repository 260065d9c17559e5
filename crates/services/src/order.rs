//! Order commands.

use common::OrderId;
use domain::{Order, OrderError, OrderNumber};
use store::{OrderStore, TransactionScope, TransactionalStore, UnitOfWork};

use crate::commands::{UpdateOrderStatus, UpdateOrderTotal, UpdateShippingAddress};
use crate::{Result, ServiceError};

/// Drives placed orders through their lifecycle.
///
/// Each command loads the order, applies one aggregate method and writes
/// the order back in its own transaction. Concurrent commands on the same
/// order are last-write-wins.
#[derive(Clone)]
pub struct OrderService<S> {
    scope: TransactionScope<S>,
}

impl<S: TransactionalStore> OrderService<S> {
    pub fn new(scope: TransactionScope<S>) -> Self {
        Self { scope }
    }

    // Query methods

    /// Loads an order with its lines and payments.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.scope
            .execute(move |tx| Box::pin(load_order(tx, order_id)))
            .await
    }

    /// Loads an order by its human-facing number.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_order_number(&self, order_number: &str) -> Result<Order> {
        let number = OrderNumber::parse(order_number)?;
        self.scope
            .execute(move |tx| Box::pin(load_by_number(tx, number)))
            .await
    }

    // Command methods

    /// Moves the order to `status` if the transition table allows it.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, to = %cmd.status))]
    pub async fn update_status(&self, cmd: UpdateOrderStatus) -> Result<Order> {
        let status = cmd.status;
        let order = self
            .modify(cmd.order_id, move |order| order.transition_to(status))
            .await?;
        record_transition(&order);
        Ok(order)
    }

    /// Cancels a pending or confirmed order.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self.modify(order_id, Order::cancel).await?;
        record_transition(&order);
        Ok(order)
    }

    /// Replaces the total of a pending order.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, total = %cmd.total_amount))]
    pub async fn update_total(&self, cmd: UpdateOrderTotal) -> Result<Order> {
        let total = cmd.total_amount;
        self.modify(cmd.order_id, move |order| order.update_total_amount(total))
            .await
    }

    /// Points a pending order at another shipping address.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn update_shipping_address(&self, cmd: UpdateShippingAddress) -> Result<Order> {
        let address = cmd.shipping_address_id;
        self.modify(cmd.order_id, move |order| {
            order.update_shipping_address(address)
        })
        .await
    }

    async fn modify<F>(&self, order_id: OrderId, change: F) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> std::result::Result<(), OrderError> + Send + 'static,
    {
        self.scope
            .execute(move |tx| {
                Box::pin(async move {
                    let mut order = load_order(tx, order_id).await?;
                    change(&mut order)?;
                    tx.update_order(&order).await?;
                    Ok::<_, ServiceError>(order)
                })
            })
            .await
    }
}

fn record_transition(order: &Order) {
    let status = order.status();
    metrics::counter!("order_transitions_total", "to" => status.as_str()).increment(1);
    tracing::info!(
        order_id = %order.id(),
        order_number = %order.order_number(),
        status = %status,
        "Order status changed"
    );
}

async fn load_order<Tx: UnitOfWork>(tx: &mut Tx, order_id: OrderId) -> Result<Order> {
    tx.find_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("order", order_id))
}

async fn load_by_number<Tx: UnitOfWork>(tx: &mut Tx, number: OrderNumber) -> Result<Order> {
    tx.find_order_by_number(&number)
        .await?
        .ok_or_else(|| ServiceError::not_found("order", &number))
}
