//! Payment commands.

use common::{OrderId, PaymentId};
use domain::{Payment, PaymentError, PaymentStatus};
use store::{OrderStore, PaymentStore, TransactionScope, TransactionalStore, UnitOfWork};

use crate::commands::{CreatePayment, UpdatePaymentAmount, UpdatePaymentStatus};
use crate::{Result, ServiceError};

/// Records payment attempts and their gateway outcomes.
///
/// The service never talks to a gateway; callers report what the gateway
/// said through [`update_status`](Self::update_status).
#[derive(Clone)]
pub struct PaymentService<S> {
    scope: TransactionScope<S>,
}

impl<S: TransactionalStore> PaymentService<S> {
    pub fn new(scope: TransactionScope<S>) -> Self {
        Self { scope }
    }

    // Query methods

    #[tracing::instrument(skip(self))]
    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.scope
            .execute(move |tx| Box::pin(load_payment(tx, payment_id)))
            .await
    }

    // Command methods

    /// Opens a pending payment against an active order.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, amount = %cmd.amount, method = %cmd.method))]
    pub async fn create_payment(&self, cmd: CreatePayment) -> Result<Payment> {
        let payment = self
            .scope
            .execute(move |tx| Box::pin(create_payment(tx, cmd)))
            .await?;
        metrics::counter!("payments_created_total", "method" => payment.method().as_str())
            .increment(1);
        tracing::info!(payment_id = %payment.id(), "Payment created");
        Ok(payment)
    }

    /// Applies a gateway outcome to the payment.
    #[tracing::instrument(skip(self), fields(payment_id = %cmd.payment_id, to = %cmd.status))]
    pub async fn update_status(&self, cmd: UpdatePaymentStatus) -> Result<Payment> {
        let status = cmd.status;
        let payment = self
            .modify(cmd.payment_id, move |payment| apply_status(payment, status))
            .await?;
        metrics::counter!("payment_transitions_total", "to" => status.as_str()).increment(1);
        tracing::info!(
            order_id = %payment.order_id(),
            status = %payment.status(),
            "Payment status changed"
        );
        Ok(payment)
    }

    /// Changes the amount of a pending payment.
    #[tracing::instrument(skip(self), fields(payment_id = %cmd.payment_id, amount = %cmd.amount))]
    pub async fn update_amount(&self, cmd: UpdatePaymentAmount) -> Result<Payment> {
        let amount = cmd.amount;
        self.modify(cmd.payment_id, move |payment| payment.update_amount(amount))
            .await
    }

    /// Records or clears the gateway transaction id.
    #[tracing::instrument(skip(self))]
    pub async fn update_transaction_id(
        &self,
        payment_id: PaymentId,
        transaction_id: String,
    ) -> Result<Payment> {
        self.modify(payment_id, move |payment| {
            payment.update_transaction_id(&transaction_id)
        })
        .await
    }

    async fn modify<F>(&self, payment_id: PaymentId, change: F) -> Result<Payment>
    where
        F: FnOnce(&mut Payment) -> std::result::Result<(), PaymentError> + Send + 'static,
    {
        self.scope
            .execute(move |tx| {
                Box::pin(async move {
                    let mut payment = load_payment(tx, payment_id).await?;
                    change(&mut payment)?;
                    tx.update_payment(&payment).await?;
                    Ok::<_, ServiceError>(payment)
                })
            })
            .await
    }
}

fn apply_status(payment: &mut Payment, status: PaymentStatus) -> std::result::Result<(), PaymentError> {
    match status {
        PaymentStatus::Processing => payment.start_processing(),
        PaymentStatus::Completed => payment.complete(),
        PaymentStatus::Failed => payment.fail(),
        PaymentStatus::Cancelled => payment.cancel(),
        PaymentStatus::Refunded => payment.refund(),
        PaymentStatus::Pending => payment.transition_to(PaymentStatus::Pending),
    }
}

async fn load_payment<Tx: UnitOfWork>(tx: &mut Tx, payment_id: PaymentId) -> Result<Payment> {
    tx.find_payment(payment_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("payment", payment_id))
}

async fn load_order_for_payment<Tx: UnitOfWork>(
    tx: &mut Tx,
    order_id: OrderId,
) -> Result<domain::Order> {
    tx.find_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("order", order_id))
}

async fn create_payment<Tx: UnitOfWork>(tx: &mut Tx, cmd: CreatePayment) -> Result<Payment> {
    let mut order = load_order_for_payment(tx, cmd.order_id).await?;
    let payment = Payment::new(
        cmd.order_id,
        cmd.amount,
        cmd.method,
        cmd.transaction_id.as_deref(),
    )?;
    order.record_payment(payment.clone())?;
    tx.insert_payment(&payment).await?;
    tx.update_order(&order).await?;
    Ok(payment)
}
