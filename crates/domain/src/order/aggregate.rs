//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AddressId, OrderId, UserId};
use serde::Serialize;

use super::{OrderError, OrderItem, OrderLine, OrderNumber, OrderStatus};
use crate::money::Money;
use crate::payment::Payment;

/// Order aggregate root.
///
/// Created once by checkout from a non-empty cart and then driven through
/// its lifecycle by status transitions. Orders are never deleted;
/// cancellation and refund are statuses.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    shipping_address_id: AddressId,
    status: OrderStatus,
    total_amount: Money,
    placed_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    items: Vec<OrderItem>,
    payments: Vec<Payment>,
}

/// Persisted state of an order header, used by stores to rehydrate an
/// [`Order`] together with its lines and payments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub shipping_address_id: AddressId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Places a new pending order, snapshotting every line.
    ///
    /// The total is the sum of the line totals and must lie within the
    /// accepted money bounds.
    pub fn place(
        id: OrderId,
        order_number: OrderNumber,
        user_id: UserId,
        shipping_address_id: AddressId,
        lines: Vec<OrderLine>,
    ) -> Result<Self, OrderError> {
        if user_id.is_nil() {
            return Err(OrderError::UserIdRequired);
        }
        if shipping_address_id.is_nil() {
            return Err(OrderError::ShippingAddressRequired);
        }
        if lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        let items = lines
            .into_iter()
            .map(|line| OrderItem::snapshot(id, line))
            .collect::<Result<Vec<_>, _>>()?;
        let total_amount: Money = items.iter().map(OrderItem::total_price).sum();
        validate_total(total_amount)?;

        let now = Utc::now();
        Ok(Self {
            id,
            order_number,
            user_id,
            shipping_address_id,
            status: OrderStatus::Pending,
            total_amount,
            placed_at: now,
            updated_at: now,
            items,
            payments: Vec::new(),
        })
    }

    /// Rebuilds an order from its persisted header, lines and payments.
    pub fn restore(record: OrderRecord, items: Vec<OrderItem>, payments: Vec<Payment>) -> Self {
        Self {
            id: record.id,
            order_number: record.order_number,
            user_id: record.user_id,
            shipping_address_id: record.shipping_address_id,
            status: record.status,
            total_amount: record.total_amount,
            placed_at: record.placed_at,
            updated_at: record.updated_at,
            items,
            payments,
        }
    }

    /// Returns the persisted header of this order.
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id,
            order_number: self.order_number.clone(),
            user_id: self.user_id,
            shipping_address_id: self.shipping_address_id,
            status: self.status,
            total_amount: self.total_amount,
            placed_at: self.placed_at,
            updated_at: self.updated_at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn shipping_address_id(&self) -> AddressId {
        self.shipping_address_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the lines in checkout order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    /// Returns the number of lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(OrderItem::quantity).sum()
    }

    /// Returns the sum of completed payments.
    pub fn paid_amount(&self) -> Money {
        self.payments
            .iter()
            .filter(|payment| payment.is_completed())
            .map(Payment::amount)
            .sum()
    }

    /// Returns what is still owed, never below zero.
    pub fn pending_amount(&self) -> Money {
        let remaining = self.total_amount - self.paid_amount();
        if remaining.is_positive() {
            remaining
        } else {
            Money::zero()
        }
    }

    pub fn is_fully_paid(&self) -> bool {
        self.paid_amount() >= self.total_amount
    }

    /// Returns true unless the order was cancelled or refunded.
    pub fn is_active(&self) -> bool {
        !matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Delivered
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_cancel()
    }

    pub fn can_be_refunded(&self) -> bool {
        self.status.can_refund()
    }
}

// Command methods
impl Order {
    /// Moves to `next` if the transition graph allows it.
    ///
    /// On failure the status is left unchanged.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Confirmed)
    }

    pub fn start_processing(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Processing)
    }

    pub fn ship(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Shipped)
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Delivered)
    }

    /// Cancels a pending or confirmed order.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }
        self.transition_to(OrderStatus::Cancelled)
    }

    /// Refunds a cancelled or delivered order.
    pub fn refund(&mut self) -> Result<(), OrderError> {
        if !self.status.can_refund() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Refunded,
            });
        }
        self.transition_to(OrderStatus::Refunded)
    }

    /// Replaces the total of a pending order.
    pub fn update_total_amount(&mut self, total_amount: Money) -> Result<(), OrderError> {
        self.ensure_modifiable("total amount")?;
        validate_total(total_amount)?;
        self.total_amount = total_amount;
        self.touch();
        Ok(())
    }

    /// Points a pending order at another shipping address.
    pub fn update_shipping_address(&mut self, address_id: AddressId) -> Result<(), OrderError> {
        self.ensure_modifiable("shipping address")?;
        if address_id.is_nil() {
            return Err(OrderError::ShippingAddressRequired);
        }
        self.shipping_address_id = address_id;
        self.touch();
        Ok(())
    }

    /// Attaches a payment attempt to an active order.
    pub fn record_payment(&mut self, payment: Payment) -> Result<(), OrderError> {
        if payment.order_id() != self.id {
            return Err(OrderError::PaymentMismatch {
                payment_id: payment.id(),
                order_id: self.id,
            });
        }
        if !self.is_active() {
            return Err(OrderError::NotPayable {
                status: self.status,
            });
        }
        self.payments.push(payment);
        self.touch();
        Ok(())
    }

    fn ensure_modifiable(&self, field: &'static str) -> Result<(), OrderError> {
        if !self.status.can_modify() {
            return Err(OrderError::NotModifiable {
                status: self.status,
                field,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn validate_total(total: Money) -> Result<(), OrderError> {
    if !total.is_within_bounds() {
        return Err(OrderError::InvalidTotal {
            cents: total.cents(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;
    use crate::payment::PaymentMethod;

    fn line(name: &str, quantity: u32, cents: i64) -> OrderLine {
        OrderLine::new(ProductId::new(), name, quantity, Money::from_cents(cents))
    }

    fn placed_order() -> Order {
        Order::place(
            OrderId::new(),
            OrderNumber::parse("ORD-2026-000001").unwrap(),
            UserId::new(),
            AddressId::new(),
            vec![line("Product A", 2, 1000), line("Product B", 1, 2500)],
        )
        .unwrap()
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = placed_order();
        let path: &[OrderStatus] = match status {
            OrderStatus::Pending => &[],
            OrderStatus::Confirmed => &[OrderStatus::Confirmed],
            OrderStatus::Processing => &[OrderStatus::Confirmed, OrderStatus::Processing],
            OrderStatus::Shipped => &[
                OrderStatus::Confirmed,
                OrderStatus::Processing,
                OrderStatus::Shipped,
            ],
            OrderStatus::Delivered => &[
                OrderStatus::Confirmed,
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ],
            OrderStatus::Cancelled => &[OrderStatus::Cancelled],
            OrderStatus::Refunded => &[OrderStatus::Cancelled, OrderStatus::Refunded],
        };
        for next in path {
            order.transition_to(*next).unwrap();
        }
        order
    }

    #[test]
    fn test_place_computes_total_and_snapshots() {
        let order = placed_order();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount(), Money::from_cents(4500));
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.total_quantity(), 3);
        assert_eq!(order.items()[0].total_price(), Money::from_cents(2000));
        assert_eq!(order.items()[1].total_price(), Money::from_cents(2500));
        assert!(order.items().iter().all(|item| item.order_id() == order.id()));
    }

    #[test]
    fn test_place_requires_lines() {
        let result = Order::place(
            OrderId::new(),
            OrderNumber::parse("ORD-2026-000001").unwrap(),
            UserId::new(),
            AddressId::new(),
            vec![],
        );
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn test_place_rejects_total_above_maximum() {
        let result = Order::place(
            OrderId::new(),
            OrderNumber::parse("ORD-2026-000001").unwrap(),
            UserId::new(),
            AddressId::new(),
            vec![line("Big ticket", 2, 60_000_000)],
        );
        assert!(matches!(result, Err(OrderError::InvalidTotal { .. })));
    }

    #[test]
    fn test_happy_path_lifecycle() {
        let mut order = placed_order();
        order.confirm().unwrap();
        order.start_processing().unwrap();
        order.ship().unwrap();
        order.deliver().unwrap();
        assert!(order.is_completed());
        order.refund().unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert!(!order.is_active());
    }

    #[test]
    fn test_every_transition_follows_table() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let mut order = order_in(from);
                let result = order.transition_to(to);
                if from.can_transition_to(to) {
                    assert!(result.is_ok(), "{from} -> {to}");
                    assert_eq!(order.status(), to);
                } else {
                    assert!(
                        matches!(result, Err(OrderError::InvalidTransition { from: f, to: t }) if f == from && t == to),
                        "{from} -> {to}"
                    );
                    assert_eq!(order.status(), from);
                }
            }
        }
    }

    #[test]
    fn test_cancel_shipped_order_fails() {
        let mut order = order_in(OrderStatus::Shipped);
        let result = order.cancel();

        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled
            })
        ));
        assert_eq!(order.status(), OrderStatus::Shipped);
    }

    #[test]
    fn test_cancel_processing_order_fails_but_transition_allows_it() {
        let mut order = order_in(OrderStatus::Processing);
        assert!(order.cancel().is_err());
        assert_eq!(order.status(), OrderStatus::Processing);

        order.transition_to(OrderStatus::Cancelled).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_transition_touches_timestamp() {
        let mut order = placed_order();
        let before = order.updated_at();
        order.confirm().unwrap();
        assert!(order.updated_at() >= before);
    }

    #[test]
    fn test_total_and_address_only_mutable_while_pending() {
        let mut order = placed_order();
        order.update_total_amount(Money::from_cents(4000)).unwrap();
        let address = AddressId::new();
        order.update_shipping_address(address).unwrap();
        assert_eq!(order.total_amount(), Money::from_cents(4000));
        assert_eq!(order.shipping_address_id(), address);

        order.confirm().unwrap();
        assert!(matches!(
            order.update_total_amount(Money::from_cents(100)),
            Err(OrderError::NotModifiable {
                status: OrderStatus::Confirmed,
                ..
            })
        ));
        let err = order.update_shipping_address(AddressId::new()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StateConflict);
        assert_eq!(order.shipping_address_id(), address);
    }

    #[test]
    fn test_update_total_validates_bounds() {
        let mut order = placed_order();
        assert!(matches!(
            order.update_total_amount(Money::zero()),
            Err(OrderError::InvalidTotal { cents: 0 })
        ));
        assert_eq!(order.total_amount(), Money::from_cents(4500));
    }

    #[test]
    fn test_paid_amount_counts_completed_payments_only() {
        let mut order = placed_order();

        let mut completed =
            Payment::new(order.id(), Money::from_cents(3000), PaymentMethod::Pix, None).unwrap();
        completed.start_processing().unwrap();
        completed.complete().unwrap();

        let mut failed =
            Payment::new(order.id(), Money::from_cents(4500), PaymentMethod::CreditCard, None)
                .unwrap();
        failed.start_processing().unwrap();
        failed.fail().unwrap();

        order.record_payment(completed).unwrap();
        order.record_payment(failed).unwrap();

        assert_eq!(order.paid_amount(), Money::from_cents(3000));
        assert_eq!(order.pending_amount(), Money::from_cents(1500));
        assert!(!order.is_fully_paid());
    }

    #[test]
    fn test_record_payment_rejects_foreign_or_inactive() {
        let mut order = placed_order();
        let foreign =
            Payment::new(OrderId::new(), Money::from_cents(100), PaymentMethod::Boleto, None)
                .unwrap();
        assert!(matches!(
            order.record_payment(foreign),
            Err(OrderError::PaymentMismatch { .. })
        ));

        order.cancel().unwrap();
        let payment =
            Payment::new(order.id(), Money::from_cents(100), PaymentMethod::Boleto, None).unwrap();
        assert!(matches!(
            order.record_payment(payment),
            Err(OrderError::NotPayable {
                status: OrderStatus::Cancelled
            })
        ));
    }
}
