//! Payment aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{OrderId, PaymentId};
use serde::Serialize;

use super::{PaymentError, PaymentMethod, PaymentStatus};
use crate::money::Money;

/// One payment attempt against an order.
///
/// Records gateway outcomes; it never calls a gateway itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    amount: Money,
    method: PaymentMethod,
    status: PaymentStatus,
    transaction_id: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Persisted state of a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub const MAX_TRANSACTION_ID_LENGTH: usize = 200;

    /// Creates a pending payment with no processed-at time.
    pub fn new(
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
        transaction_id: Option<&str>,
    ) -> Result<Self, PaymentError> {
        if order_id.is_nil() {
            return Err(PaymentError::OrderIdRequired);
        }
        validate_amount(amount)?;
        let transaction_id = normalize_transaction_id(transaction_id)?;

        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new(),
            order_id,
            amount,
            method,
            status: PaymentStatus::Pending,
            transaction_id,
            processed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn restore(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            order_id: record.order_id,
            amount: record.amount,
            method: record.method,
            status: record.status,
            transaction_id: record.transaction_id,
            processed_at: record.processed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn to_record(&self) -> PaymentRecord {
        PaymentRecord {
            id: self.id,
            order_id: self.order_id,
            amount: self.amount,
            method: self.method,
            status: self.status,
            transaction_id: self.transaction_id.clone(),
            processed_at: self.processed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// Query methods
impl Payment {
    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }

    pub fn has_transaction_id(&self) -> bool {
        self.transaction_id.is_some()
    }

    /// Time between creation and the gateway outcome, once known.
    pub fn processing_time(&self) -> Option<Duration> {
        self.processed_at.map(|at| at - self.created_at)
    }
}

// Command methods
impl Payment {
    /// Moves to `next` if the transition graph allows it, stamping the
    /// processed-at time on Completed, Failed and Refunded.
    pub fn transition_to(&mut self, next: PaymentStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.status = next;
        if next.stamps_processed_at() {
            self.processed_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), PaymentError> {
        self.transition_to(PaymentStatus::Processing)
    }

    pub fn complete(&mut self) -> Result<(), PaymentError> {
        self.transition_to(PaymentStatus::Completed)
    }

    pub fn fail(&mut self) -> Result<(), PaymentError> {
        self.transition_to(PaymentStatus::Failed)
    }

    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        self.transition_to(PaymentStatus::Cancelled)
    }

    pub fn refund(&mut self) -> Result<(), PaymentError> {
        self.transition_to(PaymentStatus::Refunded)
    }

    /// Changes the amount of a pending payment.
    pub fn update_amount(&mut self, amount: Money) -> Result<(), PaymentError> {
        if !self.status.can_update_amount() {
            return Err(PaymentError::AmountLocked {
                status: self.status,
            });
        }
        validate_amount(amount)?;
        self.amount = amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records the gateway transaction id. Blank clears it.
    pub fn update_transaction_id(&mut self, transaction_id: &str) -> Result<(), PaymentError> {
        self.transaction_id = normalize_transaction_id(Some(transaction_id))?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_amount(amount: Money) -> Result<(), PaymentError> {
    if !amount.is_within_bounds() {
        return Err(PaymentError::InvalidAmount {
            cents: amount.cents(),
        });
    }
    Ok(())
}

fn normalize_transaction_id(value: Option<&str>) -> Result<Option<String>, PaymentError> {
    let Some(trimmed) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let length = trimmed.chars().count();
    if length > Payment::MAX_TRANSACTION_ID_LENGTH {
        return Err(PaymentError::TransactionIdTooLong { length });
    }
    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(cents: i64) -> Payment {
        Payment::new(
            OrderId::new(),
            Money::from_cents(cents),
            PaymentMethod::CreditCard,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_new_starts_pending() {
        let p = payment(5000);
        assert_eq!(p.status(), PaymentStatus::Pending);
        assert!(p.processed_at().is_none());
        assert!(p.processing_time().is_none());
    }

    #[test]
    fn test_new_validates() {
        let order_id = OrderId::new();
        assert!(matches!(
            Payment::new(OrderId::from_uuid(uuid::Uuid::nil()), Money::from_cents(1), PaymentMethod::Pix, None),
            Err(PaymentError::OrderIdRequired)
        ));
        assert!(matches!(
            Payment::new(order_id, Money::zero(), PaymentMethod::Pix, None),
            Err(PaymentError::InvalidAmount { cents: 0 })
        ));
        let long = "x".repeat(201);
        assert!(matches!(
            Payment::new(order_id, Money::from_cents(1), PaymentMethod::Pix, Some(&long)),
            Err(PaymentError::TransactionIdTooLong { length: 201 })
        ));
    }

    #[test]
    fn test_transaction_id_is_trimmed_and_blank_is_none() {
        let order_id = OrderId::new();
        let p = Payment::new(order_id, Money::from_cents(1), PaymentMethod::Pix, Some("  tx-1 "))
            .unwrap();
        assert_eq!(p.transaction_id(), Some("tx-1"));

        let mut blank =
            Payment::new(order_id, Money::from_cents(1), PaymentMethod::Pix, Some("   ")).unwrap();
        assert!(!blank.has_transaction_id());
        blank.update_transaction_id("gw-42").unwrap();
        assert_eq!(blank.transaction_id(), Some("gw-42"));
    }

    #[test]
    fn test_complete_stamps_processed_at_and_locks_amount() {
        let mut p = payment(5000);
        p.start_processing().unwrap();
        assert!(p.processed_at().is_none());

        p.complete().unwrap();
        assert_eq!(p.status(), PaymentStatus::Completed);
        assert!(p.processed_at().is_some());

        let result = p.update_amount(Money::from_cents(4000));
        assert!(matches!(
            result,
            Err(PaymentError::AmountLocked {
                status: PaymentStatus::Completed
            })
        ));
        assert_eq!(p.amount(), Money::from_cents(5000));
    }

    #[test]
    fn test_fail_and_refund_stamp_processed_at_but_cancel_does_not() {
        let mut failed = payment(100);
        failed.start_processing().unwrap();
        failed.fail().unwrap();
        assert!(failed.is_processed());

        let mut refunded = payment(100);
        refunded.start_processing().unwrap();
        refunded.complete().unwrap();
        refunded.refund().unwrap();
        assert!(refunded.is_processed());

        let mut cancelled = payment(100);
        cancelled.cancel().unwrap();
        assert!(!cancelled.is_processed());
    }

    #[test]
    fn test_update_amount_while_pending() {
        let mut p = payment(5000);
        p.update_amount(Money::from_cents(4200)).unwrap();
        assert_eq!(p.amount(), Money::from_cents(4200));
        assert!(p.update_amount(Money::from_cents(100_000_000)).is_err());
        assert_eq!(p.amount(), Money::from_cents(4200));
    }

    #[test]
    fn test_every_transition_follows_table() {
        for from in PaymentStatus::ALL {
            for to in PaymentStatus::ALL {
                let mut p = Payment::restore(PaymentRecord {
                    status: from,
                    ..payment(100).to_record()
                });
                let result = p.transition_to(to);
                if from.can_transition_to(to) {
                    assert!(result.is_ok(), "{from} -> {to}");
                    assert_eq!(p.status(), to);
                } else {
                    assert!(result.is_err(), "{from} -> {to}");
                    assert_eq!(p.status(), from);
                }
            }
        }
    }

    #[test]
    fn test_completed_cannot_fail() {
        let mut p = payment(100);
        p.start_processing().unwrap();
        p.complete().unwrap();
        let err = p.fail().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidTransition);
    }
}
