//! Order aggregate and related types.

mod aggregate;
mod item;
mod number;
mod state;

pub use aggregate::{Order, OrderRecord};
pub use item::{OrderItem, OrderItemRecord, OrderLine};
pub use number::OrderNumber;
pub use state::{OrderStatus, ParseOrderStatusError};

use common::{OrderId, PaymentId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order number empty or outside the accepted length.
    #[error("Invalid order number length {length} (must be between {min} and {max})", min = OrderNumber::MIN_LENGTH, max = OrderNumber::MAX_LENGTH)]
    InvalidOrderNumber { length: usize },

    /// User ID is required.
    #[error("User ID is required")]
    UserIdRequired,

    /// Shipping address ID is required.
    #[error("Shipping address ID is required")]
    ShippingAddressRequired,

    /// Product ID is required on every line.
    #[error("Product ID is required")]
    ProductIdRequired,

    /// Product name outside the accepted length.
    #[error("Invalid product name length {length} (must be between {min} and {max})", min = OrderItem::MIN_PRODUCT_NAME_LENGTH, max = OrderItem::MAX_PRODUCT_NAME_LENGTH)]
    InvalidProductName { length: usize },

    /// Line quantity outside the accepted range.
    #[error("Invalid quantity: {quantity} (must be between {min} and {max})", min = OrderItem::MIN_QUANTITY, max = OrderItem::MAX_QUANTITY)]
    InvalidQuantity { quantity: u32 },

    /// Line unit price outside the accepted range.
    #[error("Invalid unit price: {cents} cents")]
    InvalidUnitPrice { cents: i64 },

    /// Order total outside the accepted range.
    #[error("Invalid order total: {cents} cents")]
    InvalidTotal { cents: i64 },

    /// A persisted line whose total does not match quantity times unit price.
    #[error("Line total mismatch: expected {expected} cents, found {actual}")]
    TotalPriceMismatch { expected: i64, actual: i64 },

    /// An order needs at least one line.
    #[error("Order has no items")]
    NoItems,

    /// Status change that is not an edge of the transition graph.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Field that may only change while the order is pending.
    #[error("Cannot modify {field} of an order in {status} status")]
    NotModifiable {
        status: OrderStatus,
        field: &'static str,
    },

    /// Payments are only accepted for active orders.
    #[error("Order in {status} status does not accept payments")]
    NotPayable { status: OrderStatus },

    /// The payment belongs to another order.
    #[error("Payment {payment_id} does not belong to order {order_id}")]
    PaymentMismatch {
        payment_id: PaymentId,
        order_id: OrderId,
    },
}

impl OrderError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidOrderNumber { .. }
            | OrderError::UserIdRequired
            | OrderError::ShippingAddressRequired
            | OrderError::ProductIdRequired
            | OrderError::InvalidProductName { .. }
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidUnitPrice { .. }
            | OrderError::InvalidTotal { .. }
            | OrderError::NoItems
            | OrderError::PaymentMismatch { .. } => ErrorKind::Validation,
            OrderError::TotalPriceMismatch { .. } => ErrorKind::Internal,
            OrderError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            OrderError::NotModifiable { .. } | OrderError::NotPayable { .. } => {
                ErrorKind::StateConflict
            }
        }
    }
}
