//! Service error types.

use common::{CartId, OrderId, ProductId};
use domain::{CartError, DomainError, ErrorKind, OrderError, PaymentError};
use store::StoreError;
use thiserror::Error;

/// Errors returned by service commands.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Checkout was requested for a cart without lines.
    #[error("Cart {cart_id} is empty")]
    EmptyCart { cart_id: CartId },

    /// The cart was already turned into an order.
    #[error("Cart {cart_id} was already converted into order {order_id}")]
    CartAlreadyConverted { cart_id: CartId, order_id: OrderId },

    /// The product exists but is no longer sold.
    #[error("Product {0} is not available")]
    ProductUnavailable(ProductId),

    /// Every attempt to allocate an order number collided.
    #[error("Could not allocate a unique order number after {attempts} attempts")]
    OrderNumberExhausted { attempts: u32 },

    /// A domain rule rejected the command.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Persistence failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl ServiceError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::EmptyCart { .. } | ServiceError::ProductUnavailable(_) => {
                ErrorKind::StateConflict
            }
            ServiceError::CartAlreadyConverted { .. }
            | ServiceError::OrderNumberExhausted { .. } => ErrorKind::Conflict,
            ServiceError::Domain(e) => e.kind(),
            ServiceError::Store(e) => e.kind(),
        }
    }

    /// Returns true if the unit of work lost an order-number race.
    pub fn is_order_number_conflict(&self) -> bool {
        matches!(self, ServiceError::Store(e) if e.is_order_number_conflict())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            StoreError::CartAlreadyConverted { cart_id, order_id } => {
                ServiceError::CartAlreadyConverted { cart_id, order_id }
            }
            other => ServiceError::Store(other),
        }
    }
}

impl From<CartError> for ServiceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::AlreadyConverted { cart_id, order_id } => {
                ServiceError::CartAlreadyConverted { cart_id, order_id }
            }
            CartError::Empty { cart_id } => ServiceError::EmptyCart { cart_id },
            other => ServiceError::Domain(other.into()),
        }
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        ServiceError::Domain(err.into())
    }
}

impl From<PaymentError> for ServiceError {
    fn from(err: PaymentError) -> Self {
        ServiceError::Domain(err.into())
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
