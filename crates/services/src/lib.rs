//! Command layer of the commerce back office.
//!
//! Each service owns a [`store::TransactionScope`] and runs every command in
//! one unit of work:
//!
//! - [`CartService`]: lazy cart creation and line edits
//! - [`CheckoutService`]: cart to order conversion
//! - [`OrderService`]: order lifecycle
//! - [`PaymentService`]: payment attempts against an order

pub mod cart;
pub mod checkout;
pub mod commands;
pub mod config;
pub mod error;
pub mod order;
pub mod order_number;
pub mod payment;

pub use cart::CartService;
pub use checkout::CheckoutService;
pub use commands::{
    AddCartItem, Checkout, CreatePayment, RemoveCartItem, UpdateCartItem, UpdateOrderStatus,
    UpdateOrderTotal, UpdatePaymentAmount, UpdatePaymentStatus, UpdateShippingAddress,
};
pub use config::CheckoutConfig;
pub use error::{Result, ServiceError};
pub use order::OrderService;
pub use order_number::{NumberPartition, OrderNumberGenerator};
pub use payment::PaymentService;
