//! Shared types for the commerce back office.

pub mod ids;

pub use ids::{
    AddressId, CartId, CartItemId, OrderId, OrderItemId, PaymentId, ProductId, UserId,
};
