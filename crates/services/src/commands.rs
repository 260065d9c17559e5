//! Commands accepted by the services.

use common::{AddressId, CartId, OrderId, PaymentId, ProductId, UserId};
use domain::{Money, OrderStatus, PaymentMethod, PaymentStatus};

/// Command to add units of a product to the user's open cart.
///
/// Creates the cart on first use.
#[derive(Debug, Clone, Copy)]
pub struct AddCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl AddCartItem {
    pub fn new(user_id: UserId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
        }
    }
}

/// Command to drop a product's line from the user's open cart.
#[derive(Debug, Clone, Copy)]
pub struct RemoveCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
}

impl RemoveCartItem {
    pub fn new(user_id: UserId, product_id: ProductId) -> Self {
        Self {
            user_id,
            product_id,
        }
    }
}

/// Command to set the quantity of an existing cart line.
#[derive(Debug, Clone, Copy)]
pub struct UpdateCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl UpdateCartItem {
    pub fn new(user_id: UserId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
        }
    }
}

/// Command to turn a cart into an order.
#[derive(Debug, Clone, Copy)]
pub struct Checkout {
    pub cart_id: CartId,
    pub shipping_address_id: AddressId,
}

impl Checkout {
    pub fn new(cart_id: CartId, shipping_address_id: AddressId) -> Self {
        Self {
            cart_id,
            shipping_address_id,
        }
    }
}

/// Command to move an order along its lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl UpdateOrderStatus {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }
}

/// Command to replace the total of a pending order.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOrderTotal {
    pub order_id: OrderId,
    pub total_amount: Money,
}

impl UpdateOrderTotal {
    pub fn new(order_id: OrderId, total_amount: Money) -> Self {
        Self {
            order_id,
            total_amount,
        }
    }
}

/// Command to point a pending order at another shipping address.
#[derive(Debug, Clone, Copy)]
pub struct UpdateShippingAddress {
    pub order_id: OrderId,
    pub shipping_address_id: AddressId,
}

impl UpdateShippingAddress {
    pub fn new(order_id: OrderId, shipping_address_id: AddressId) -> Self {
        Self {
            order_id,
            shipping_address_id,
        }
    }
}

/// Command to record a new payment attempt against an order.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
}

impl CreatePayment {
    pub fn new(order_id: OrderId, amount: Money, method: PaymentMethod) -> Self {
        Self {
            order_id,
            amount,
            method,
            transaction_id: None,
        }
    }

    /// Attaches the gateway reference returned for this attempt.
    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

/// Command to move a payment along its lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct UpdatePaymentStatus {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
}

impl UpdatePaymentStatus {
    pub fn new(payment_id: PaymentId, status: PaymentStatus) -> Self {
        Self { payment_id, status }
    }
}

/// Command to change the amount of a pending payment.
#[derive(Debug, Clone, Copy)]
pub struct UpdatePaymentAmount {
    pub payment_id: PaymentId,
    pub amount: Money,
}

impl UpdatePaymentAmount {
    pub fn new(payment_id: PaymentId, amount: Money) -> Self {
        Self { payment_id, amount }
    }
}
