//! Command-line definition.

use clap::{Parser, Subcommand};
use common::{AddressId, CartId, OrderId, PaymentId, ProductId, UserId};
use domain::{OrderStatus, PaymentMethod, PaymentStatus};

#[derive(Debug, Parser)]
#[command(name = "commerce")]
#[command(about = "Administrative command line for carts, orders and payments")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Manage catalog entries
    #[command(subcommand)]
    Product(ProductCommand),

    /// Inspect and edit a user's open cart
    #[command(subcommand)]
    Cart(CartCommand),

    /// Turn a cart into a pending order
    Checkout {
        /// Cart ID
        cart: CartId,

        /// Shipping address ID
        #[arg(short, long)]
        address: AddressId,
    },

    /// Inspect and advance orders
    #[command(subcommand)]
    Order(OrderCommand),

    /// Record payment attempts and their outcomes
    #[command(subcommand)]
    Payment(PaymentCommand),
}

#[derive(Debug, Subcommand)]
pub enum ProductCommand {
    /// Create or replace a catalog entry
    Upsert {
        /// Product name
        name: String,

        /// Unit price in cents
        #[arg(short, long)]
        price_cents: i64,

        /// Existing product ID to replace
        #[arg(long)]
        id: Option<ProductId>,

        /// Mark the product as no longer sold
        #[arg(long)]
        inactive: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CartCommand {
    /// Show the user's open cart
    Show {
        /// User ID
        user: UserId,
    },

    /// Add units of a product
    Add {
        user: UserId,
        product: ProductId,

        #[arg(short, long, default_value = "1")]
        quantity: u32,
    },

    /// Set the quantity of a line
    Update {
        user: UserId,
        product: ProductId,

        #[arg(short, long)]
        quantity: u32,
    },

    /// Remove a product's line
    Remove { user: UserId, product: ProductId },

    /// Remove every line
    Clear { user: UserId },

    /// Delete an open cart
    Delete { cart: CartId },
}

#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// Show an order by ID or order number
    Show {
        /// Order ID or order number
        order: String,
    },

    /// Move an order to another status
    Status { order: OrderId, status: OrderStatus },

    /// Cancel a pending or confirmed order
    Cancel { order: OrderId },

    /// Replace the total of a pending order
    Total {
        order: OrderId,

        #[arg(short, long)]
        cents: i64,
    },

    /// Point a pending order at another shipping address
    Address { order: OrderId, address: AddressId },
}

#[derive(Debug, Subcommand)]
pub enum PaymentCommand {
    /// Open a pending payment against an order
    Create {
        order: OrderId,

        #[arg(short, long)]
        cents: i64,

        /// credit_card, debit_card, pix, boleto or paypal
        #[arg(short, long)]
        method: PaymentMethod,

        /// Gateway transaction ID
        #[arg(short, long)]
        transaction_id: Option<String>,
    },

    /// Show a payment
    Show { payment: PaymentId },

    /// Apply a gateway outcome
    Status {
        payment: PaymentId,
        status: PaymentStatus,
    },

    /// Change the amount of a pending payment
    Amount {
        payment: PaymentId,

        #[arg(short, long)]
        cents: i64,
    },

    /// Record or clear the gateway transaction ID
    TransactionId { payment: PaymentId, value: String },
}
