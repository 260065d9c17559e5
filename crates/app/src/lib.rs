//! Administrative command line for the commerce back office.
//!
//! Wires configuration, logging and the PostgreSQL store to the services
//! and renders every result as JSON on stdout.

pub mod cli;
pub mod config;
pub mod error;

use common::ProductId;
use domain::Money;
use serde_json::{Value, json};
use services::{
    AddCartItem, CartService, Checkout, CheckoutConfig, CheckoutService, CreatePayment,
    OrderService, PaymentService, RemoveCartItem, UpdateCartItem, UpdateOrderStatus,
    UpdateOrderTotal, UpdatePaymentAmount, UpdatePaymentStatus, UpdateShippingAddress,
};
use sqlx::postgres::PgPoolOptions;
use store::{PostgresStore, Product, ProductCatalog, TransactionScope, TransactionalStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{CartCommand, Command, OrderCommand, PaymentCommand, ProductCommand};
use config::{Config, LogFormat};
use error::AppError;

/// Installs the global tracing subscriber. Logs go to stderr so stdout
/// stays machine-readable.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Connects to PostgreSQL and runs one command.
pub async fn run(command: Command, config: &Config) -> Result<Value, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    let store = PostgresStore::new(pool);

    if let Command::Migrate = command {
        store.run_migrations().await?;
        tracing::info!("Migrations applied");
        return Ok(json!({ "migrated": true }));
    }

    App::new(store, &config.checkout).dispatch(command).await
}

/// The services over one store.
pub struct App<S> {
    scope: TransactionScope<S>,
    carts: CartService<S>,
    checkout: CheckoutService<S>,
    orders: OrderService<S>,
    payments: PaymentService<S>,
}

impl<S: TransactionalStore + Clone> App<S> {
    pub fn new(store: S, checkout: &CheckoutConfig) -> Self {
        let scope = TransactionScope::new(store.clone());
        Self {
            carts: CartService::new(scope.clone()),
            orders: OrderService::new(scope.clone()),
            payments: PaymentService::new(scope.clone()),
            checkout: CheckoutService::new(store, checkout),
            scope,
        }
    }

    /// Runs a command and returns its JSON rendering.
    pub async fn dispatch(&self, command: Command) -> Result<Value, AppError> {
        match command {
            Command::Migrate => Err(AppError::InvalidArgument(
                "migrations need a PostgreSQL store".to_string(),
            )),
            Command::Product(cmd) => self.product(cmd).await,
            Command::Cart(cmd) => self.cart(cmd).await,
            Command::Checkout { cart, address } => {
                let order = self.checkout.checkout(Checkout::new(cart, address)).await?;
                Ok(serde_json::to_value(&order)?)
            }
            Command::Order(cmd) => self.order(cmd).await,
            Command::Payment(cmd) => self.payment(cmd).await,
        }
    }

    async fn product(&self, cmd: ProductCommand) -> Result<Value, AppError> {
        let ProductCommand::Upsert {
            name,
            price_cents,
            id,
            inactive,
        } = cmd;

        let price = Money::from_cents(price_cents);
        if !price.is_within_bounds() {
            return Err(AppError::InvalidArgument(format!(
                "price must be between 1 and 99999999 cents, got {price_cents}"
            )));
        }
        let mut product = Product::new(id.unwrap_or_else(ProductId::new), name, price);
        product.is_active = !inactive;

        let saved = product.clone();
        self.scope
            .execute(move |tx| Box::pin(async move { tx.save_product(&saved).await }))
            .await?;

        Ok(json!({
            "id": product.id,
            "name": product.name,
            "price": product.price,
            "is_active": product.is_active,
        }))
    }

    async fn cart(&self, cmd: CartCommand) -> Result<Value, AppError> {
        let cart = match cmd {
            CartCommand::Show { user } => match self.carts.get_cart(user).await? {
                Some(cart) => cart,
                None => return Ok(Value::Null),
            },
            CartCommand::Add {
                user,
                product,
                quantity,
            } => {
                self.carts
                    .add_item(AddCartItem::new(user, product, quantity))
                    .await?
            }
            CartCommand::Update {
                user,
                product,
                quantity,
            } => {
                self.carts
                    .update_item(UpdateCartItem::new(user, product, quantity))
                    .await?
            }
            CartCommand::Remove { user, product } => {
                self.carts
                    .remove_item(RemoveCartItem::new(user, product))
                    .await?
            }
            CartCommand::Clear { user } => self.carts.clear(user).await?,
            CartCommand::Delete { cart } => {
                self.carts.delete_cart(cart).await?;
                return Ok(json!({ "deleted": cart }));
            }
        };
        Ok(json!({
            "cart": cart,
            "subtotal": cart.subtotal(),
            "total_quantity": cart.total_quantity(),
        }))
    }

    async fn order(&self, cmd: OrderCommand) -> Result<Value, AppError> {
        let order = match cmd {
            OrderCommand::Show { order } => match order.parse() {
                Ok(order_id) => self.orders.get_order(order_id).await?,
                Err(_) => self.orders.get_by_order_number(&order).await?,
            },
            OrderCommand::Status { order, status } => {
                self.orders
                    .update_status(UpdateOrderStatus::new(order, status))
                    .await?
            }
            OrderCommand::Cancel { order } => self.orders.cancel_order(order).await?,
            OrderCommand::Total { order, cents } => {
                self.orders
                    .update_total(UpdateOrderTotal::new(order, Money::from_cents(cents)))
                    .await?
            }
            OrderCommand::Address { order, address } => {
                self.orders
                    .update_shipping_address(UpdateShippingAddress::new(order, address))
                    .await?
            }
        };
        Ok(json!({
            "order": order,
            "paid_amount": order.paid_amount(),
            "pending_amount": order.pending_amount(),
        }))
    }

    async fn payment(&self, cmd: PaymentCommand) -> Result<Value, AppError> {
        let payment = match cmd {
            PaymentCommand::Create {
                order,
                cents,
                method,
                transaction_id,
            } => {
                let mut create = CreatePayment::new(order, Money::from_cents(cents), method);
                create.transaction_id = transaction_id;
                self.payments.create_payment(create).await?
            }
            PaymentCommand::Show { payment } => self.payments.get_payment(payment).await?,
            PaymentCommand::Status { payment, status } => {
                self.payments
                    .update_status(UpdatePaymentStatus::new(payment, status))
                    .await?
            }
            PaymentCommand::Amount { payment, cents } => {
                self.payments
                    .update_amount(UpdatePaymentAmount::new(payment, Money::from_cents(cents)))
                    .await?
            }
            PaymentCommand::TransactionId { payment, value } => {
                self.payments.update_transaction_id(payment, value).await?
            }
        };
        Ok(serde_json::to_value(&payment)?)
    }
}
