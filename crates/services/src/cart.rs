//! Cart commands.

use common::{CartId, UserId};
use domain::Cart;
use store::{TransactionScope, TransactionalStore, UnitOfWork};

use crate::commands::{AddCartItem, RemoveCartItem, UpdateCartItem};
use crate::{Result, ServiceError};

/// Edits a user's open cart.
///
/// Each command is its own transaction. Every edit rewrites the cart header,
/// which fails once a checkout has claimed the cart, so an edit can never
/// slip into a cart after its order was placed.
#[derive(Clone)]
pub struct CartService<S> {
    scope: TransactionScope<S>,
}

impl<S: TransactionalStore> CartService<S> {
    pub fn new(scope: TransactionScope<S>) -> Self {
        Self { scope }
    }

    // Query methods

    /// Returns the user's open cart, if there is one.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        self.scope
            .execute(move |tx| Box::pin(find_open_cart(tx, user_id)))
            .await
    }

    /// Loads any cart, converted or not.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart_by_id(&self, cart_id: CartId) -> Result<Cart> {
        self.scope
            .execute(move |tx| Box::pin(load_cart(tx, cart_id)))
            .await
    }

    // Command methods

    /// Returns the user's open cart, creating an empty one if needed.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart> {
        self.scope
            .execute(move |tx| Box::pin(open_cart(tx, user_id)))
            .await
    }

    /// Adds units of a product at its current catalog price.
    #[tracing::instrument(skip(self), fields(user_id = %cmd.user_id, product_id = %cmd.product_id))]
    pub async fn add_item(&self, cmd: AddCartItem) -> Result<Cart> {
        let cart = self
            .scope
            .execute(move |tx| Box::pin(add_item(tx, cmd)))
            .await?;
        tracing::debug!(cart_id = %cart.id(), lines = cart.distinct_items(), "Item added");
        Ok(cart)
    }

    /// Drops a product's line. Absent products leave the cart unchanged.
    #[tracing::instrument(skip(self), fields(user_id = %cmd.user_id, product_id = %cmd.product_id))]
    pub async fn remove_item(&self, cmd: RemoveCartItem) -> Result<Cart> {
        self.scope
            .execute(move |tx| Box::pin(remove_item(tx, cmd)))
            .await
    }

    /// Sets the quantity of an existing line.
    #[tracing::instrument(skip(self), fields(user_id = %cmd.user_id, product_id = %cmd.product_id))]
    pub async fn update_item(&self, cmd: UpdateCartItem) -> Result<Cart> {
        self.scope
            .execute(move |tx| Box::pin(update_item(tx, cmd)))
            .await
    }

    /// Removes every line from the user's open cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<Cart> {
        self.scope
            .execute(move |tx| Box::pin(clear(tx, user_id)))
            .await
    }

    /// Deletes an open cart. Converted carts stay as the record of their
    /// order.
    #[tracing::instrument(skip(self))]
    pub async fn delete_cart(&self, cart_id: CartId) -> Result<()> {
        self.scope
            .execute(move |tx| Box::pin(delete_cart(tx, cart_id)))
            .await?;
        tracing::info!(%cart_id, "Cart deleted");
        Ok(())
    }
}

async fn find_open_cart<Tx: UnitOfWork>(tx: &mut Tx, user_id: UserId) -> Result<Option<Cart>> {
    Ok(tx.find_open_cart(user_id).await?)
}

async fn load_cart<Tx: UnitOfWork>(tx: &mut Tx, cart_id: CartId) -> Result<Cart> {
    tx.find_cart(cart_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("cart", cart_id))
}

async fn require_open_cart<Tx: UnitOfWork>(tx: &mut Tx, user_id: UserId) -> Result<Cart> {
    tx.find_open_cart(user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("open cart for user", user_id))
}

async fn open_cart<Tx: UnitOfWork>(tx: &mut Tx, user_id: UserId) -> Result<Cart> {
    if let Some(cart) = tx.find_open_cart(user_id).await? {
        return Ok(cart);
    }
    let cart = Cart::new(user_id)?;
    tx.insert_cart(&cart).await?;
    tracing::info!(cart_id = %cart.id(), %user_id, "Cart created");
    Ok(cart)
}

async fn add_item<Tx: UnitOfWork>(tx: &mut Tx, cmd: AddCartItem) -> Result<Cart> {
    let product = tx
        .find_product(cmd.product_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("product", cmd.product_id))?;
    if !product.is_active {
        return Err(ServiceError::ProductUnavailable(product.id));
    }

    let mut cart = open_cart(tx, cmd.user_id).await?;
    let item = cart
        .add_item(cmd.product_id, cmd.quantity, product.price)?
        .clone();
    tx.update_cart(&cart).await?;
    tx.save_cart_item(&item).await?;
    Ok(cart)
}

async fn remove_item<Tx: UnitOfWork>(tx: &mut Tx, cmd: RemoveCartItem) -> Result<Cart> {
    let mut cart = require_open_cart(tx, cmd.user_id).await?;
    if cart.remove_item(cmd.product_id)?.is_some() {
        tx.update_cart(&cart).await?;
        tx.delete_cart_item(cart.id(), cmd.product_id).await?;
    }
    Ok(cart)
}

async fn update_item<Tx: UnitOfWork>(tx: &mut Tx, cmd: UpdateCartItem) -> Result<Cart> {
    let mut cart = require_open_cart(tx, cmd.user_id).await?;
    let item = cart
        .update_item_quantity(cmd.product_id, cmd.quantity)?
        .clone();
    tx.update_cart(&cart).await?;
    tx.save_cart_item(&item).await?;
    Ok(cart)
}

async fn clear<Tx: UnitOfWork>(tx: &mut Tx, user_id: UserId) -> Result<Cart> {
    let mut cart = require_open_cart(tx, user_id).await?;
    cart.clear()?;
    tx.update_cart(&cart).await?;
    tx.clear_cart_items(cart.id()).await?;
    Ok(cart)
}

async fn delete_cart<Tx: UnitOfWork>(tx: &mut Tx, cart_id: CartId) -> Result<()> {
    let cart = load_cart(tx, cart_id).await?;
    if let Some(order_id) = cart.converted_order_id() {
        return Err(ServiceError::CartAlreadyConverted { cart_id, order_id });
    }
    tx.delete_cart(cart_id).await?;
    Ok(())
}
