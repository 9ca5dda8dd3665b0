//! Cart management commands.
//!
//! Each command restores the cart from the configured backend, applies one
//! operation, waits for the snapshot to be written and prints the result.
//!
//! # Environment Variables
//!
//! Same as the storefront: `CART_STORAGE`, `CART_DATA_DIR`,
//! `CART_DATABASE_URL`, `CART_SNAPSHOT_KEY`, `CART_TAX_RATE` and
//! `CATALOG_BASE_URL` (for `add`).

use std::fmt::Write as _;
use std::sync::Arc;

use cartwheel_cart::{
    CartError, CartState, CartStore, PersistenceFailure, ProductCandidate, SnapshotStore,
};
use cartwheel_core::{ProductId, ProductIdError};
use cartwheel_storefront::catalog::{CatalogClient, CatalogError};
use cartwheel_storefront::config::{ConfigError, StorefrontConfig};
use cartwheel_storefront::routes::cart::CartView;
use cartwheel_storefront::storage::{StorageError, open_backend};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur during cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Invalid product id: {0}")]
    InvalidId(#[from] ProductIdError),

    /// The change was applied but its snapshot was not saved.
    #[error("Cart snapshot not saved: {0:?}")]
    NotSaved(PersistenceFailure),
}

/// A single cart operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Add(String),
    Remove(String),
    Set(String, i64),
    Clear,
}

/// Run `command` against the configured cart and render the result.
pub async fn run(command: Command) -> Result<String, CartCommandError> {
    let config = StorefrontConfig::from_env()?;
    let backend = open_backend(&config.cart.storage).await?;
    tracing::debug!(backend = backend.name(), key = %config.cart.snapshot_key, "Opening cart");

    let mut cart = CartStore::restore(backend, config.cart.snapshot_key.clone()).await;
    if let Some(failure) = cart.restore_failure() {
        tracing::warn!(?failure, "Stored cart could not be restored, starting empty");
    }

    let mut failures = cart.failures();
    let catalog = CatalogClient::new(config.catalog_base_url.clone());
    let result = apply(&mut cart, command, &catalog).await;
    cart.shutdown().await;

    let state = result?;
    if let Some(failure) = first_failure(&mut failures) {
        return Err(CartCommandError::NotSaved(failure));
    }

    Ok(render(&CartView::new(&state, config.cart.tax_rate)))
}

async fn apply<S: SnapshotStore>(
    cart: &mut CartStore<S>,
    command: Command,
    catalog: &CatalogClient,
) -> Result<Arc<CartState>, CartCommandError> {
    let state = match command {
        Command::Show => cart.snapshot(),
        Command::Add(raw) => {
            let id = ProductId::parse(&raw)?;
            let product = catalog.get_product(&id).await?;
            tracing::info!(id = %id, title = %product.title, "Adding product");
            cart.add_item(ProductCandidate::from(product.as_ref()))?
        }
        Command::Remove(raw) => cart.remove_item(&ProductId::parse(&raw)?),
        Command::Set(raw, quantity) => cart.set_quantity(&ProductId::parse(&raw)?, quantity)?,
        Command::Clear => cart.clear(),
    };
    Ok(state)
}

fn first_failure(failures: &mut broadcast::Receiver<PersistenceFailure>) -> Option<PersistenceFailure> {
    loop {
        match failures.try_recv() {
            Ok(failure) => return Some(failure),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => return None,
        }
    }
}

/// Plain-text cart summary.
fn render(view: &CartView) -> String {
    if view.items.is_empty() {
        return "Your cart is empty".to_string();
    }

    let mut out = format!("Cart ({})\n", view.item_label);
    for item in &view.items {
        let _ = writeln!(
            out,
            "  {} x {} [{}]  {} each  {}",
            item.quantity, item.title, item.id, item.price, item.line_price
        );
    }
    let _ = writeln!(out, "Subtotal  {}", view.subtotal);
    let _ = writeln!(out, "Shipping  {}", view.shipping);
    let _ = writeln!(out, "Tax       {}", view.tax);
    let _ = write!(out, "Total     {}", view.total);
    out
}
