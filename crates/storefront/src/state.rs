//! Application state shared across handlers.

use std::sync::Arc;

use cartwheel_cart::CartStore;
use cartwheel_cart::persistence::Backend;
use tokio::sync::{Mutex, MutexGuard, watch};

use crate::catalog::CatalogClient;
use crate::config::StorefrontConfig;

/// The cart store type used by the storefront.
pub type Cart = CartStore<Backend>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the catalog client and the cart.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: CatalogClient,
    cart: Mutex<Cart>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The cart must already be restored; the state becomes its only owner.
    #[must_use]
    pub fn new(config: StorefrontConfig, catalog: CatalogClient, cart: Cart) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                cart: Mutex::new(cart),
                shutdown: watch::Sender::new(false),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Lock the cart for one operation.
    ///
    /// Holding the guard serializes cart operations, so each request sees the
    /// result of every operation dispatched before it.
    pub async fn cart(&self) -> MutexGuard<'_, Cart> {
        self.inner.cart.lock().await
    }

    /// Signal long-lived responses (cart event streams) to finish.
    pub fn begin_shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Receiver that flips to `true` once [`Self::begin_shutdown`] is called.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Wait for all queued cart snapshots to be written.
    pub async fn flush_cart(&self) {
        self.cart().await.flush().await;
    }
}
