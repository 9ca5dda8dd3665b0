//! The cart store: reducer + publication + persistence.
//!
//! `CartStore` is constructed once at startup via [`CartStore::restore`] and
//! is the only writer of the cart state and its snapshot key. Each operation:
//!
//! 1. runs the pure reducer against the current state,
//! 2. queues a full snapshot for the background writer,
//! 3. publishes the new `Arc<CartState>` to subscribers.
//!
//! The caller never waits on the save. The writer task saves snapshots one
//! at a time in the order they were queued; failures are logged and sent on
//! the [`PersistenceFailure`] channel but never undo a transition.

use std::sync::Arc;

use cartwheel_core::ProductId;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::persistence::SnapshotStore;
use crate::reducer::{self, CartAction, CartError, ProductCandidate};
use crate::snapshot;
use crate::state::CartState;

/// Capacity of the failure broadcast channel. Slow receivers see `Lagged`.
const FAILURE_CHANNEL_CAPACITY: usize = 32;

/// A non-fatal persistence problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceFailure {
    /// The snapshot could not be read at startup.
    Load { key: String, reason: String },
    /// The stored snapshot was unreadable or inconsistent.
    Corrupt { key: String, reason: String },
    /// A snapshot could not be encoded.
    Encode { reason: String },
    /// A snapshot could not be written.
    Save { key: String, reason: String },
}

enum WriterMessage {
    Save(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// Owner of the live cart.
pub struct CartStore<S: SnapshotStore> {
    state: watch::Sender<Arc<CartState>>,
    failures: broadcast::Sender<PersistenceFailure>,
    writer: mpsc::UnboundedSender<WriterMessage>,
    writer_task: JoinHandle<()>,
    restore_failure: Option<PersistenceFailure>,
    persistence: Arc<S>,
}

impl<S: SnapshotStore> CartStore<S> {
    /// Load the snapshot under `key` and start the store.
    ///
    /// A missing, unreadable or inconsistent snapshot yields an empty cart;
    /// the reason is kept in [`Self::restore_failure`]. This never fails.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn restore(persistence: S, key: impl Into<String>) -> Self {
        let key: Arc<str> = Arc::from(key.into());
        let persistence = Arc::new(persistence);

        let (initial, restore_failure) = load_initial(persistence.as_ref(), &key).await;
        info!(
            key = %key,
            lines = initial.items().len(),
            total_quantity = initial.total_quantity(),
            "Cart restored"
        );

        let (state, _) = watch::channel(Arc::new(initial));
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let (writer, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(run_writer(
            Arc::clone(&persistence),
            key,
            rx,
            failures.clone(),
        ));

        Self {
            state,
            failures,
            writer,
            writer_task,
            restore_failure,
            persistence,
        }
    }

    /// The latest published state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CartState> {
        Arc::clone(&self.state.borrow())
    }

    /// Subscribe to state changes. The receiver sees every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<CartState>> {
        self.state.subscribe()
    }

    /// Subscribe to persistence failures that happen from now on.
    #[must_use]
    pub fn failures(&self) -> broadcast::Receiver<PersistenceFailure> {
        self.failures.subscribe()
    }

    /// Why restore fell back to an empty cart, if it did.
    #[must_use]
    pub const fn restore_failure(&self) -> Option<&PersistenceFailure> {
        self.restore_failure.as_ref()
    }

    /// The snapshot backend.
    #[must_use]
    pub fn persistence(&self) -> &S {
        &self.persistence
    }

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] on a precondition violation; nothing is
    /// published or saved in that case.
    pub fn add_item(&mut self, candidate: ProductCandidate) -> Result<Arc<CartState>, CartError> {
        self.dispatch(CartAction::AddItem(candidate))
    }

    /// Remove a line entirely.
    ///
    /// Removing an id that is not in the cart still publishes and saves the
    /// unchanged state, so every call produces exactly one snapshot.
    pub fn remove_item(&mut self, id: &ProductId) -> Arc<CartState> {
        let next = reducer::remove_item(&self.snapshot(), id);
        self.commit(next)
    }

    /// Set a line's quantity; `quantity <= 0` removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::QuantityOverflow`] for quantities above `u32::MAX`.
    pub fn set_quantity(
        &mut self,
        id: &ProductId,
        quantity: i64,
    ) -> Result<Arc<CartState>, CartError> {
        let next = reducer::set_quantity(&self.snapshot(), id, quantity)?;
        Ok(self.commit(next))
    }

    /// Empty the cart.
    pub fn clear(&mut self) -> Arc<CartState> {
        self.commit(reducer::clear())
    }

    /// Apply any [`CartAction`].
    ///
    /// # Errors
    ///
    /// Returns the reducer's [`CartError`] unchanged.
    pub fn dispatch(&mut self, action: CartAction) -> Result<Arc<CartState>, CartError> {
        let next = reducer::reduce(&self.snapshot(), action)?;
        Ok(self.commit(next))
    }

    /// Wait until every snapshot queued so far has been saved or has failed.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.writer.send(WriterMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush pending snapshots and stop the writer.
    pub async fn shutdown(self) {
        drop(self.writer);
        if let Err(e) = self.writer_task.await {
            error!(error = %e, "Snapshot writer task failed");
        }
    }

    fn commit(&mut self, next: CartState) -> Arc<CartState> {
        debug_assert_eq!(next.check_invariants(), Ok(()));
        let next = Arc::new(next);

        match snapshot::encode(&next) {
            Ok(bytes) => {
                if self.writer.send(WriterMessage::Save(bytes)).is_err() {
                    error!("Snapshot writer is gone, cart change not persisted");
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to encode cart snapshot");
                let _ = self.failures.send(PersistenceFailure::Encode {
                    reason: e.to_string(),
                });
            }
        }

        self.state.send_replace(Arc::clone(&next));
        debug!(
            lines = next.items().len(),
            total_quantity = next.total_quantity(),
            total_amount = %next.total_amount(),
            "Cart updated"
        );
        next
    }
}

async fn load_initial<S: SnapshotStore>(
    persistence: &S,
    key: &str,
) -> (CartState, Option<PersistenceFailure>) {
    let bytes = match persistence.load(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return (CartState::default(), None),
        Err(e) => {
            warn!(key, error = %e, "Failed to load cart snapshot, starting empty");
            let failure = PersistenceFailure::Load {
                key: key.to_owned(),
                reason: e.to_string(),
            };
            return (CartState::default(), Some(failure));
        }
    };

    match snapshot::decode(&bytes) {
        Ok(state) => (state, None),
        Err(e) => {
            warn!(key, error = %e, "Discarding unusable cart snapshot, starting empty");
            let failure = PersistenceFailure::Corrupt {
                key: key.to_owned(),
                reason: e.to_string(),
            };
            (CartState::default(), Some(failure))
        }
    }
}

async fn run_writer<S: SnapshotStore>(
    persistence: Arc<S>,
    key: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
    failures: broadcast::Sender<PersistenceFailure>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            WriterMessage::Save(bytes) => {
                if let Err(e) = persistence.save(&key, bytes).await {
                    warn!(key = %key, error = %e, "Failed to save cart snapshot");
                    let _ = failures.send(PersistenceFailure::Save {
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
            WriterMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!(key = %key, "Snapshot writer stopped");
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::persistence::{FileStore, MemoryStore};

    const KEY: &str = "ecommerce-cart";

    fn shoe() -> ProductCandidate {
        ProductCandidate {
            id: Some(ProductId::Numeric(1)),
            title: "Shoe".to_string(),
            price: Decimal::from(50),
            image: "x".to_string(),
        }
    }

    fn decoded(store: &MemoryStore) -> CartState {
        snapshot::decode(&store.get(KEY).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_restore_without_snapshot_is_empty() {
        let cart = CartStore::restore(MemoryStore::new(), KEY).await;
        assert_eq!(*cart.snapshot(), CartState::default());
        assert_eq!(cart.restore_failure(), None);
    }

    #[tokio::test]
    async fn test_each_operation_persists_full_state() {
        let store = MemoryStore::new();
        let mut cart = CartStore::restore(store.clone(), KEY).await;

        cart.add_item(shoe()).unwrap();
        cart.add_item(shoe()).unwrap();
        cart.flush().await;
        assert_eq!(store.save_count(), 2);
        assert_eq!(decoded(&store), *cart.snapshot());
        assert_eq!(decoded(&store).total_amount(), Decimal::from(100));

        cart.clear();
        cart.flush().await;
        assert_eq!(decoded(&store), CartState::default());
    }

    #[tokio::test]
    async fn test_remove_missing_id_still_persists() {
        let store = MemoryStore::new();
        let mut cart = CartStore::restore(store.clone(), KEY).await;

        let state = cart.remove_item(&ProductId::Numeric(999));
        cart.flush().await;

        assert_eq!(*state, CartState::default());
        assert_eq!(store.save_count(), 1);
        assert_eq!(decoded(&store), CartState::default());
    }

    #[tokio::test]
    async fn test_precondition_failure_changes_nothing() {
        let store = MemoryStore::new();
        let mut cart = CartStore::restore(store.clone(), KEY).await;
        let mut rx = cart.subscribe();

        let mut missing_id = shoe();
        missing_id.id = None;
        assert_eq!(cart.add_item(missing_id), Err(CartError::MissingProductId));
        cart.flush().await;

        assert_eq!(store.save_count(), 0);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_restart_restores_cart() {
        let store = MemoryStore::new();
        let mut cart = CartStore::restore(store.clone(), KEY).await;
        cart.add_item(shoe()).unwrap();
        cart.add_item(shoe()).unwrap();
        let before = cart.set_quantity(&ProductId::Numeric(1), 5).unwrap();
        cart.shutdown().await;

        let restarted = CartStore::restore(store, KEY).await;
        assert_eq!(restarted.snapshot(), before);
        assert_eq!(restarted.snapshot().total_amount(), Decimal::from(250));
        assert_eq!(restarted.restore_failure(), None);
    }

    #[tokio::test]
    async fn test_restart_with_file_store() {
        let dir = tempfile::tempdir().unwrap();

        let mut cart = CartStore::restore(FileStore::new(dir.path()), KEY).await;
        cart.add_item(shoe()).unwrap();
        let saved = cart.set_quantity(&ProductId::Numeric(1), 3).unwrap();
        cart.shutdown().await;

        let restarted = CartStore::restore(FileStore::new(dir.path()), KEY).await;
        assert_eq!(restarted.snapshot(), saved);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_restores_empty() {
        let store = MemoryStore::new();
        store.insert(KEY, b"{\"items\": 12".to_vec());

        let cart = CartStore::restore(store, KEY).await;
        assert_eq!(*cart.snapshot(), CartState::default());
        assert!(matches!(
            cart.restore_failure(),
            Some(PersistenceFailure::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_inconsistent_snapshot_restores_empty() {
        let store = MemoryStore::new();
        store.insert(
            KEY,
            br#"{"items":[{"id":1,"title":"Shoe","price":50,"image":"x","quantity":2}],"totalAmount":999,"totalQuantity":2}"#.to_vec(),
        );

        let cart = CartStore::restore(store, KEY).await;
        assert!(cart.snapshot().is_empty());
        assert!(matches!(
            cart.restore_failure(),
            Some(PersistenceFailure::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_failure_restores_empty() {
        let store = MemoryStore::new();
        store.insert(KEY, snapshot::encode(&CartState::default()).unwrap());
        store.fail_loads(true);

        let cart = CartStore::restore(store, KEY).await;
        assert!(cart.snapshot().is_empty());
        assert!(matches!(
            cart.restore_failure(),
            Some(PersistenceFailure::Load { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_failure_is_reported_and_transition_stands() {
        let store = MemoryStore::new();
        store.fail_saves(true);
        let mut cart = CartStore::restore(store.clone(), KEY).await;
        let mut failures = cart.failures();

        let state = cart.add_item(shoe()).unwrap();
        cart.flush().await;

        assert_eq!(state.total_quantity(), 1);
        assert_eq!(cart.snapshot().total_quantity(), 1);
        assert_eq!(store.get(KEY), None);
        assert!(matches!(
            failures.try_recv(),
            Ok(PersistenceFailure::Save { .. })
        ));

        store.fail_saves(false);
        cart.add_item(shoe()).unwrap();
        cart.flush().await;
        assert_eq!(decoded(&store).total_quantity(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_change() {
        let mut cart = CartStore::restore(MemoryStore::new(), KEY).await;
        let mut rx = cart.subscribe();

        cart.add_item(shoe()).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().total_quantity(), 1);

        cart.set_quantity(&ProductId::Numeric(1), 4).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().total_quantity(), 4);

        cart.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_are_immutable_reads() {
        let mut cart = CartStore::restore(MemoryStore::new(), KEY).await;
        let before = cart.snapshot();
        cart.add_item(shoe()).unwrap();

        assert!(before.is_empty());
        assert_eq!(cart.snapshot().total_quantity(), 1);
    }

    #[tokio::test]
    async fn test_saves_land_in_dispatch_order() {
        let store = MemoryStore::new();
        let mut cart = CartStore::restore(store.clone(), KEY).await;

        for quantity in 1..=20 {
            if quantity == 1 {
                cart.add_item(shoe()).unwrap();
            } else {
                cart.set_quantity(&ProductId::Numeric(1), quantity).unwrap();
            }
        }
        cart.shutdown().await;

        assert_eq!(store.save_count(), 20);
        assert_eq!(decoded(&store).total_quantity(), 20);
    }
}
