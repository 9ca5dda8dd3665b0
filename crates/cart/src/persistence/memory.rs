//! In-process snapshot store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{PersistenceError, SnapshotStore};

/// A `HashMap`-backed store.
///
/// Clones share the same map, so a test can keep a handle while the cart
/// owns another. Loads and saves can be switched to fail to exercise the
/// non-fatal persistence paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent loads fail (or succeed again).
    pub fn fail_loads(&self, fail: bool) {
        self.inner.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Current bytes under `key`, bypassing the failure switches.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries().ok()?.get(key).cloned()
    }

    /// Store bytes under `key` directly, bypassing the failure switches.
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        if let Ok(mut entries) = self.entries() {
            entries.insert(key.to_owned(), bytes);
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, PersistenceError> {
        self.inner
            .entries
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl SnapshotStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        if self.inner.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory store loads disabled".to_string(),
            ));
        }
        Ok(self.entries()?.get(key).cloned())
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory store saves disabled".to_string(),
            ));
        }
        self.entries()?.insert(key.to_owned(), bytes);
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
