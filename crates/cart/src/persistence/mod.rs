//! Snapshot persistence adapters.
//!
//! The cart treats persistence as a best-effort cache of its in-memory
//! state: a key-value byte store with `load` and `save`. Backends:
//!
//! - [`MemoryStore`] - in-process map, used by tests and `CART_STORAGE=memory`
//! - [`FileStore`] - one JSON file per key under a data directory
//! - [`PgStore`] - `cart_snapshots` table in `PostgreSQL` (feature `postgres`)
//!
//! [`Backend`] wraps whichever one the configuration selects.

use std::future::Future;

use thiserror::Error;

mod file;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::{PgStore, create_pool};

/// Errors that can occur when reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed.
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A key-value byte store for cart snapshots.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Read the bytes stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing has been saved under `key`.
    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, PersistenceError>> + Send;

    /// Replace the bytes stored under `key`.
    fn save(
        &self,
        key: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// The snapshot backend selected at startup.
#[derive(Debug, Clone)]
pub enum Backend {
    Memory(MemoryStore),
    File(FileStore),
    #[cfg(feature = "postgres")]
    Postgres(PgStore),
}

impl Backend {
    /// Short backend name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => "postgres",
        }
    }
}

impl SnapshotStore for Backend {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match self {
            Self::Memory(store) => store.load(key).await,
            Self::File(store) => store.load(key).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(store) => store.load(key).await,
        }
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        match self {
            Self::Memory(store) => store.save(key, bytes).await,
            Self::File(store) => store.save(key, bytes).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(store) => store.save(key, bytes).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_delegates() {
        let memory = MemoryStore::new();
        let backend = Backend::Memory(memory.clone());

        backend.save("cart", b"payload".to_vec()).await.unwrap();
        assert_eq!(memory.get("cart"), Some(b"payload".to_vec()));
        assert_eq!(
            backend.load("cart").await.unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(backend.name(), "memory");
    }
}
