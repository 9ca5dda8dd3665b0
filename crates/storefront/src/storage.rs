//! Snapshot backend selection.

use cartwheel_cart::persistence::{Backend, FileStore, MemoryStore};
use thiserror::Error;

use crate::config::StorageConfig;

/// Errors that can occur while opening the configured backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `CART_STORAGE=postgres` in a build without the `postgres` feature.
    #[cfg(not(feature = "postgres"))]
    #[error("postgres storage requires the `postgres` feature")]
    PostgresDisabled,

    /// The database could not be reached.
    #[error("Failed to open snapshot storage: {0}")]
    Persistence(#[from] cartwheel_cart::PersistenceError),
}

/// Open the snapshot backend described by `config`.
///
/// # Errors
///
/// Returns `StorageError` if the postgres backend is selected but unavailable.
pub async fn open_backend(config: &StorageConfig) -> Result<Backend, StorageError> {
    match config {
        StorageConfig::Memory => Ok(Backend::Memory(MemoryStore::new())),
        StorageConfig::File { dir } => Ok(Backend::File(FileStore::new(dir.clone()))),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres { database_url } => {
            use cartwheel_cart::PersistenceError;
            use cartwheel_cart::persistence::{PgStore, create_pool};

            let pool = create_pool(database_url)
                .await
                .map_err(PersistenceError::from)?;
            Ok(Backend::Postgres(PgStore::new(pool)))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(StorageError::PostgresDisabled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_and_file() {
        let backend = open_backend(&StorageConfig::Memory).await.unwrap();
        assert_eq!(backend.name(), "memory");

        let backend = open_backend(&StorageConfig::File {
            dir: ".cartwheel".into(),
        })
        .await
        .unwrap();
        assert_eq!(backend.name(), "file");
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_postgres_requires_feature() {
        let config = StorageConfig::Postgres {
            database_url: "postgres://localhost/cart".into(),
        };
        assert!(matches!(
            open_backend(&config).await,
            Err(StorageError::PostgresDisabled)
        ));
    }
}
