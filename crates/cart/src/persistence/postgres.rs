//! `PostgreSQL` snapshot store.
//!
//! # Table: `cart_snapshots`
//!
//! Created by `crates/cart/migrations/`, run via:
//! ```bash
//! cargo run -p cartwheel-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{PersistenceError, SnapshotStore};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(4)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Stores snapshots as rows keyed by snapshot key.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SnapshotStore for PgStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let payload = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT payload FROM cart_snapshots WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payload)
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        sqlx::query(
            r"
            INSERT INTO cart_snapshots (key, payload, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET payload = EXCLUDED.payload, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(bytes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
