//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! cw-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CART_DATABASE_URL` - `PostgreSQL` connection string for cart snapshots
//!
//! # Migration Files
//!
//! Cart migrations: `crates/cart/migrations/`

use cartwheel_cart::persistence::create_pool;
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run cart snapshot migrations.
pub async fn cart() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CART_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("CART_DATABASE_URL"))?;

    tracing::info!("Connecting to cart database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running cart migrations...");
    sqlx::migrate!("../cart/migrations").run(&pool).await?;

    tracing::info!("Cart migrations complete!");
    Ok(())
}
