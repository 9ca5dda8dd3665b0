//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_DATABASE_URL` - `PostgreSQL` connection string (only when `CART_STORAGE=postgres`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CATALOG_BASE_URL` - Product catalog REST endpoint (default: <https://fakestoreapi.com>)
//! - `CART_STORAGE` - Snapshot backend: `memory`, `file` or `postgres` (default: file)
//! - `CART_DATA_DIR` - Snapshot directory for the file backend (default: .cartwheel)
//! - `CART_SNAPSHOT_KEY` - Key the cart snapshot is stored under (default: ecommerce-cart)
//! - `CART_TAX_RATE` - Display-only tax multiplier (default: 0.08)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default fixed key for the cart snapshot.
pub const DEFAULT_SNAPSHOT_KEY: &str = "ecommerce-cart";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Product catalog base URL
    pub catalog_base_url: Url,
    /// Cart snapshot persistence settings
    pub cart: CartConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error event sample rate
    pub sentry_sample_rate: f32,
    /// Sentry performance trace sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Cart persistence and display settings.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Where snapshots are stored
    pub storage: StorageConfig,
    /// Fixed key the snapshot lives under
    pub snapshot_key: String,
    /// Display-only tax multiplier (0.08 = 8%)
    pub tax_rate: Decimal,
}

/// Snapshot backend selection.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Keep snapshots in process memory (lost on restart)
    Memory,
    /// One JSON file per key under `dir`
    File { dir: PathBuf },
    /// `cart_snapshots` table in `PostgreSQL`
    Postgres { database_url: SecretString },
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env.parse_or("STOREFRONT_HOST", "127.0.0.1")?;
        let port = env.parse_or("STOREFRONT_PORT", "3000")?;
        let catalog_base_url = parse_catalog_url(
            &env.get_or("CATALOG_BASE_URL", "https://fakestoreapi.com"),
        )?;
        let cart = CartConfig::from_env(&env)?;

        Ok(Self {
            host,
            port,
            catalog_base_url,
            cart,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CartConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let storage = match env.get_or("CART_STORAGE", "file").to_lowercase().as_str() {
            "memory" => StorageConfig::Memory,
            "file" => StorageConfig::File {
                dir: PathBuf::from(env.get_or("CART_DATA_DIR", ".cartwheel")),
            },
            "postgres" => StorageConfig::Postgres {
                database_url: SecretString::from(env.require("CART_DATABASE_URL")?),
            },
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "CART_STORAGE".to_string(),
                    format!("unknown backend '{other}' (expected memory, file or postgres)"),
                ));
            }
        };

        let tax_rate: Decimal = env.parse_or("CART_TAX_RATE", "0.08")?;
        if tax_rate < Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "CART_TAX_RATE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let snapshot_key = env.get_or("CART_SNAPSHOT_KEY", DEFAULT_SNAPSHOT_KEY);
        if snapshot_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_SNAPSHOT_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            storage,
            snapshot_key,
            tax_rate,
        })
    }
}

/// Thin wrapper over a variable lookup with the usual accessors.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.is_empty())
    }

    fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }

    fn parse_or<T>(&self, name: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_or(name, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string()))
    }
}

fn parse_catalog_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("CATALOG_BASE_URL".to_string(), reason);

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    Ok(url)
}
