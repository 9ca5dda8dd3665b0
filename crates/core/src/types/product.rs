//! Catalog product records.
//!
//! Field names follow the REST catalog's JSON so responses deserialize
//! directly. The cart only ever reads `id`, `title`, `price` and `image`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// A product as returned by the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog product id.
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// Current catalog price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Category name (e.g. "electronics").
    #[serde(default)]
    pub category: String,
    /// Image URL.
    #[serde(default)]
    pub image: String,
    /// Aggregate customer rating.
    #[serde(default)]
    pub rating: Rating,
}

/// Aggregate customer rating.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating {
    /// Average rating, 0-5.
    pub rate: f64,
    /// Number of ratings.
    pub count: u32,
}
