//! Product identifiers.
//!
//! Catalog services disagree on what a product id looks like: the REST
//! catalog hands out integers, other sources use string handles. `ProductId`
//! accepts both and serializes back to the shape it was given.
//!
//! Equality goes through the printed form: `Numeric(42)` and `Handle("42")`
//! are the same product, since a path segment cannot tell them apart.

use core::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductIdError {
    /// The input string is empty or only whitespace.
    #[error("product id cannot be empty")]
    Empty,
}

/// A stable product identifier, either numeric or a string handle.
///
/// ## Examples
///
/// ```
/// use cartwheel_core::ProductId;
///
/// let numeric: ProductId = "42".parse().unwrap();
/// assert_eq!(numeric, ProductId::Numeric(42));
///
/// let handle: ProductId = "blue-shoe".parse().unwrap();
/// assert_eq!(handle, ProductId::Handle("blue-shoe".to_string()));
///
/// assert!("".parse::<ProductId>().is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    /// Integer id, as issued by the REST catalog.
    Numeric(i64),
    /// Opaque string handle.
    Handle(String),
}

impl ProductId {
    /// Parse a `ProductId` from a path segment or form value.
    ///
    /// Anything that parses as an `i64` becomes [`ProductId::Numeric`] so that
    /// `/cart/items/3` matches the line added from a catalog id of `3`.
    ///
    /// # Errors
    ///
    /// Returns [`ProductIdError::Empty`] if the input is blank.
    pub fn parse(s: &str) -> Result<Self, ProductIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ProductIdError::Empty);
        }

        Ok(trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Handle(trimmed.to_owned()), Self::Numeric))
    }
}

impl PartialEq for ProductId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => a == b,
            (Self::Numeric(n), Self::Handle(h)) | (Self::Handle(h), Self::Numeric(n)) => {
                *h == n.to_string()
            }
        }
    }
}

impl Eq for ProductId {}

impl Hash for ProductId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Numeric(n) => n.to_string().hash(state),
            Self::Handle(h) => h.hash(state),
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Handle(handle) => f.write_str(handle),
        }
    }
}

impl FromStr for ProductId {
    type Err = ProductIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for ProductId {
    fn from(handle: &str) -> Self {
        Self::Handle(handle.to_owned())
    }
}

impl From<String> for ProductId {
    fn from(handle: String) -> Self {
        Self::Handle(handle)
    }
}
