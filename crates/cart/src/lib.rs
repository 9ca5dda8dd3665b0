//! Cartwheel Cart - the shopping cart state container.
//!
//! The cart owns one [`CartState`], keeps its totals reconciled with its line
//! items, and persists a full snapshot after every transition.
//!
//! # Architecture
//!
//! - [`state`] - `CartState` / `LineItem` and the invariant check
//! - [`reducer`] - pure `(state, action) -> state` transitions, no I/O
//! - [`snapshot`] - stable JSON encoding of a `CartState`
//! - [`persistence`] - the `SnapshotStore` adapter trait and its backends
//! - [`store`] - `CartStore`, which runs the reducer, publishes snapshots to
//!   subscribers and hands them to a background writer
//!
//! # Example
//!
//! ```rust,ignore
//! use cartwheel_cart::{CartStore, ProductCandidate, persistence::MemoryStore};
//!
//! let mut cart = CartStore::restore(MemoryStore::new(), "ecommerce-cart").await;
//! let state = cart.add_item(ProductCandidate::from(&product))?;
//! assert_eq!(state.total_quantity(), 1);
//! cart.shutdown().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod persistence;
pub mod reducer;
pub mod snapshot;
pub mod state;
pub mod store;

pub use persistence::{PersistenceError, SnapshotStore};
pub use reducer::{CartAction, CartError, ProductCandidate, reduce};
pub use snapshot::SnapshotError;
pub use state::{CartState, InvariantViolation, LineItem};
pub use store::{CartStore, PersistenceFailure};
