//! Snapshot encoding.
//!
//! The persisted layout is a JSON record:
//!
//! ```json
//! {
//!   "items": [{ "id": 1, "title": "Shoe", "price": 50.0, "image": "x", "quantity": 2 }],
//!   "totalAmount": 100.0,
//!   "totalQuantity": 2
//! }
//! ```
//!
//! Field names and shapes are part of the restore contract and must not
//! change without versioning the payload. Decoding always re-checks the cart
//! invariants, so a snapshot that parses but does not reconcile is rejected.
//! A stored `totalAmount` within half a cent of its line items (float drift
//! from a browser-written snapshot) is replaced by the exact line sum.

use cartwheel_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{CartState, InvariantViolation, LineItem};

/// Largest gap between a stored total and its line sum that counts as drift.
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Errors produced while encoding or decoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The bytes are not a valid snapshot record.
    #[error("snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The record parsed but its totals do not reconcile.
    #[error("snapshot is inconsistent: {0}")]
    Invariant(#[from] InvariantViolation),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord {
    items: Vec<SnapshotItem>,
    #[serde(with = "rust_decimal::serde::float")]
    total_amount: Decimal,
    total_quantity: u64,
}

#[derive(Serialize, Deserialize)]
struct SnapshotItem {
    id: ProductId,
    title: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    image: String,
    quantity: u32,
}

/// Serialize the full state.
///
/// Equal states always produce identical bytes.
///
/// # Errors
///
/// Returns [`SnapshotError::Decode`] if serialization fails.
pub fn encode(state: &CartState) -> Result<Vec<u8>, SnapshotError> {
    let record = SnapshotRecord {
        items: state
            .items()
            .iter()
            .map(|line| SnapshotItem {
                id: line.id.clone(),
                title: line.title.clone(),
                price: line.price,
                image: line.image.clone(),
                quantity: line.quantity,
            })
            .collect(),
        total_amount: state.total_amount(),
        total_quantity: state.total_quantity(),
    };

    Ok(serde_json::to_vec(&record)?)
}

/// Parse a snapshot and verify it.
///
/// # Errors
///
/// Returns [`SnapshotError::Decode`] for malformed bytes and
/// [`SnapshotError::Invariant`] for a record whose totals do not match its
/// line items.
pub fn decode(bytes: &[u8]) -> Result<CartState, SnapshotError> {
    let record: SnapshotRecord = serde_json::from_slice(bytes)?;

    let items = record
        .items
        .into_iter()
        .map(|item| LineItem {
            id: item.id,
            title: item.title,
            image: item.image,
            price: item.price,
            quantity: item.quantity,
        })
        .collect::<Vec<_>>();

    let total_amount = reconcile_amount(&items, record.total_amount);
    let state = CartState::from_parts(items, total_amount, record.total_quantity);
    state.check_invariants()?;
    Ok(state)
}

/// The exact line sum if `stored` is within [`AMOUNT_TOLERANCE`] of it,
/// otherwise `stored` unchanged for the invariant check to reject.
fn reconcile_amount(items: &[LineItem], stored: Decimal) -> Decimal {
    let sum = items.iter().try_fold(Decimal::ZERO, |sum, line| {
        line.checked_line_total()
            .and_then(|total| sum.checked_add(total))
    });

    match sum {
        Some(sum)
            if sum
                .checked_sub(stored)
                .is_some_and(|gap| gap.abs() < AMOUNT_TOLERANCE) =>
        {
            sum
        }
        _ => stored,
    }
}
