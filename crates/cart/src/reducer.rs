//! Pure cart transitions.
//!
//! Every function here takes the current state by reference and returns the
//! next one. Nothing in this module performs I/O; persistence and
//! publication live in [`crate::store`].

use cartwheel_core::{Product, ProductId};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::state::{CartState, LineItem};

/// A caller contract breach on a cart operation.
///
/// These are programming errors rather than runtime conditions; the state is
/// left untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The product passed to `add_item` had no id.
    #[error("product id is required")]
    MissingProductId,

    /// The product passed to `add_item` had a negative price.
    #[error("product {id} has negative price {price}")]
    NegativePrice { id: ProductId, price: Decimal },

    /// The line quantity would not fit in a `u32`.
    #[error("quantity for product {id} is out of range")]
    QuantityOverflow { id: ProductId },

    /// The cart amount would not fit in a `Decimal`.
    #[error("amount for product {id} is out of range")]
    AmountOverflow { id: ProductId },
}

/// Product fields consumed by `add_item`.
///
/// Deserializes from a catalog record; any other fields (rating,
/// description, category, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductCandidate {
    #[serde(default)]
    pub id: Option<ProductId>,
    #[serde(default)]
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
}

impl From<&Product> for ProductCandidate {
    fn from(product: &Product) -> Self {
        Self {
            id: Some(product.id.clone()),
            title: product.title.clone(),
            price: product.price,
            image: product.image.clone(),
        }
    }
}

/// A cart operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    AddItem(ProductCandidate),
    RemoveItem(ProductId),
    SetQuantity { id: ProductId, quantity: i64 },
    Clear,
}

/// Apply `action` to `state`.
///
/// # Errors
///
/// Returns a [`CartError`] when the action breaks its precondition.
pub fn reduce(state: &CartState, action: CartAction) -> Result<CartState, CartError> {
    match action {
        CartAction::AddItem(candidate) => add_item(state, candidate),
        CartAction::RemoveItem(id) => Ok(remove_item(state, &id)),
        CartAction::SetQuantity { id, quantity } => set_quantity(state, &id, quantity),
        CartAction::Clear => Ok(clear()),
    }
}

/// Add one unit of `candidate`.
///
/// An existing line keeps its locked price and metadata and gains one unit.
/// The amount grows by the stored unit price, so a catalog price change
/// after the first add never desynchronizes the total.
///
/// # Errors
///
/// [`CartError::MissingProductId`], [`CartError::NegativePrice`],
/// [`CartError::QuantityOverflow`] when the line is already at `u32::MAX`,
/// or [`CartError::AmountOverflow`] when the total would not fit.
pub fn add_item(state: &CartState, candidate: ProductCandidate) -> Result<CartState, CartError> {
    let id = candidate.id.ok_or(CartError::MissingProductId)?;
    if candidate.price < Decimal::ZERO {
        return Err(CartError::NegativePrice {
            id,
            price: candidate.price,
        });
    }

    let unit_price = state.line(&id).map_or(candidate.price, |line| line.price);
    let total_amount = state
        .total_amount
        .checked_add(unit_price)
        .ok_or_else(|| CartError::AmountOverflow { id: id.clone() })?;

    let mut next = state.clone();
    if let Some(line) = next.line_mut(&id) {
        line.quantity = line
            .quantity
            .checked_add(1)
            .ok_or_else(|| CartError::QuantityOverflow { id: id.clone() })?;
    } else {
        next.items.push(LineItem {
            id,
            title: candidate.title,
            image: candidate.image,
            price: candidate.price,
            quantity: 1,
        });
    }

    next.total_quantity += 1;
    next.total_amount = total_amount;
    Ok(next)
}

/// Drop the whole line for `id`. Unknown ids leave the state as it was.
#[must_use]
pub fn remove_item(state: &CartState, id: &ProductId) -> CartState {
    let mut next = state.clone();
    if let Some(pos) = next.items.iter().position(|line| &line.id == id) {
        let line = next.items.remove(pos);
        next.total_quantity -= u64::from(line.quantity);
        next.total_amount -= line.line_total();
    }
    next
}

/// Set the quantity of an existing line.
///
/// `quantity <= 0` removes the line. Unknown ids are left alone: only
/// [`add_item`] creates lines.
///
/// # Errors
///
/// [`CartError::QuantityOverflow`] when `quantity` exceeds `u32::MAX`,
/// [`CartError::AmountOverflow`] when the line or cart total would not fit.
pub fn set_quantity(
    state: &CartState,
    id: &ProductId,
    quantity: i64,
) -> Result<CartState, CartError> {
    if quantity <= 0 {
        return Ok(remove_item(state, id));
    }
    let quantity =
        u32::try_from(quantity).map_err(|_| CartError::QuantityOverflow { id: id.clone() })?;

    let Some(line) = state.line(id) else {
        return Ok(state.clone());
    };

    let overflow = || CartError::AmountOverflow { id: id.clone() };
    let line_total = line
        .price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(overflow)?;
    let total_amount = state
        .total_amount
        .checked_sub(line.line_total())
        .and_then(|rest| rest.checked_add(line_total))
        .ok_or_else(overflow)?;
    let delta = i64::from(quantity) - i64::from(line.quantity);

    let mut next = state.clone();
    if let Some(line) = next.line_mut(id) {
        line.quantity = quantity;
    }
    next.total_quantity = next.total_quantity.saturating_add_signed(delta);
    next.total_amount = total_amount;
    Ok(next)
}

/// The empty cart.
#[must_use]
pub fn clear() -> CartState {
    CartState::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, price: i64) -> ProductCandidate {
        ProductCandidate {
            id: Some(ProductId::Numeric(id)),
            title: format!("Product {id}"),
            price: Decimal::from(price),
            image: format!("https://img.example/{id}.jpg"),
        }
    }

    fn shoe() -> ProductCandidate {
        ProductCandidate {
            id: Some(ProductId::Numeric(1)),
            title: "Shoe".to_string(),
            price: Decimal::from(50),
            image: "x".to_string(),
        }
    }

    fn assert_consistent(state: &CartState) {
        assert_eq!(state.check_invariants(), Ok(()), "state: {state:?}");
        assert!(state.items().iter().all(|line| line.quantity > 0));
    }

    #[test]
    fn test_add_twice_then_set_quantity() {
        let one = ProductId::Numeric(1);

        // A: first add
        let a = add_item(&CartState::default(), shoe()).unwrap();
        assert_eq!(a.items().len(), 1);
        assert_eq!(a.total_quantity(), 1);
        assert_eq!(a.total_amount(), Decimal::from(50));

        // B: same id again
        let b = add_item(&a, shoe()).unwrap();
        assert_eq!(b.items().len(), 1);
        assert_eq!(b.line(&one).map(|l| l.quantity), Some(2));
        assert_eq!(b.total_quantity(), 2);
        assert_eq!(b.total_amount(), Decimal::from(100));

        // C: set quantity
        let c = set_quantity(&b, &one, 5).unwrap();
        assert_eq!(c.line(&one).map(|l| l.quantity), Some(5));
        assert_eq!(c.total_quantity(), 5);
        assert_eq!(c.total_amount(), Decimal::from(250));

        // D: set to zero removes
        let d = set_quantity(&c, &one, 0).unwrap();
        assert!(d.is_empty());
        assert_eq!(d.total_quantity(), 0);
        assert_eq!(d.total_amount(), Decimal::ZERO);

        for state in [&a, &b, &c, &d] {
            assert_consistent(state);
        }
    }

    #[test]
    fn test_remove_unknown_id_on_empty_cart() {
        let empty = CartState::default();
        let next = remove_item(&empty, &ProductId::Numeric(999));
        assert_eq!(next, empty);
    }

    #[test]
    fn test_add_then_remove_restores_prior_state() {
        let before = add_item(&CartState::default(), candidate(2, 15)).unwrap();
        let added = add_item(&before, candidate(7, 30)).unwrap();
        let removed = remove_item(&added, &ProductId::Numeric(7));
        assert_eq!(removed, before);
    }

    #[test]
    fn test_add_keeps_locked_price_and_metadata() {
        let first = add_item(&CartState::default(), candidate(3, 20)).unwrap();

        let mut repriced = candidate(3, 35);
        repriced.title = "Renamed".to_string();
        let second = add_item(&first, repriced).unwrap();

        let line = second.line(&ProductId::Numeric(3)).unwrap();
        assert_eq!(line.price, Decimal::from(20));
        assert_eq!(line.title, "Product 3");
        assert_eq!(line.quantity, 2);
        assert_eq!(second.total_amount(), Decimal::from(40));
        assert_consistent(&second);
    }

    #[test]
    fn test_add_without_id_is_rejected() {
        let mut input = candidate(1, 10);
        input.id = None;
        let state = CartState::default();
        assert_eq!(add_item(&state, input), Err(CartError::MissingProductId));
    }

    #[test]
    fn test_add_negative_price_is_rejected() {
        let result = add_item(&CartState::default(), candidate(1, -1));
        assert!(matches!(result, Err(CartError::NegativePrice { .. })));
    }

    #[test]
    fn test_add_free_product() {
        let state = add_item(&CartState::default(), candidate(1, 0)).unwrap();
        assert_eq!(state.total_quantity(), 1);
        assert_eq!(state.total_amount(), Decimal::ZERO);
        assert_consistent(&state);
    }

    #[test]
    fn test_set_quantity_on_absent_id_is_noop() {
        let state = add_item(&CartState::default(), candidate(1, 10)).unwrap();
        let next = set_quantity(&state, &ProductId::Numeric(2), 4).unwrap();
        assert_eq!(next, state);
    }

    #[test]
    fn test_set_negative_quantity_removes() {
        let state = add_item(&CartState::default(), candidate(1, 10)).unwrap();
        let next = set_quantity(&state, &ProductId::Numeric(1), -3).unwrap();
        assert!(next.is_empty());
        assert_consistent(&next);
    }

    #[test]
    fn test_set_quantity_decreases_totals() {
        let mut state = CartState::default();
        for _ in 0..4 {
            state = add_item(&state, candidate(1, 12)).unwrap();
        }
        let next = set_quantity(&state, &ProductId::Numeric(1), 1).unwrap();
        assert_eq!(next.total_quantity(), 1);
        assert_eq!(next.total_amount(), Decimal::from(12));
        assert_consistent(&next);
    }

    #[test]
    fn test_set_quantity_out_of_range() {
        let state = add_item(&CartState::default(), candidate(1, 10)).unwrap();
        let result = set_quantity(&state, &ProductId::Numeric(1), i64::from(u32::MAX) + 1);
        assert!(matches!(result, Err(CartError::QuantityOverflow { .. })));
    }

    #[test]
    fn test_set_quantity_amount_overflow_leaves_state() {
        let mut pricey = candidate(1, 0);
        pricey.price = Decimal::from(100_000_000_000_000_000_000_i128);
        let state = add_item(&CartState::default(), pricey).unwrap();

        let result = set_quantity(&state, &ProductId::Numeric(1), i64::from(u32::MAX));
        assert_eq!(
            result,
            Err(CartError::AmountOverflow {
                id: ProductId::Numeric(1)
            })
        );
        assert_consistent(&state);
    }

    #[test]
    fn test_add_amount_overflow_is_rejected() {
        let mut max = candidate(2, 0);
        max.price = Decimal::MAX;
        let state = add_item(&CartState::default(), max.clone()).unwrap();

        assert!(matches!(
            add_item(&state, max),
            Err(CartError::AmountOverflow { .. })
        ));
        assert!(matches!(
            reduce(&state, CartAction::AddItem(candidate(3, 1))),
            Err(CartError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let state = add_item(&CartState::default(), candidate(1, 10)).unwrap();
        let once = reduce(&state, CartAction::Clear).unwrap();
        let twice = reduce(&once, CartAction::Clear).unwrap();
        assert_eq!(once, CartState::default());
        assert_eq!(twice, once);
    }

    #[test]
    fn test_decimal_prices_stay_exact() {
        let mut state = CartState::default();
        let mut backpack = candidate(1, 0);
        backpack.price = Decimal::new(10995, 2);
        let mut shirt = candidate(2, 0);
        shirt.price = Decimal::new(223, 1);

        state = add_item(&state, backpack.clone()).unwrap();
        state = add_item(&state, shirt).unwrap();
        state = add_item(&state, backpack).unwrap();
        state = set_quantity(&state, &ProductId::Numeric(2), 3).unwrap();

        assert_eq!(state.total_amount(), Decimal::new(28680, 2));
        assert_consistent(&state);
    }

    #[test]
    fn test_invariants_hold_over_mixed_sequence() {
        let actions = [
            CartAction::AddItem(candidate(1, 50)),
            CartAction::AddItem(candidate(2, 5)),
            CartAction::AddItem(candidate(1, 50)),
            CartAction::SetQuantity {
                id: ProductId::Numeric(2),
                quantity: 7,
            },
            CartAction::RemoveItem(ProductId::Numeric(42)),
            CartAction::AddItem(candidate(3, 19)),
            CartAction::SetQuantity {
                id: ProductId::Numeric(1),
                quantity: 0,
            },
            CartAction::RemoveItem(ProductId::Numeric(3)),
            CartAction::AddItem(candidate(4, 1)),
            CartAction::Clear,
            CartAction::AddItem(candidate(5, 8)),
        ];

        let mut state = CartState::default();
        for action in actions {
            state = reduce(&state, action).unwrap();
            assert_consistent(&state);
        }
        assert_eq!(state.total_quantity(), 1);
        assert_eq!(state.total_amount(), Decimal::from(8));
    }

    #[test]
    fn test_candidate_ignores_extra_catalog_fields() {
        let json = r#"{
            "id": 9,
            "title": "Jacket",
            "price": 55.99,
            "description": "Warm",
            "category": "men's clothing",
            "image": "https://img.example/9.jpg",
            "rating": { "rate": 4.7, "count": 500 }
        }"#;
        let candidate: ProductCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.id, Some(ProductId::Numeric(9)));
        assert_eq!(candidate.price, Decimal::new(5599, 2));
    }

    #[test]
    fn test_candidate_without_id_deserializes() {
        let candidate: ProductCandidate =
            serde_json::from_str(r#"{ "title": "Mystery", "price": 3 }"#).unwrap();
        assert_eq!(candidate.id, None);
    }
}
