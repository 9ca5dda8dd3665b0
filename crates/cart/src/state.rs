//! Cart state model.
//!
//! `CartState` fields are private: the only way to change a cart is through
//! the reducer, which keeps `total_quantity` and `total_amount` in step with
//! the line items.

use std::collections::HashSet;

use cartwheel_core::ProductId;
use rust_decimal::Decimal;
use thiserror::Error;

/// One product held in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    /// Product id, unique within the cart.
    pub id: ProductId,
    /// Display title, stored as given.
    pub title: String,
    /// Image reference, stored as given.
    pub image: String,
    /// Unit price locked at the time the product was first added.
    pub price: Decimal,
    /// Always at least 1.
    pub quantity: u32,
}

impl LineItem {
    /// `price * quantity`, or `None` if it does not fit in a `Decimal`.
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }

    /// `price * quantity` for this line.
    ///
    /// Saturates at `Decimal::MAX`; lines in a reconciled cart never do.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.checked_line_total().unwrap_or(Decimal::MAX)
    }
}

/// The cart aggregate: line items plus derived totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    pub(crate) items: Vec<LineItem>,
    pub(crate) total_amount: Decimal,
    pub(crate) total_quantity: u64,
}

impl Default for CartState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            total_quantity: 0,
        }
    }
}

impl CartState {
    /// Build a state from raw parts without checking it.
    ///
    /// Callers that accept external data must run [`Self::check_invariants`].
    pub(crate) const fn from_parts(
        items: Vec<LineItem>,
        total_amount: Decimal,
        total_quantity: u64,
    ) -> Self {
        Self {
            items,
            total_amount,
            total_quantity,
        }
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Sum of all line quantities.
    #[must_use]
    pub const fn total_quantity(&self) -> u64 {
        self.total_quantity
    }

    /// Sum of all `quantity * price`.
    #[must_use]
    pub const fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    /// `true` when the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by product id.
    #[must_use]
    pub fn line(&self, id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|line| &line.id == id)
    }

    pub(crate) fn line_mut(&mut self, id: &ProductId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|line| &line.id == id)
    }

    /// Verify that the totals reconcile with the line items.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = HashSet::with_capacity(self.items.len());
        let mut quantity: u64 = 0;
        let mut amount = Decimal::ZERO;

        for line in &self.items {
            if !seen.insert(&line.id) {
                return Err(InvariantViolation::DuplicateLine(line.id.clone()));
            }
            if line.quantity == 0 {
                return Err(InvariantViolation::EmptyLine(line.id.clone()));
            }
            if line.price.is_sign_negative() && !line.price.is_zero() {
                return Err(InvariantViolation::NegativePrice(line.id.clone()));
            }
            quantity += u64::from(line.quantity);
            amount = line
                .checked_line_total()
                .and_then(|total| amount.checked_add(total))
                .ok_or_else(|| InvariantViolation::AmountOverflow(line.id.clone()))?;
        }

        if quantity != self.total_quantity {
            return Err(InvariantViolation::QuantityMismatch {
                expected: quantity,
                actual: self.total_quantity,
            });
        }
        if amount != self.total_amount {
            return Err(InvariantViolation::AmountMismatch {
                expected: amount,
                actual: self.total_amount,
            });
        }

        Ok(())
    }
}

/// A way in which a `CartState` fails to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("line {0} appears more than once")]
    DuplicateLine(ProductId),
    #[error("line {0} has quantity 0")]
    EmptyLine(ProductId),
    #[error("line {0} has a negative price")]
    NegativePrice(ProductId),
    #[error("amount for line {0} does not fit in a decimal")]
    AmountOverflow(ProductId),
    #[error("total quantity is {actual}, line items sum to {expected}")]
    QuantityMismatch { expected: u64, actual: u64 },
    #[error("total amount is {actual}, line items sum to {expected}")]
    AmountMismatch { expected: Decimal, actual: Decimal },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, price: i64, quantity: u32) -> LineItem {
        LineItem {
            id: ProductId::Numeric(id),
            title: format!("Product {id}"),
            image: String::new(),
            price: Decimal::from(price),
            quantity,
        }
    }

    #[test]
    fn test_empty_state_is_valid() {
        let state = CartState::default();
        assert!(state.is_empty());
        assert_eq!(state.total_quantity(), 0);
        assert_eq!(state.total_amount(), Decimal::ZERO);
        assert_eq!(state.check_invariants(), Ok(()));
    }

    #[test]
    fn test_consistent_state_is_valid() {
        let state =
            CartState::from_parts(vec![line(1, 50, 2), line(2, 10, 3)], Decimal::from(130), 5);
        assert_eq!(state.check_invariants(), Ok(()));
        assert_eq!(state.line(&ProductId::Numeric(2)).map(|l| l.quantity), Some(3));
    }

    #[test]
    fn test_quantity_mismatch() {
        let state = CartState::from_parts(vec![line(1, 50, 2)], Decimal::from(100), 3);
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::QuantityMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_amount_mismatch() {
        let state = CartState::from_parts(vec![line(1, 50, 2)], Decimal::from(90), 2);
        assert!(matches!(
            state.check_invariants(),
            Err(InvariantViolation::AmountMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_quantity_line() {
        let state = CartState::from_parts(vec![line(1, 50, 0)], Decimal::ZERO, 0);
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::EmptyLine(ProductId::Numeric(1)))
        );
    }

    #[test]
    fn test_duplicate_line() {
        let state =
            CartState::from_parts(vec![line(1, 5, 1), line(1, 5, 1)], Decimal::from(10), 2);
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::DuplicateLine(ProductId::Numeric(1)))
        );
    }

    #[test]
    fn test_amount_overflow() {
        let mut huge = line(1, 0, u32::MAX);
        huge.price = Decimal::MAX;
        let state = CartState::from_parts(vec![huge], Decimal::MAX, u64::from(u32::MAX));
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::AmountOverflow(ProductId::Numeric(1)))
        );
    }

    #[test]
    fn test_negative_price() {
        let state = CartState::from_parts(vec![line(4, -5, 1)], Decimal::from(-5), 1);
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::NegativePrice(ProductId::Numeric(4)))
        );
    }
}
