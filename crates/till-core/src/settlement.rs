//! # Settlement State Machine
//!
//! The lifecycle of one sale from cart to committed transaction, plus the
//! pure availability check run while the inventory rows are locked.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Draft ──► Locking ──► Validating ──► Committing ──► Committed         │
//! │     │          │            │               │                           │
//! │     │          │            └──► RejectedInsufficientStock              │
//! │     │          │                                                        │
//! │     └──────────┴────────────┴───────────────┴──► Aborted               │
//! │                                                                         │
//! │   Committed, RejectedInsufficientStock and Aborted are terminal.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, StockShortfall};
use crate::types::InventoryItem;

// =============================================================================
// Settlement State
// =============================================================================

/// Where a settlement is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementState {
    /// Request accepted and validated, identifier assigned.
    Draft,
    /// Acquiring row locks in ascending item-id order.
    Locking,
    /// All rows locked; comparing stock against requested quantities.
    Validating,
    /// Writing header, line items, deltas and customer aggregate.
    Committing,
    /// Unit of work committed.
    Committed,
    /// Stock could not cover the cart. Nothing was written.
    RejectedInsufficientStock,
    /// Infrastructure failure or identifier collision. Everything rolled back.
    Aborted,
}

impl SettlementState {
    /// Terminal states accept no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            SettlementState::Committed
                | SettlementState::RejectedInsufficientStock
                | SettlementState::Aborted
        )
    }

    /// Whether `self -> to` is an edge of the state machine.
    pub const fn can_advance_to(&self, to: SettlementState) -> bool {
        use SettlementState::*;

        match (self, to) {
            (Draft, Locking) => true,
            (Locking, Validating) => true,
            (Validating, Committing) => true,
            (Validating, RejectedInsufficientStock) => true,
            (Committing, Committed) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `to`, or returns [`CoreError::IllegalTransition`].
    ///
    /// ## Example
    /// ```rust
    /// use till_core::settlement::SettlementState;
    ///
    /// let mut state = SettlementState::Draft;
    /// state.advance(SettlementState::Locking).unwrap();
    /// assert!(state.advance(SettlementState::Committed).is_err());
    /// assert_eq!(state, SettlementState::Locking);
    /// ```
    pub fn advance(&mut self, to: SettlementState) -> CoreResult<()> {
        if !self.can_advance_to(to) {
            return Err(CoreError::IllegalTransition { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

// =============================================================================
// Availability Check
// =============================================================================

/// Stock on hand for one locked row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedStock {
    pub item_id: String,
    pub sku: String,
    pub quantity: i64,
}

impl From<&InventoryItem> for LockedStock {
    fn from(item: &InventoryItem) -> Self {
        LockedStock {
            item_id: item.id.clone(),
            sku: item.sku.clone(),
            quantity: item.quantity,
        }
    }
}

/// Sums requested quantity per item id.
///
/// Duplicate lines for the same item count together. The map is keyed by
/// item id so iteration is already in lock order. A sum past `i64::MAX`
/// saturates there; no row can cover it, so it surfaces as a shortfall.
pub fn aggregate_quantities<'a, I>(lines: I) -> BTreeMap<String, i64>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut totals = BTreeMap::new();
    for (item_id, quantity) in lines {
        let total = totals.entry(item_id.to_string()).or_insert(0_i64);
        *total = total.saturating_add(quantity);
    }
    totals
}

/// Compares locked stock against aggregated requests.
///
/// Returns every offending item, in item-id order, so the client can fix
/// the whole cart in one round trip.
///
/// ## Example
/// ```rust
/// use till_core::settlement::{check_availability, LockedStock};
///
/// let locked = vec![LockedStock { item_id: "x".into(), sku: "X".into(), quantity: 5 }];
/// let err = check_availability(&locked, [("x", 3), ("x", 3)]).unwrap_err();
/// assert_eq!(err[0].shortfall, 1);
/// ```
pub fn check_availability<'a, I>(locked: &[LockedStock], lines: I) -> Result<(), Vec<StockShortfall>>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let requested = aggregate_quantities(lines);

    let shortfalls: Vec<StockShortfall> = requested
        .iter()
        .filter_map(|(item_id, &wanted)| {
            let row = locked.iter().find(|row| &row.item_id == item_id)?;
            (row.quantity < wanted).then(|| StockShortfall::new(item_id.clone(), row.sku.clone(), row.quantity, wanted))
        })
        .collect();

    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(shortfalls)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(item_id: &str, quantity: i64) -> LockedStock {
        LockedStock {
            item_id: item_id.to_string(),
            sku: item_id.to_uppercase(),
            quantity,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = SettlementState::Draft;
        for next in [
            SettlementState::Locking,
            SettlementState::Validating,
            SettlementState::Committing,
            SettlementState::Committed,
        ] {
            state.advance(next).unwrap();
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_rejection_only_from_validating() {
        assert!(SettlementState::Validating.can_advance_to(SettlementState::RejectedInsufficientStock));
        assert!(!SettlementState::Locking.can_advance_to(SettlementState::RejectedInsufficientStock));
        assert!(!SettlementState::Committing.can_advance_to(SettlementState::RejectedInsufficientStock));
    }

    #[test]
    fn test_abort_from_any_non_terminal_state() {
        for from in [
            SettlementState::Draft,
            SettlementState::Locking,
            SettlementState::Validating,
            SettlementState::Committing,
        ] {
            assert!(from.can_advance_to(SettlementState::Aborted), "{from:?}");
        }
        assert!(!SettlementState::Committed.can_advance_to(SettlementState::Aborted));
        assert!(!SettlementState::Aborted.can_advance_to(SettlementState::Aborted));
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut state = SettlementState::Committed;
        let err = state.advance(SettlementState::Draft).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IllegalTransition {
                from: SettlementState::Committed,
                to: SettlementState::Draft
            }
        ));
        assert_eq!(state, SettlementState::Committed);
    }

    #[test]
    fn test_aggregate_sums_duplicate_lines() {
        let totals = aggregate_quantities([("b", 1), ("a", 2), ("b", 4)]);
        assert_eq!(totals.into_iter().collect::<Vec<_>>(), vec![("a".to_string(), 2), ("b".to_string(), 5)]);
    }

    #[test]
    fn test_huge_duplicate_lines_saturate_into_a_shortfall() {
        let totals = aggregate_quantities([("x", i64::MAX), ("x", i64::MAX)]);
        assert_eq!(totals["x"], i64::MAX);

        let locked = vec![stock("x", 5)];
        let shortfalls = check_availability(&locked, [("x", i64::MAX), ("x", i64::MAX)]).unwrap_err();
        assert_eq!(shortfalls[0].requested, i64::MAX);
        assert_eq!(shortfalls[0].shortfall, i64::MAX - 5);
    }

    #[test]
    fn test_exact_stock_is_available() {
        let locked = vec![stock("a", 2), stock("b", 1)];
        assert!(check_availability(&locked, [("a", 2), ("b", 1)]).is_ok());
    }

    #[test]
    fn test_reports_every_short_item() {
        let locked = vec![stock("a", 0), stock("b", 10), stock("c", 1)];
        let shortfalls = check_availability(&locked, [("c", 3), ("b", 1), ("a", 1)]).unwrap_err();

        assert_eq!(shortfalls.len(), 2);
        assert_eq!(shortfalls[0], StockShortfall::new("a", "A", 0, 1));
        assert_eq!(shortfalls[1], StockShortfall::new("c", "C", 1, 3));
    }
}
