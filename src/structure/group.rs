//! Ladder group model.
//!
//! Markets sharing `(symbol, settlement-time)` form a group: a sorted ladder
//! of `range` children, the `above` parents anchored on the ladder's
//! boundaries, and whatever could not be placed. Cross-references are integer
//! indices into the dense arrays; nothing holds pointers across groups.

use crate::domain::MarketDescriptor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A parent's footprint on the child ladder.
///
/// `start` is the anchor position in `0..=N`: the index of the child whose
/// lower bound equals the parent's, or one past the child whose upper bound
/// does. `start..end` is the maximal contiguous run of covered children;
/// the run is empty (`start == end`) for a parent anchored at the top of the
/// ladder, which is still a legal upper leg of a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub start: usize,
    pub end: usize,
}

impl Coverage {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, child_index: usize) -> bool {
        child_index >= self.start && child_index < self.end
    }
}

/// A set of markets over the same quantity settling at the same time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeGroup {
    /// `"{symbol}-{settlement ISO}"`
    pub group_key: String,
    pub symbol: String,
    pub settlement_key: String,
    /// Range-kind markets, sorted by lower bound, non-overlapping
    pub children: Vec<MarketDescriptor>,
    /// Above-kind markets, sorted by lower bound
    pub parents: Vec<MarketDescriptor>,
    /// Per-parent footprint, parallel to `parents`
    pub coverages: Vec<Option<Coverage>>,
    /// Below-kind markets anchored on the ladder (complement-pair legs)
    pub belows: Vec<MarketDescriptor>,
    /// Smallest positive gap between consecutive child lowers
    pub step: Option<Decimal>,
    /// Markets that could not be placed on the ladder
    pub unmatched: Vec<MarketDescriptor>,
}

impl RangeGroup {
    /// Markets that can appear in a combination
    pub fn active_market_count(&self) -> usize {
        self.children.len() + self.parents.len() + self.belows.len()
    }
}

/// Compute a parent's coverage over a sorted, non-overlapping child ladder.
///
/// Returns `None` when the parent's lower bound is not a boundary of the
/// ladder (no child lower or upper equals it).
pub fn compute_coverage(children: &[MarketDescriptor], parent_lower: Decimal) -> Option<Coverage> {
    let n = children.len();
    if n == 0 {
        return None;
    }
    let start = children
        .iter()
        .position(|c| c.lower().is_some_and(|l| l >= parent_lower))
        .unwrap_or(n);

    let anchored_on_lower =
        start < n && children[start].lower().is_some_and(|l| l == parent_lower);
    let anchored_on_upper =
        start > 0 && children[start - 1].upper().is_some_and(|u| u == parent_lower);
    if !anchored_on_lower && !anchored_on_upper {
        return None;
    }

    let mut end = start;
    if anchored_on_lower {
        end = start + 1;
        while end < n
            && children[end].lower() == children[end - 1].upper()
        {
            end += 1;
        }
    }
    Some(Coverage { start, end })
}

/// Smallest positive gap between consecutive child lowers.
pub fn derive_step(children: &[MarketDescriptor]) -> Option<Decimal> {
    let mut step: Option<Decimal> = None;
    for pair in children.windows(2) {
        if let (Some(a), Some(b)) = (pair[0].lower(), pair[1].lower()) {
            let gap = b - a;
            if gap > Decimal::ZERO && step.map_or(true, |s| gap < s) {
                step = Some(gap);
            }
        }
    }
    step
}

/// Check the ladder invariant: sorted by lower, non-overlapping.
pub fn ladder_is_consistent(children: &[MarketDescriptor]) -> bool {
    children
        .windows(2)
        .all(|pair| match (pair[0].upper(), pair[1].lower()) {
            (Some(prev_upper), Some(next_lower)) => next_lower >= prev_upper,
            _ => false,
        })
}
