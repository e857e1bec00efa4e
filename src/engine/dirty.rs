//! Per-asset price dirty filter.
//!
//! The upstream feed replays snapshots and repeats unchanged books; the
//! filter admits only genuine deltas so the evaluators run on real changes.

use crate::domain::TopOfBookUpdate;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct LastSeen {
    bid: Decimal,
    ask: Decimal,
    timestamp_ms: i64,
}

/// Last-seen cache keyed by asset id
#[derive(Debug, Default)]
pub struct DirtyFilter {
    seen: HashMap<String, LastSeen>,
}

impl DirtyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or drop an update. Drops non-monotonic timestamps and unchanged
    /// (bid, ask) pairs; an unchanged drop still refreshes the timestamp.
    pub fn admit(&mut self, update: &TopOfBookUpdate) -> bool {
        match self.seen.get_mut(&update.asset_id) {
            Some(last) => {
                if update.timestamp_ms <= last.timestamp_ms {
                    return false;
                }
                if update.best_bid == last.bid && update.best_ask == last.ask {
                    last.timestamp_ms = update.timestamp_ms;
                    return false;
                }
                last.bid = update.best_bid;
                last.ask = update.best_ask;
                last.timestamp_ms = update.timestamp_ms;
                true
            }
            None => {
                self.seen.insert(
                    update.asset_id.clone(),
                    LastSeen {
                        bid: update.best_bid,
                        ask: update.best_ask,
                        timestamp_ms: update.timestamp_ms,
                    },
                );
                true
            }
        }
    }

    /// Last accepted-or-refreshed timestamp for an asset
    pub fn last_timestamp(&self, asset_id: &str) -> Option<i64> {
        self.seen.get(asset_id).map(|l| l.timestamp_ms)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
