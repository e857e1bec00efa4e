//! Range decomposition arbitrage.
//!
//! A lower parent replicated by a run of brackets plus an upper parent can
//! be traded against its replica in both directions:
//!
//! - unbundling: sell the lower parent, buy the bracket run and the upper
//!   parent;
//! - bundling: buy the lower parent, sell the run and the upper parent.
//!
//! The evaluation is a quick profit-only pass over prefix sums; the
//! opportunity record is materialised only for a candidate that survives
//! every check.

use crate::config::EngineConfig;
use crate::domain::{profit_bps, Opportunity, OpportunityContext, Strategy};
use crate::engine::state::GroupState;
use rust_decimal::Decimal;

/// A passing combination, cheap to carry until the cooldown check
#[derive(Debug, Clone, Copy)]
pub struct RangeCandidate {
    pub lower: usize,
    pub upper: usize,
    /// Covered children, `start..end`
    pub window_start: usize,
    pub window_end: usize,
    pub strategy: Strategy,
    pub profit_abs: Decimal,
    pub profit_bps: Decimal,
    /// Cost (unbundling) or revenue (bundling) of the synthetic side
    pub gross: Decimal,
}

/// Evaluate every window rooted at one lower parent and return the best
/// passing candidate, if any.
pub fn evaluate_parent_lower(
    config: &EngineConfig,
    state: &GroupState,
    lower: usize,
) -> Option<RangeCandidate> {
    let cov_l = state.group.coverages.get(lower).copied().flatten()?;
    if cov_l.is_empty() {
        return None;
    }
    let lower_quote = state.parent_quotes[lower];
    if !lower_quote.is_executable() {
        return None;
    }

    let min_bps = Decimal::from(config.min_profit_bps);
    let mut best: Option<RangeCandidate> = None;

    for upper in (lower + 1)..state.group.parents.len() {
        let Some(cov_u) = state.group.coverages[upper] else {
            continue;
        };
        let window_end = cov_u.start;
        if window_end <= cov_l.start || window_end > cov_l.end {
            continue;
        }
        let upper_quote = state.parent_quotes[upper];
        if !upper_quote.is_executable() {
            continue;
        }
        if !state.window_fully_quoted(cov_l.start, window_end) {
            continue;
        }

        // Unbundling: collect the lower parent's bid, pay for the replica.
        if let (Some(children_ask), Some(lower_bid), Some(upper_ask)) = (
            state.window_ask_sum(cov_l.start, window_end),
            lower_quote.bid,
            upper_quote.ask,
        ) {
            let total_cost = children_ask + upper_ask;
            let profit = lower_bid - total_cost;
            let bps = profit_bps(profit, total_cost);
            if profit > Decimal::ZERO && bps >= min_bps && profit >= config.min_profit_abs {
                consider(
                    &mut best,
                    RangeCandidate {
                        lower,
                        upper,
                        window_start: cov_l.start,
                        window_end,
                        strategy: Strategy::SellParentBuyChildren,
                        profit_abs: profit,
                        profit_bps: bps,
                        gross: total_cost,
                    },
                );
            }
        }

        // Bundling: buy the lower parent, sell the replica.
        if let (Some(children_bid), Some(lower_ask), Some(upper_bid)) = (
            state.window_bid_sum(cov_l.start, window_end),
            lower_quote.ask,
            upper_quote.bid,
        ) {
            let total_revenue = children_bid + upper_bid;
            let profit = total_revenue - lower_ask;
            let bps = profit_bps(profit, lower_ask);
            if profit > Decimal::ZERO && bps >= min_bps && profit >= config.min_profit_abs {
                consider(
                    &mut best,
                    RangeCandidate {
                        lower,
                        upper,
                        window_start: cov_l.start,
                        window_end,
                        strategy: Strategy::BuyParentSellChildren,
                        profit_abs: profit,
                        profit_bps: bps,
                        gross: total_revenue,
                    },
                );
            }
        }
    }
    best
}

fn consider(best: &mut Option<RangeCandidate>, candidate: RangeCandidate) {
    if best.map_or(true, |b| candidate.profit_abs > b.profit_abs) {
        *best = Some(candidate);
    }
}

/// Deduplication key: the two parents plus the direction.
pub fn emit_key(state: &GroupState, candidate: &RangeCandidate) -> String {
    format!(
        "{}:{}:{}",
        state.group.parents[candidate.lower].market_id,
        state.group.parents[candidate.upper].market_id,
        candidate.strategy
    )
}

/// Build the full opportunity record for a candidate that cleared cooldown.
pub fn materialize(state: &GroupState, candidate: &RangeCandidate, ts_ms: i64) -> Opportunity {
    let children = (candidate.window_start..candidate.window_end)
        .map(|i| state.child_leg(i))
        .collect();
    Opportunity {
        strategy: candidate.strategy,
        group_key: state.group.group_key.clone(),
        profit_abs: candidate.profit_abs,
        profit_bps: candidate.profit_bps,
        timestamp_ms: ts_ms,
        context: OpportunityContext::Range {
            parent_lower: state.parent_leg(candidate.lower),
            parent_upper: state.parent_leg(candidate.upper),
            children,
            window: (candidate.window_start, candidate.window_end - 1),
            gross: candidate.gross,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketDescriptor, MarketKind, MarketRole, TopOfBookUpdate};
    use crate::structure::{compute_coverage, RangeGroup};
    use rust_decimal_macros::dec;

    fn descriptor(id: &str, kind: MarketKind, role: MarketRole) -> MarketDescriptor {
        MarketDescriptor {
            market_id: id.into(),
            slug: format!("slug-{id}"),
            question: String::new(),
            yes_token_id: format!("{id}-yes"),
            no_token_id: format!("{id}-no"),
            kind,
            role,
            label: kind.label(),
            symbol: "btc".into(),
            settlement_key: "t".into(),
            event_slug: None,
            neg_risk: false,
        }
    }

    fn ladder_state() -> GroupState {
        let children = vec![
            descriptor("c1", MarketKind::Range { lower: dec!(80), upper: dec!(82) }, MarketRole::Child),
            descriptor("c2", MarketKind::Range { lower: dec!(82), upper: dec!(84) }, MarketRole::Child),
            descriptor("c3", MarketKind::Range { lower: dec!(84), upper: dec!(86) }, MarketRole::Child),
        ];
        let parents = vec![
            descriptor("p80", MarketKind::Above { lower: dec!(80) }, MarketRole::Parent),
            descriptor("p86", MarketKind::Above { lower: dec!(86) }, MarketRole::Parent),
        ];
        let coverages = parents
            .iter()
            .map(|p| compute_coverage(&children, p.lower().unwrap()))
            .collect();
        GroupState::new(
            RangeGroup {
                group_key: "btc-t".into(),
                symbol: "btc".into(),
                settlement_key: "t".into(),
                children,
                parents,
                coverages,
                belows: Vec::new(),
                step: Some(dec!(2)),
                unmatched: Vec::new(),
            },
            false,
        )
    }

    fn update(asset: &str, ts: i64, bid: Decimal, ask: Decimal) -> TopOfBookUpdate {
        TopOfBookUpdate {
            asset_id: asset.into(),
            market_id: None,
            market_slug: None,
            best_bid: bid,
            best_ask: ask,
            best_bid_size: None,
            best_ask_size: None,
            timestamp_ms: ts,
        }
    }

    fn quote_ladder(state: &mut GroupState) {
        for (i, asset) in ["c1-yes", "c2-yes", "c3-yes"].iter().enumerate() {
            state.set_child_quote(i, &update(asset, 1, dec!(0.28), dec!(0.30)));
        }
        state.set_parent_quote(1, &update("p86-yes", 1, dec!(0.15), dec!(0.20)));
    }

    #[test]
    fn unprofitable_replica_yields_nothing() {
        let mut state = ladder_state();
        quote_ladder(&mut state);
        // Selling at 0.95 cannot beat a 1.10 replica
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(0.95), dec!(1.00)));
        assert!(evaluate_parent_lower(&EngineConfig::default(), &state, 0).is_none());
    }

    #[test]
    fn unbundling_wins_when_bid_clears_replica_cost() {
        let mut state = ladder_state();
        quote_ladder(&mut state);
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(1.15), dec!(1.20)));
        let best = evaluate_parent_lower(&EngineConfig::default(), &state, 0).unwrap();
        assert_eq!(best.strategy, Strategy::SellParentBuyChildren);
        assert_eq!(best.profit_abs, dec!(0.05));
        assert_eq!(best.gross, dec!(1.10));
        // 10_000 * 0.05 / 1.10 = 454.5..
        assert!(best.profit_bps > dec!(454) && best.profit_bps < dec!(455));
        assert_eq!((best.window_start, best.window_end), (0, 3));

        let opp = materialize(&state, &best, 99);
        assert_eq!(opp.leg_count(), 5);
        assert_eq!(opp.timestamp_ms, 99);
        assert_eq!(emit_key(&state, &best), "p80:p86:SELL_PARENT_BUY_CHILDREN");
    }

    #[test]
    fn bundling_wins_when_replica_bids_exceed_parent_ask() {
        let mut state = ladder_state();
        for (i, asset) in ["c1-yes", "c2-yes", "c3-yes"].iter().enumerate() {
            state.set_child_quote(i, &update(asset, 1, dec!(0.33), dec!(0.35)));
        }
        state.set_parent_quote(1, &update("p86-yes", 1, dec!(0.18), dec!(0.20)));
        // Replica sells for 0.99 + 0.18 = 1.17; parent costs 1.10
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(1.05), dec!(1.10)));
        let best = evaluate_parent_lower(&EngineConfig::default(), &state, 0).unwrap();
        assert_eq!(best.strategy, Strategy::BuyParentSellChildren);
        assert_eq!(best.profit_abs, dec!(0.07));
        // Basis is the lower parent's ask
        assert!(best.profit_bps > dec!(636) && best.profit_bps < dec!(637));
    }

    #[test]
    fn missing_child_quote_blocks_the_window() {
        let mut state = ladder_state();
        quote_ladder(&mut state);
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(1.15), dec!(1.20)));
        // Drop the middle bracket's ask
        state.set_child_quote(1, &update("c2-yes", 3, dec!(0.28), dec!(0)));
        assert!(evaluate_parent_lower(&EngineConfig::default(), &state, 0).is_none());
    }

    #[test]
    fn zeroed_upper_parent_blocks_both_directions() {
        let mut state = ladder_state();
        quote_ladder(&mut state);
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(1.15), dec!(1.20)));
        state.set_parent_quote(1, &update("p86-yes", 3, dec!(0.15), dec!(0)));
        assert!(evaluate_parent_lower(&EngineConfig::default(), &state, 0).is_none());
    }

    #[test]
    fn profit_below_bps_threshold_is_dropped() {
        let mut state = ladder_state();
        quote_ladder(&mut state);
        // 1.1005 bid over a 1.10 replica: 0.0005 profit = ~4.5 bps < 5
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(1.1005), dec!(1.15)));
        assert!(evaluate_parent_lower(&EngineConfig::default(), &state, 0).is_none());

        let relaxed = EngineConfig {
            min_profit_bps: 0,
            ..EngineConfig::default()
        };
        assert!(evaluate_parent_lower(&relaxed, &state, 0).is_some());
    }

    #[test]
    fn absolute_profit_floor_applies() {
        let mut state = ladder_state();
        quote_ladder(&mut state);
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(1.15), dec!(1.20)));
        let strict = EngineConfig {
            min_profit_abs: dec!(0.10),
            ..EngineConfig::default()
        };
        assert!(evaluate_parent_lower(&strict, &state, 0).is_none());
    }

    #[test]
    fn topmost_parent_has_no_window_of_its_own() {
        let mut state = ladder_state();
        quote_ladder(&mut state);
        state.set_parent_quote(0, &update("p80-yes", 2, dec!(1.15), dec!(1.20)));
        assert!(evaluate_parent_lower(&EngineConfig::default(), &state, 1).is_none());
    }
}
