//! Same-anchor pair arbitrage.
//!
//! Two markets anchored on the same value give two 2-leg bundles that settle
//! to exactly one unit of collateral (complement pairs: YES+YES and NO+NO;
//! same-direction pairs: YES of one plus NO of the other). Buying a bundle
//! below a dollar or selling one above it is riskless. Four directional
//! checks per pair, the same threshold and cooldown protocol as the other
//! evaluators. The whole evaluator is optional and the range/triangle paths
//! never depend on it.

use crate::config::EngineConfig;
use crate::domain::{profit_bps, LegSnapshot, Opportunity, OpportunityContext, Strategy};
use crate::engine::state::{BinaryPair, GroupState, PairLeg};
use rust_decimal::Decimal;

/// A passing pair evaluation
#[derive(Debug, Clone, Copy)]
pub struct PairCandidate {
    pub pair: usize,
    pub legs: (PairLeg, PairLeg),
    pub strategy: Strategy,
    pub profit_abs: Decimal,
    pub profit_bps: Decimal,
    /// Cost (buy) or revenue (sell) of the bundle
    pub gross: Decimal,
}

/// The settlement value of every pair bundle
const BUNDLE_PAYOUT: Decimal = Decimal::ONE;

/// Check all four directions of one pair.
pub fn evaluate_pair(
    config: &EngineConfig,
    state: &GroupState,
    index: usize,
) -> Vec<PairCandidate> {
    let Some(pair) = state.pairs.get(index) else {
        return Vec::new();
    };
    let min_bps = Decimal::from(config.min_profit_bps);
    let mut candidates = Vec::new();

    for (a, b) in pair.bundles() {
        let quote_a = pair.quote(a);
        let quote_b = pair.quote(b);
        if !quote_a.is_executable() || !quote_b.is_executable() {
            continue;
        }

        if let (Some(ask_a), Some(ask_b)) = (quote_a.ask, quote_b.ask) {
            let cost = ask_a + ask_b;
            let profit = BUNDLE_PAYOUT - cost;
            let bps = profit_bps(profit, cost);
            if profit > Decimal::ZERO && bps >= min_bps && profit >= config.min_profit_abs {
                candidates.push(PairCandidate {
                    pair: index,
                    legs: (a, b),
                    strategy: Strategy::PairBuy,
                    profit_abs: profit,
                    profit_bps: bps,
                    gross: cost,
                });
            }
        }

        if let (Some(bid_a), Some(bid_b)) = (quote_a.bid, quote_b.bid) {
            let revenue = bid_a + bid_b;
            let profit = revenue - BUNDLE_PAYOUT;
            let bps = profit_bps(profit, BUNDLE_PAYOUT);
            if profit > Decimal::ZERO && bps >= min_bps && profit >= config.min_profit_abs {
                candidates.push(PairCandidate {
                    pair: index,
                    legs: (a, b),
                    strategy: Strategy::PairSell,
                    profit_abs: profit,
                    profit_bps: bps,
                    gross: revenue,
                });
            }
        }
    }
    candidates
}

/// Deduplication key: both tokens plus the direction.
pub fn emit_key(state: &GroupState, candidate: &PairCandidate) -> String {
    let pair = &state.pairs[candidate.pair];
    format!(
        "{}:{}:{}",
        leg_token(pair, candidate.legs.0),
        leg_token(pair, candidate.legs.1),
        candidate.strategy
    )
}

/// Build the full opportunity record for a candidate that cleared cooldown.
pub fn materialize(state: &GroupState, candidate: &PairCandidate, ts_ms: i64) -> Opportunity {
    let pair = &state.pairs[candidate.pair];
    Opportunity {
        strategy: candidate.strategy,
        group_key: state.group.group_key.clone(),
        profit_abs: candidate.profit_abs,
        profit_bps: candidate.profit_bps,
        timestamp_ms: ts_ms,
        context: OpportunityContext::Pair {
            first: leg_snapshot(pair, candidate.legs.0),
            second: leg_snapshot(pair, candidate.legs.1),
            payout: BUNDLE_PAYOUT,
            gross: candidate.gross,
        },
    }
}

fn leg_token(pair: &BinaryPair, leg: PairLeg) -> String {
    let (market, yes) = pair.leg_market(leg);
    if yes {
        market.yes_token_id.clone()
    } else {
        market.no_token_id.clone()
    }
}

fn leg_snapshot(pair: &BinaryPair, leg: PairLeg) -> LegSnapshot {
    let (market, yes) = pair.leg_market(leg);
    LegSnapshot {
        market_id: market.market_id.clone(),
        token_id: if yes {
            market.yes_token_id.clone()
        } else {
            market.no_token_id.clone()
        },
        label: market.label.clone(),
        quote: *pair.quote(leg),
    }
}
