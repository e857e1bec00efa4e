//! Triangle composition arbitrage.
//!
//! The lower parent's YES, the upper parent's NO and the NO of every bracket
//! between the two anchors settle to a constant `chain + 1` payout: exactly
//! one bracket-NO fails when the value lands inside the span, the parent
//! legs cover the outside. Buying the whole set below payout (or selling it
//! above) is a pure price arbitrage.

use crate::config::EngineConfig;
use crate::domain::{profit_bps, LegSnapshot, Opportunity, OpportunityContext, Strategy};
use crate::engine::state::{GroupState, Triangle};
use rust_decimal::Decimal;

/// A passing triangle evaluation
#[derive(Debug, Clone, Copy)]
pub struct TriangleCandidate {
    pub triangle: usize,
    pub strategy: Strategy,
    pub profit_abs: Decimal,
    pub profit_bps: Decimal,
    /// Sum of asks (BUY) or bids (SELL) across all legs
    pub gross: Decimal,
    pub payout: Decimal,
}

/// Evaluate one triangle in both enabled directions; returns the better
/// passing direction.
pub fn evaluate_triangle(
    config: &EngineConfig,
    state: &GroupState,
    index: usize,
) -> Option<TriangleCandidate> {
    let triangle = state.triangles.get(index)?;
    if !triangle.all_executable() {
        return None;
    }
    let payout = triangle.payout();
    let min_bps = Decimal::from(config.min_profit_bps);
    let mut best: Option<TriangleCandidate> = None;

    if let Some(total_ask) = triangle.total_ask() {
        let profit = payout - total_ask;
        let bps = profit_bps(profit, total_ask);
        if profit > Decimal::ZERO && bps >= min_bps && profit >= config.min_profit_abs {
            best = Some(TriangleCandidate {
                triangle: index,
                strategy: Strategy::TriangleBuy,
                profit_abs: profit,
                profit_bps: bps,
                gross: total_ask,
                payout,
            });
        }
    }

    if config.triangle_sell_enabled {
        if let Some(total_bid) = triangle.total_bid() {
            let profit = total_bid - payout;
            let bps = profit_bps(profit, payout);
            if profit > Decimal::ZERO
                && bps >= min_bps
                && profit >= config.min_profit_abs
                && best.map_or(true, |b| profit > b.profit_abs)
            {
                best = Some(TriangleCandidate {
                    triangle: index,
                    strategy: Strategy::TriangleSell,
                    profit_abs: profit,
                    profit_bps: bps,
                    gross: total_bid,
                    payout,
                });
            }
        }
    }
    best
}

/// Deduplication key: parents, chain and direction.
pub fn emit_key(state: &GroupState, candidate: &TriangleCandidate) -> String {
    let triangle = &state.triangles[candidate.triangle];
    let chain = triangle
        .chain
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("-");
    format!(
        "{}:{}:{}:{}:{}",
        state.group.group_key, triangle.lower, triangle.upper, chain, candidate.strategy
    )
}

/// Build the full opportunity record for a candidate that cleared cooldown.
pub fn materialize(state: &GroupState, candidate: &TriangleCandidate, ts_ms: i64) -> Opportunity {
    let triangle = &state.triangles[candidate.triangle];
    Opportunity {
        strategy: candidate.strategy,
        group_key: state.group.group_key.clone(),
        profit_abs: candidate.profit_abs,
        profit_bps: candidate.profit_bps,
        timestamp_ms: ts_ms,
        context: OpportunityContext::Triangle {
            parent_lower_yes: lower_yes_leg(state, triangle),
            parent_upper_no: upper_no_leg(state, triangle),
            chain_no: chain_no_legs(state, triangle),
            payout: candidate.payout,
            gross: candidate.gross,
        },
    }
}

fn lower_yes_leg(state: &GroupState, triangle: &Triangle) -> LegSnapshot {
    let d = &state.group.parents[triangle.lower];
    LegSnapshot {
        market_id: d.market_id.clone(),
        token_id: d.yes_token_id.clone(),
        label: d.label.clone(),
        quote: triangle.lower_yes,
    }
}

fn upper_no_leg(state: &GroupState, triangle: &Triangle) -> LegSnapshot {
    let d = &state.group.parents[triangle.upper];
    LegSnapshot {
        market_id: d.market_id.clone(),
        token_id: d.no_token_id.clone(),
        label: d.label.clone(),
        quote: triangle.upper_no,
    }
}

fn chain_no_legs(state: &GroupState, triangle: &Triangle) -> Vec<LegSnapshot> {
    triangle
        .chain
        .iter()
        .zip(triangle.chain_no.iter())
        .map(|(&child, quote)| {
            let d = &state.group.children[child];
            LegSnapshot {
                market_id: d.market_id.clone(),
                token_id: d.no_token_id.clone(),
                label: d.label.clone(),
                quote: *quote,
            }
        })
        .collect()
}
