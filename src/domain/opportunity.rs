use crate::domain::market::TokenQuote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Arbitrage strategy tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Unbundling: sell the lower parent, buy its covering children plus the
    /// upper parent
    SellParentBuyChildren,
    /// Bundling: buy the lower parent, sell the children plus the upper parent
    BuyParentSellChildren,
    /// Buy the constant-payout three-leg composition
    TriangleBuy,
    /// Sell the constant-payout three-leg composition
    TriangleSell,
    /// Buy both legs of a same-anchor pair bundle
    PairBuy,
    /// Sell both legs of a same-anchor pair bundle
    PairSell,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::SellParentBuyChildren => "SELL_PARENT_BUY_CHILDREN",
            Strategy::BuyParentSellChildren => "BUY_PARENT_SELL_CHILDREN",
            Strategy::TriangleBuy => "TRIANGLE_BUY",
            Strategy::TriangleSell => "TRIANGLE_SELL",
            Strategy::PairBuy => "PAIR_BUY",
            Strategy::PairSell => "PAIR_SELL",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One leg of an emitted combination, frozen at emission time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegSnapshot {
    pub market_id: String,
    pub token_id: String,
    pub label: String,
    pub quote: TokenQuote,
}

/// Strategy-specific detail attached to an opportunity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpportunityContext {
    Range {
        parent_lower: LegSnapshot,
        parent_upper: LegSnapshot,
        children: Vec<LegSnapshot>,
        /// Covered child window, inclusive indices into the group's ladder
        window: (usize, usize),
        /// Cost (unbundling) or revenue (bundling) of the synthetic side
        gross: Decimal,
    },
    Triangle {
        parent_lower_yes: LegSnapshot,
        parent_upper_no: LegSnapshot,
        chain_no: Vec<LegSnapshot>,
        payout: Decimal,
        /// Sum of asks (BUY) or bids (SELL) across all legs
        gross: Decimal,
    },
    Pair {
        first: LegSnapshot,
        second: LegSnapshot,
        /// What the pair bundle settles to
        payout: Decimal,
        gross: Decimal,
    },
}

/// Emitted arbitrage opportunity. Never persisted by the engine; consumers
/// decide what to store and what to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub strategy: Strategy,
    pub group_key: String,
    pub profit_abs: Decimal,
    pub profit_bps: Decimal,
    pub timestamp_ms: i64,
    pub context: OpportunityContext,
}

impl Opportunity {
    /// Number of legs that must be executed simultaneously
    pub fn leg_count(&self) -> usize {
        match &self.context {
            OpportunityContext::Range { children, .. } => children.len() + 2,
            OpportunityContext::Triangle { chain_no, .. } => chain_no.len() + 2,
            OpportunityContext::Pair { .. } => 2,
        }
    }
}

/// `10_000 * profit / basis`, the emission unit for relative profit
pub fn profit_bps(profit: Decimal, basis: Decimal) -> Decimal {
    if basis <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    profit * Decimal::from(10_000) / basis
}
