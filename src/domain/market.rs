use crate::domain::interval::MarketKind;
use crate::error::{LadderError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One market row from the metadata store, as delivered by the loader.
///
/// `clob_token_ids` arrives as a JSON-encoded string pair (`"[\"yes\",\"no\"]"`),
/// exactly the shape the Gamma API uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub market_id: String,
    pub slug: String,
    pub question: String,
    #[serde(default)]
    pub clob_token_ids: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_slug: Option<String>,
    #[serde(default)]
    pub event_ticker: Option<String>,
    #[serde(default)]
    pub event_end_date: Option<DateTime<Utc>>,
    /// Declared asset class ("btc", "eth", ..), when the loader knows it
    #[serde(default)]
    pub symbol_hint: Option<String>,
    #[serde(default)]
    pub neg_risk: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl MarketRecord {
    /// Parse the `[YES, NO]` token id pair.
    pub fn token_pair(&self) -> Result<Option<(String, String)>> {
        let Some(raw) = &self.clob_token_ids else {
            return Ok(None);
        };
        let ids: Vec<String> = serde_json::from_str(raw)?;
        if ids.len() != 2 || ids[0].is_empty() || ids[1].is_empty() {
            return Err(LadderError::Structure(format!(
                "market {} has malformed clobTokenIds",
                self.market_id
            )));
        }
        Ok(Some((ids[0].clone(), ids[1].clone())))
    }

    /// Settlement time: market end-date, else event end-date.
    pub fn settlement_time(&self) -> Option<DateTime<Utc>> {
        self.end_date.or(self.event_end_date)
    }
}

/// Role a market plays inside its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRole {
    /// Open-ended (`above`-kind) market
    Parent,
    /// Bracketed (`range`-kind) market
    Child,
}

impl MarketRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRole::Parent => "parent",
            MarketRole::Child => "child",
        }
    }
}

impl std::fmt::Display for MarketRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified market ready for group assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDescriptor {
    pub market_id: String,
    pub slug: String,
    pub question: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub kind: MarketKind,
    pub role: MarketRole,
    pub label: String,
    pub symbol: String,
    pub settlement_key: String,
    pub event_slug: Option<String>,
    pub neg_risk: bool,
}

impl MarketDescriptor {
    pub fn lower(&self) -> Option<Decimal> {
        self.kind.lower()
    }

    pub fn upper(&self) -> Option<Decimal> {
        self.kind.upper()
    }
}

/// Normalised top-of-book price event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopOfBookUpdate {
    pub asset_id: String,
    #[serde(default)]
    pub market_id: Option<String>,
    #[serde(default)]
    pub market_slug: Option<String>,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    #[serde(default)]
    pub best_bid_size: Option<Decimal>,
    #[serde(default)]
    pub best_ask_size: Option<Decimal>,
    pub timestamp_ms: i64,
}

/// Per-token mutable book state.
///
/// A zero price on the wire means "no liquidity on that side" and is stored
/// as `None`, making the leg non-executable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenQuote {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub bid_size: Option<Decimal>,
    pub ask_size: Option<Decimal>,
    pub timestamp_ms: i64,
}

impl TokenQuote {
    /// Write an accepted update into the quote.
    pub fn apply(&mut self, update: &TopOfBookUpdate) {
        self.bid = positive(update.best_bid);
        self.ask = positive(update.best_ask);
        self.bid_size = update.best_bid_size.and_then(positive);
        self.ask_size = update.best_ask_size.and_then(positive);
        self.timestamp_ms = update.timestamp_ms;
    }

    /// Both sides present and positive
    pub fn is_executable(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }

    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }
}

fn positive(value: Decimal) -> Option<Decimal> {
    if value > Decimal::ZERO {
        Some(value)
    } else {
        None
    }
}
