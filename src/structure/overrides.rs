//! Manual classification overrides.
//!
//! Some markets defeat the interval parser (ambiguous questions, renamed
//! events). Override rules match a market by exact slug, slug substring or
//! question substring and overwrite whatever the rule specifies. Overrides
//! are authoritative; every application is counted for diagnostics.

use crate::domain::{MarketKind, MarketRole, ParseSource, ParsedRange};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Kind selector used by override rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Range,
    Above,
    Below,
}

/// One override rule. At least one matcher must be set; unset overwrite
/// fields leave the parsed value in place.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideRule {
    // Matchers
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub slug_contains: Option<String>,
    #[serde(default)]
    pub question_contains: Option<String>,

    // Overwrites
    #[serde(default)]
    pub kind: Option<OverrideKind>,
    #[serde(default)]
    pub lower: Option<Decimal>,
    #[serde(default)]
    pub upper: Option<Decimal>,
    #[serde(default)]
    pub role: Option<MarketRole>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Group-level ladder step; wins over the derived one
    #[serde(default)]
    pub step: Option<Decimal>,
}

impl OverrideRule {
    pub fn matches(&self, slug: &str, question: &str) -> bool {
        if let Some(exact) = &self.slug {
            if slug == exact {
                return true;
            }
        }
        if let Some(fragment) = &self.slug_contains {
            if !fragment.is_empty() && slug.contains(fragment.as_str()) {
                return true;
            }
        }
        if let Some(fragment) = &self.question_contains {
            if !fragment.is_empty() && question.contains(fragment.as_str()) {
                return true;
            }
        }
        false
    }

    /// Overwrite the parsed classification. Returns an error string when the
    /// rule asks for a kind it does not supply bounds for (and the parse has
    /// none to fall back on).
    pub fn apply_to(&self, parsed: &mut ParsedRange) -> Result<(), String> {
        let lower = self.lower.or(parsed.kind.lower());
        let upper = self.upper.or(parsed.kind.upper());

        let new_kind = match self.kind {
            Some(OverrideKind::Range) => match (lower, upper) {
                (Some(l), Some(u)) if l < u => Some(MarketKind::Range { lower: l, upper: u }),
                _ => return Err("range override needs lower < upper".to_string()),
            },
            Some(OverrideKind::Above) => match lower {
                Some(l) => Some(MarketKind::Above { lower: l }),
                None => return Err("above override needs a lower bound".to_string()),
            },
            Some(OverrideKind::Below) => match upper {
                Some(u) => Some(MarketKind::Below { upper: u }),
                None => return Err("below override needs an upper bound".to_string()),
            },
            // Bounds-only overwrite keeps the parsed kind
            None => match parsed.kind {
                MarketKind::Range { .. } => match (lower, upper) {
                    (Some(l), Some(u)) if l < u => Some(MarketKind::Range { lower: l, upper: u }),
                    _ => return Err("range bounds override needs lower < upper".to_string()),
                },
                MarketKind::Above { .. } => lower.map(|l| MarketKind::Above { lower: l }),
                MarketKind::Below { .. } => upper.map(|u| MarketKind::Below { upper: u }),
                MarketKind::Unknown => None,
            },
        };

        if let Some(kind) = new_kind {
            parsed.kind = kind;
            parsed.source = ParseSource::Override;
            parsed.label = self.label.clone().unwrap_or_else(|| kind.label());
        } else if let Some(label) = &self.label {
            parsed.label = label.clone();
            parsed.source = ParseSource::Override;
        }
        Ok(())
    }
}

/// The configured rule set plus application diagnostics
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideTable {
    #[serde(default)]
    pub rules: Vec<OverrideRule>,
}

impl OverrideTable {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules matching a market, in configuration order.
    pub fn matching<'a>(
        &'a self,
        slug: &'a str,
        question: &'a str,
    ) -> impl Iterator<Item = &'a OverrideRule> {
        self.rules.iter().filter(move |r| r.matches(slug, question))
    }
}
