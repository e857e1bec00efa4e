//! Interval parsing for price-range market questions.
//!
//! Polymarket ladder markets encode their bracket in free text ("Will BTC be
//! between $80,000 and $82,000 on..?") or in the slug
//! (`bitcoin-80000-82000-aug-1`). This module derives the market kind
//! (range / above / below) and numeric bounds from either.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Market classification with bounds-carrying payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketKind {
    /// YES pays if the settlement value lies in `[lower, upper)`
    Range { lower: Decimal, upper: Decimal },
    /// YES pays if the settlement value is at least `lower`
    Above { lower: Decimal },
    /// YES pays if the settlement value is below `upper`
    Below { upper: Decimal },
    /// Could not be classified
    Unknown,
}

impl MarketKind {
    pub fn lower(&self) -> Option<Decimal> {
        match self {
            MarketKind::Range { lower, .. } | MarketKind::Above { lower } => Some(*lower),
            _ => None,
        }
    }

    pub fn upper(&self) -> Option<Decimal> {
        match self {
            MarketKind::Range { upper, .. } | MarketKind::Below { upper } => Some(*upper),
            _ => None,
        }
    }

    /// Boundary values this market touches. Two markets can only be combined
    /// when they share an anchor.
    pub fn anchors(&self) -> Vec<Decimal> {
        match self {
            MarketKind::Range { lower, upper } => vec![*lower, *upper],
            MarketKind::Above { lower } => vec![*lower],
            MarketKind::Below { upper } => vec![*upper],
            MarketKind::Unknown => Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MarketKind::Unknown)
    }

    /// Human-readable bracket label
    pub fn label(&self) -> String {
        match self {
            MarketKind::Range { lower, upper } => format!("[{}, {})", lower, upper),
            MarketKind::Above { lower } => format!(">={}", lower),
            MarketKind::Below { upper } => format!("<{}", upper),
            MarketKind::Unknown => "?".to_string(),
        }
    }
}

impl std::fmt::Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Where a parsed interval came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseSource {
    Question,
    Slug,
    Override,
}

/// Result of interval parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRange {
    pub kind: MarketKind,
    pub label: String,
    pub source: ParseSource,
}

impl ParsedRange {
    fn new(kind: MarketKind, source: ParseSource) -> Self {
        Self {
            label: kind.label(),
            kind,
            source,
        }
    }
}

/// Parse a market's bracket from its question, falling back to the slug.
pub fn parse_interval(question: &str, slug: &str) -> ParsedRange {
    let from_question = classify(question);
    if !from_question.is_unknown() {
        return ParsedRange::new(from_question, ParseSource::Question);
    }
    let from_slug = classify(slug);
    if !from_slug.is_unknown() {
        return ParsedRange::new(from_slug, ParseSource::Slug);
    }
    ParsedRange::new(MarketKind::Unknown, ParseSource::Question)
}

/// Classify one normalised text into a market kind.
fn classify(text: &str) -> MarketKind {
    let normalised = normalise(text);
    let numbers = extract_numbers(&normalised);

    if has_range_hint(&normalised) && numbers.len() >= 2 {
        let (a, b) = (numbers[0], numbers[1]);
        let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
        if lower < upper {
            return MarketKind::Range { lower, upper };
        }
    }
    if has_above_hint(&normalised) && !numbers.is_empty() {
        return MarketKind::Above { lower: numbers[0] };
    }
    if has_below_hint(&normalised) && !numbers.is_empty() {
        return MarketKind::Below { upper: numbers[0] };
    }
    MarketKind::Unknown
}

/// Strip currency markers and underscores, lowercase.
fn normalise(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '$' | '_' => ' ',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

const ABOVE_HINTS: &[&str] = &["above", "over", "greater", "at least", "or more", "or higher", "≥", ">="];
const BELOW_HINTS: &[&str] = &["below", "under", "less", "at most", "or lower", "≤", "<="];

fn has_above_hint(text: &str) -> bool {
    ABOVE_HINTS.iter().any(|h| text.contains(h))
}

fn has_below_hint(text: &str) -> bool {
    BELOW_HINTS.iter().any(|h| text.contains(h))
}

/// Range hint: "between", a standalone "to" joining numbers, or a dash with
/// digits on both sides. Bare dashes are word separators in slugs and must
/// not count.
fn has_range_hint(text: &str) -> bool {
    if text.contains("between") || text.contains(" to ") {
        return true;
    }
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'-' || b == 0xE2) && i > 0 {
            // 0xE2 starts the en/em-dash UTF-8 sequences
            let prev_digit = bytes[..i]
                .iter()
                .rev()
                .find(|c| !c.is_ascii_whitespace())
                .is_some_and(|&c| c.is_ascii_digit() || matches!(c, b'k' | b'm' | b'b'));
            let rest = if b == b'-' { &text[i + 1..] } else { &text[i + 3.min(text.len() - i)..] };
            let next_digit = rest
                .bytes()
                .find(|c| !c.is_ascii_whitespace())
                .is_some_and(|c| c.is_ascii_digit());
            if prev_digit && next_digit {
                return true;
            }
        }
    }
    false
}

/// Extract numeric tokens with grouping separators and `k`/`m`/`b` suffix
/// multipliers ("95,000" → 95000, "1.2m" → 1200000).
fn extract_numbers(text: &str) -> Vec<Decimal> {
    let mut numbers = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let mut raw = String::new();
            while i < chars.len() {
                let c = chars[i];
                if c.is_ascii_digit() || c == '.' {
                    raw.push(c);
                    i += 1;
                } else if c == ',' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                    // grouping separator, skip
                    i += 1;
                } else {
                    break;
                }
            }
            let multiplier = match chars.get(i) {
                Some('k') => Some(Decimal::from(1_000)),
                Some('m') => Some(Decimal::from(1_000_000)),
                Some('b') => Some(Decimal::from(1_000_000_000)),
                _ => None,
            };
            // A suffix only counts when it ends the token ("80k", not "80km")
            let suffix_ok = multiplier.is_some()
                && chars
                    .get(i + 1)
                    .map_or(true, |c| !c.is_ascii_alphanumeric());
            if let Ok(mut value) = Decimal::from_str(&raw) {
                if suffix_ok {
                    value *= multiplier.unwrap();
                    i += 1;
                }
                numbers.push(value);
            }
        } else {
            i += 1;
        }
    }
    numbers
}
