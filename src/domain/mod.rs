//! Domain types: market classification, book state, opportunities.

pub mod interval;
pub mod market;
pub mod opportunity;

pub use interval::{parse_interval, MarketKind, ParseSource, ParsedRange};
pub use market::{MarketDescriptor, MarketRecord, MarketRole, TokenQuote, TopOfBookUpdate};
pub use opportunity::{profit_bps, LegSnapshot, Opportunity, OpportunityContext, Strategy};
