pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod feed;
pub mod logging;
pub mod structure;

pub use catalog::MarketCatalog;
pub use config::{AppConfig, EngineConfig, LoggingConfig};
pub use domain::{
    parse_interval, MarketDescriptor, MarketKind, MarketRecord, MarketRole, Opportunity,
    OpportunityContext, Strategy, TokenQuote, TopOfBookUpdate,
};
pub use engine::{ArbEngine, EngineStats, GroupState};
pub use error::{LadderError, Result};
pub use feed::PriceBus;
pub use logging::init_logging;
pub use structure::{
    BuildReport, Coverage, OverrideRule, OverrideTable, RangeGroup, StructureBuilder,
};
