use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Detection engine thresholds and feature flags.
///
/// All values are process-scoped and read once at start.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Minimum profit in basis points for an opportunity to be emitted
    #[serde(default = "default_min_profit_bps")]
    pub min_profit_bps: u32,

    /// Minimum absolute profit (in collateral units) per combination
    #[serde(default)]
    pub min_profit_abs: Decimal,

    /// Suppression window per emit key, milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,

    /// Relative size change that counts as a delta once size-only updates
    /// are admitted by the dirty filter (currently reserved)
    #[serde(default = "default_size_change_threshold")]
    pub size_change_threshold: Decimal,

    /// Evaluate the SELL direction of triangle combinations
    #[serde(default)]
    pub triangle_sell_enabled: bool,

    /// Track and evaluate two-market same-anchor pairs
    #[serde(default = "default_true")]
    pub binary_pairs_enabled: bool,

    /// Bounded capacity of the outbound opportunity channel; when the
    /// consumer is full, further opportunities are dropped
    #[serde(default = "default_opportunity_capacity")]
    pub opportunity_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_profit_bps: default_min_profit_bps(),
            min_profit_abs: Decimal::ZERO,
            cooldown_ms: default_cooldown_ms(),
            size_change_threshold: default_size_change_threshold(),
            triangle_sell_enabled: false,
            binary_pairs_enabled: true,
            opportunity_capacity: default_opportunity_capacity(),
        }
    }
}

impl EngineConfig {
    /// Validate config invariants. Returns list of problems (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.min_profit_abs < Decimal::ZERO {
            errors.push(format!(
                "min_profit_abs must be >= 0, got {}",
                self.min_profit_abs
            ));
        }
        if self.cooldown_ms < 0 {
            errors.push(format!("cooldown_ms must be >= 0, got {}", self.cooldown_ms));
        }
        if self.size_change_threshold < Decimal::ZERO || self.size_change_threshold >= Decimal::ONE
        {
            errors.push(format!(
                "size_change_threshold must be in [0, 1), got {}",
                self.size_change_threshold
            ));
        }
        if self.opportunity_capacity == 0 {
            errors.push("opportunity_capacity must be > 0".to_string());
        }
        errors
    }
}

fn default_min_profit_bps() -> u32 {
    5
}

fn default_cooldown_ms() -> i64 {
    1_000
}

fn default_size_change_threshold() -> Decimal {
    dec!(0.01)
}

fn default_true() -> bool {
    true
}

fn default_opportunity_capacity() -> usize {
    1_024
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from either a config directory or a single TOML file
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_path = config_dir.as_ref();

        let mut builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        // Accept either a config directory (`config/`) or a single TOML file
        // (`config/default.toml`).
        if config_path.is_file() {
            builder = builder.add_source(File::from(config_path).required(true));
        } else {
            builder = builder
                .add_source(File::from(config_path.join("default.toml")).required(false))
                .add_source(
                    File::from(config_path.join(
                        std::env::var("LADDERARB_ENV")
                            .unwrap_or_else(|_| "development".to_string()),
                    ))
                    .required(false),
                );
        }

        builder = builder.add_source(
            // Override with environment variables (LADDERARB_ENGINE__COOLDOWN_MS, etc.)
            Environment::with_prefix("LADDERARB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
