use thiserror::Error;

/// Main error type for the detection engine
#[derive(Error, Debug)]
pub enum LadderError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    // Structure rebuild errors
    #[error("Structure rebuild failed: {0}")]
    Structure(String),

    // Metadata loader errors
    #[error("Market catalog error: {0}")]
    Catalog(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Opportunity stream errors
    #[error("Opportunity consumer disconnected")]
    ConsumerGone,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for LadderError
pub type Result<T> = std::result::Result<T, LadderError>;
