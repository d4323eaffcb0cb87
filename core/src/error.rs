use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Indicators without a bound rule: {}", codes.join(", "))]
    UnboundIndicators { codes: Vec<String> },

    #[error("Alert '{alert_id}' is already attached to case '{case_id}'")]
    AlertAlreadyAttached { alert_id: String, case_id: String },

    #[error("Unknown {kind} value '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Fatal configuration failures. A process must not start with any of these.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{file}: entry {index} is missing required field '{field}'")]
    MissingField {
        file: &'static str,
        index: usize,
        field: &'static str,
    },

    #[error("{file}: invalid risk domain '{value}'")]
    InvalidDomain { file: &'static str, value: String },

    #[error("Indicator '{code}' weight must be positive, got {weight}")]
    NonPositiveWeight { code: String, weight: f64 },

    #[error("Duplicate indicator code '{code}'")]
    DuplicateIndicator { code: String },

    #[error("Thresholds must satisfy 0 < low < medium (low={low}, medium={medium})")]
    InvalidThresholds { low: f64, medium: f64 },

    #[error("Policy '{id}' has invalid severity '{value}'")]
    InvalidSeverity { id: String, value: String },

    #[error("Policy '{id}' declares no conditions and would match every case")]
    UnconditionalPolicy { id: String },

    #[error("Engine setting '{name}' is invalid: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}
