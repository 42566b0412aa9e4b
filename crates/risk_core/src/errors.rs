//! Error types for the risk core

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`RiskError`], used by outer layers to pick
/// exit codes and HTTP statuses without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Artifacts or feature metadata are missing or unusable. Fatal, never retried.
    Configuration,
    /// The caller supplied a payload that cannot be scored.
    InputValidation,
    /// Anything else (I/O, numerical failure inside the model).
    Internal,
}

/// Errors that can occur while reconciling, loading or scoring
#[derive(Error, Debug)]
pub enum RiskError {
    /// A persisted artifact does not exist
    #[error("{what} not found: {}. {hint}", path.display())]
    ArtifactNotFound {
        what: &'static str,
        path: PathBuf,
        hint: &'static str,
    },

    /// Metrics file parsed but its top level is not an object
    #[error("metrics file {} is not a JSON object", .0.display())]
    MetricsNotObject(PathBuf),

    /// Neither the model nor the metrics report carries feature names
    #[error("feature names unavailable: the model does not record its training columns and the metrics report has no feature_names")]
    FeatureNamesUnavailable,

    /// Required features absent after reconciliation
    #[error("Missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    /// Required feature present but not parseable as a finite number
    #[error("Non-numeric value for feature '{name}': {value}")]
    NonNumericFeature { name: String, value: String },

    /// Payload is not usable at all (bad JSON, not an object)
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Model bytes do not match the recorded hash
    #[error("model integrity check failed for {}: expected {expected}, found {actual}", path.display())]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Model could not fit or score
    #[error("model error: {0}")]
    Model(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file parse error
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RiskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RiskError::ArtifactNotFound { .. }
            | RiskError::MetricsNotObject(_)
            | RiskError::FeatureNamesUnavailable
            | RiskError::IntegrityMismatch { .. }
            | RiskError::Config(_)
            | RiskError::Toml(_) => ErrorKind::Configuration,
            RiskError::MissingFeatures(_)
            | RiskError::NonNumericFeature { .. }
            | RiskError::InvalidPayload(_) => ErrorKind::InputValidation,
            RiskError::Model(_) | RiskError::Io(_) | RiskError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Result type for risk core operations
pub type Result<T> = std::result::Result<T, RiskError>;
