use std::path::PathBuf;
use thiserror::Error;
use vitalrisk_core::{ErrorKind, RiskError};

/// Errors returned by the dataset loader and trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("Invalid source: '{0}'. Expected one of: synthetic, csv, db")]
    InvalidSource(String),

    #[error("CSV not found: {}", .0.display())]
    CsvNotFound(PathBuf),

    #[error("source 'csv' requires a CSV path")]
    CsvPathRequired,

    #[error("Your CSV must include a target column named 'at_risk' (0/1).")]
    MissingLabel,

    #[error("row {row}: at_risk must be 0 or 1, got '{value}'")]
    InvalidLabel { row: usize, value: String },

    #[error("training data is missing required column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has a non-finite value at row {row}")]
    NonFiniteValue { column: String, row: usize },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("dataset has no feature columns besides 'at_risk'")]
    NoFeatures,

    #[error("training labels contain a single class ({0}); need both 0 and 1")]
    SingleClass(u8),

    #[error("class {label} has {count} row(s); a stratified split needs at least 2 per class")]
    InsufficientClassMembers { label: u8, count: usize },

    #[error("db source requested but no record store is configured")]
    StoreUnavailable,

    #[error("record store error: {0}")]
    Store(String),

    #[error("synthetic sampler error: {0}")]
    Sampler(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] RiskError),
}

impl TrainerError {
    /// Map onto the core error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrainerError::MissingColumn(_) | TrainerError::StoreUnavailable => {
                ErrorKind::Configuration
            }
            TrainerError::InvalidSource(_)
            | TrainerError::CsvNotFound(_)
            | TrainerError::CsvPathRequired
            | TrainerError::MissingLabel
            | TrainerError::InvalidLabel { .. }
            | TrainerError::NonFiniteValue { .. }
            | TrainerError::EmptyDataset
            | TrainerError::NoFeatures
            | TrainerError::SingleClass(_)
            | TrainerError::InsufficientClassMembers { .. }
            | TrainerError::Csv(_) => ErrorKind::InputValidation,
            TrainerError::Store(_) | TrainerError::Sampler(_) | TrainerError::Io(_) => {
                ErrorKind::Internal
            }
            TrainerError::Core(err) => err.kind(),
        }
    }
}

/// Result type for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;
