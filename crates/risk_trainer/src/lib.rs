//! VitalRisk Trainer - offline training for the at-risk classifier
//!
//! Loads a labeled dataset from a named source, fits the standardized
//! logistic model on a seeded stratified split and reports held-out metrics
//! together with the selected operating thresholds.

pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod pipeline;
pub mod synthetic;
pub mod trainer;

use std::path::Path;

pub use dataset::{DataSource, Dataset, DatasetLoader, LoaderConfig, RecordStore, TARGET_COLUMN};
pub use deterministic::{stratified_split, xxhash64, Split};
pub use errors::{Result, TrainerError};
pub use pipeline::{render_summary, run_training, TrainRequest, TrainSummary};
pub use synthetic::{make_synthetic_data, make_synthetic_profile, SyntheticProfile};
pub use trainer::{
    train_model, EvaluationReport, GroupSupport, TrainOutput, Trainer, TrainingParams,
};

/// Train directly from a CSV file using the provided parameters.
pub fn train_model_from_csv(path: &Path, params: TrainingParams) -> Result<TrainOutput> {
    let dataset = Dataset::from_csv(path)?;
    Trainer::new(params).train(&dataset)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
