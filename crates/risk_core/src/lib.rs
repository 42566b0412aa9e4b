//! VitalRisk core: the decision logic shared by training and serving
//!
//! Modules:
//! - `features`: payload reconciliation (aliases, derived pulse pressure) and vectorization
//! - `age`: life-stage buckets and age-adaptive threshold resolution
//! - `metrics`: evaluation math, threshold search and the persisted metrics report
//! - `model`: the `Classifier` capability and the standardized logistic model
//! - `artifacts`: model/metrics persistence with hash verification
//! - `scorer`: payload-to-decision orchestration
//! - `config`: layered configuration (defaults, TOML, environment)

pub mod age;
pub mod artifacts;
pub mod config;
pub mod errors;
pub mod features;
pub mod metrics;
pub mod model;
pub mod scorer;
pub mod serialization;

pub use age::{is_valid_threshold, resolve_threshold, AgeGroup, AgeGroupThresholds};
pub use artifacts::{load_metrics, load_model, ArtifactStore, SavedArtifacts};
pub use config::{ArtifactPaths, RiskConfig, ServiceConfig};
pub use errors::{ErrorKind, Result, RiskError};
pub use features::{
    coerce_payload, parse_payload, payload_from_record, payload_from_value, vectorize,
    FeatureVector, Payload, Record,
};
pub use metrics::{
    best_threshold, roc_auc, ClassificationScores, ConfusionMatrix, MetricsReport, ThresholdPoint,
};
pub use model::{Classifier, FeatureContribution, LogisticParams, RiskModel, StandardScaler};
pub use scorer::{predict, predict_with_features, resolve_feature_names, Decision, Scorer};

/// Version tag reported with every decision
pub const MODEL_VERSION: &str = "0.1.0";

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
