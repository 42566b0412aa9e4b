//! Load, train and save: the sequence behind the `vitalrisk-train` binary

use std::io::Write;
use std::path::PathBuf;

use tracing::info;
use vitalrisk_core::{
    is_valid_threshold, ArtifactStore, MetricsReport, RiskConfig, RiskError, SavedArtifacts,
};

use crate::dataset::{DatasetLoader, LoaderConfig};
use crate::errors::Result;
use crate::synthetic::SyntheticProfile;
use crate::trainer::{Trainer, TrainingParams};

/// Inputs of one training run.
#[derive(Debug, Clone)]
pub struct TrainRequest {
    /// `synthetic`, `csv` or `db`
    pub source: String,
    pub csv: Option<PathBuf>,
    pub limit: Option<usize>,
    /// Rows to generate for the synthetic source
    pub rows: usize,
    pub profile: SyntheticProfile,
    pub seed: u64,
    /// Reference cutoff for reported metrics; the configured default when unset
    pub threshold: Option<f64>,
    /// Artifact directory overriding the configuration
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Default for TrainRequest {
    fn default() -> Self {
        let loader = LoaderConfig::default();
        Self {
            source: "synthetic".to_string(),
            csv: None,
            limit: None,
            rows: loader.synthetic_rows,
            profile: loader.profile,
            seed: loader.seed,
            threshold: None,
            output: None,
            config: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub saved: SavedArtifacts,
    pub metrics: MetricsReport,
}

pub fn run_training(request: &TrainRequest) -> Result<TrainSummary> {
    let mut config = RiskConfig::load(request.config.as_deref())?;
    if let Some(output) = &request.output {
        config.artifacts.dir = output.clone();
    }
    let reference_threshold = request.threshold.unwrap_or(config.default_threshold);
    if !is_valid_threshold(reference_threshold) {
        return Err(RiskError::Config(format!(
            "threshold must lie strictly between 0 and 1, got {reference_threshold}"
        ))
        .into());
    }

    let loader = DatasetLoader::new(LoaderConfig {
        synthetic_rows: request.rows,
        seed: request.seed,
        profile: request.profile,
    });
    let csv_path = request
        .csv
        .as_ref()
        .map(|p| std::fs::canonicalize(p).unwrap_or_else(|_| p.clone()));
    let dataset = loader.load(&request.source, csv_path.as_deref(), request.limit)?;

    info!("Feature statistics:");
    for (name, (min, max)) in dataset.columns.iter().zip(dataset.feature_stats()) {
        info!("  {name}: min={min}, max={max}");
    }

    info!("Starting training...");
    let trainer = Trainer::new(TrainingParams {
        seed: request.seed,
        reference_threshold,
        ..Default::default()
    });
    let out = trainer.train(&dataset)?;

    let store = ArtifactStore::new(config.artifacts);
    let saved = store.save_all(&out.model, &out.metrics, &out.eval_report)?;
    info!("Model hash: {}", saved.model_hash);

    Ok(TrainSummary {
        saved,
        metrics: out.metrics,
    })
}

/// Print the completion summary the way the CLI shows it.
pub fn render_summary<W: Write>(summary: &TrainSummary, out: &mut W) -> Result<()> {
    let metrics = serde_json::to_string_pretty(&summary.metrics).map_err(RiskError::from)?;
    writeln!(out, "✅ Training complete")?;
    writeln!(out, "Model:   {}", summary.saved.model_path.display())?;
    writeln!(out, "Metrics: {}", summary.saved.metrics_path.display())?;
    writeln!(out, "Report:  {}", summary.saved.report_path.display())?;
    writeln!(out, "{metrics}")?;
    Ok(())
}
