//! One-shot inference behind the `vitalrisk-predict` binary
//!
//! Exit codes: 0 on success, 1 for missing or unusable artifacts, 2 for a
//! payload that cannot be scored (bad JSON, not an object, missing or
//! non-numeric features).

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use vitalrisk_core::errors::ErrorKind;
use vitalrisk_core::{
    is_valid_threshold, load_metrics, load_model, parse_payload, Decision, Payload, RiskConfig,
    RiskError, Scorer,
};

use crate::example_payload;

/// Inputs of a single prediction run.
#[derive(Debug, Clone, Default)]
pub struct PredictRequest {
    /// Model artifact; defaults to the configured artifact directory
    pub model: Option<PathBuf>,
    /// Metrics artifact; defaults to the configured artifact directory
    pub metrics: Option<PathBuf>,
    /// JSON object with feature values; an example payload is scored when absent
    pub json: Option<String>,
    /// Fallback threshold when the metrics carry none
    pub threshold: Option<f64>,
    /// TOML configuration file
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictOutcome {
    pub feature_names: Vec<String>,
    /// Set when no payload was supplied and the example was scored instead
    pub example: Option<Payload>,
    pub decision: Decision,
}

pub fn run_prediction(request: &PredictRequest) -> Result<PredictOutcome, RiskError> {
    let config = RiskConfig::load(request.config.as_deref())?;
    let default_threshold = match request.threshold {
        Some(t) if !is_valid_threshold(t) => {
            return Err(RiskError::Config(format!(
                "threshold must lie strictly between 0 and 1, got {t}"
            )))
        }
        Some(t) => t,
        None => config.default_threshold,
    };

    let model_path = request
        .model
        .clone()
        .unwrap_or_else(|| config.artifacts.model_path());
    let hash_path = model_path.with_file_name(&config.artifacts.hash_file);
    let metrics_path = request
        .metrics
        .clone()
        .unwrap_or_else(|| config.artifacts.metrics_path());
    debug!(model = %model_path.display(), metrics = %metrics_path.display(), "Loading artifacts");

    let model = load_model(&model_path, Some(&hash_path))?;
    let metrics = load_metrics(&metrics_path)?;
    let scorer = Scorer::new(Arc::new(model), metrics, default_threshold)?;

    let (payload, example) = match &request.json {
        Some(text) => (parse_payload(text)?, None),
        None => {
            let example = example_payload(scorer.feature_names());
            (example.clone(), Some(example))
        }
    };

    Ok(PredictOutcome {
        feature_names: scorer.feature_names().to_vec(),
        decision: scorer.score(&payload)?,
        example,
    })
}

/// Print the outcome the way the CLI shows it.
pub fn render_outcome<W: Write>(outcome: &PredictOutcome, out: &mut W) -> Result<(), RiskError> {
    if let Some(example) = &outcome.example {
        writeln!(
            out,
            "No --json provided. Expected features: {}",
            outcome.feature_names.join(", ")
        )?;
        writeln!(out, "Example:")?;
        writeln!(out, "{}", serde_json::to_string_pretty(example)?)?;
    }
    writeln!(out, "{}", serde_json::to_string_pretty(&outcome.decision)?)?;
    Ok(())
}

pub fn exit_code(err: &RiskError) -> u8 {
    match err.kind() {
        ErrorKind::InputValidation => 2,
        ErrorKind::Configuration | ErrorKind::Internal => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};
    use vitalrisk_core::{ArtifactPaths, ArtifactStore};
    use vitalrisk_trainer::{make_synthetic_data, train_model};

    fn trained_artifacts() -> (TempDir, ArtifactPaths) {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let out = train_model(&make_synthetic_data(400, 3), 3, 0.5).unwrap();
        ArtifactStore::new(paths.clone())
            .save_all(&out.model, &out.metrics, &out.eval_report)
            .unwrap();
        (dir, paths)
    }

    fn request(paths: &ArtifactPaths, json: Option<&str>) -> PredictRequest {
        PredictRequest {
            model: Some(paths.model_path()),
            metrics: Some(paths.metrics_path()),
            json: json.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_scores_supplied_payload() {
        let (_dir, paths) = trained_artifacts();
        let json = r#"{"age_years": 70, "heart_rate": 88, "resp_rate": 18, "temp_f": 98.9,
            "spo2_pct": 95, "systolic_bp": 146, "diastolic_bp": 88, "pain_0_10": 3}"#;
        let outcome = run_prediction(&request(&paths, Some(json))).unwrap();
        assert!(outcome.example.is_none());
        assert_eq!(outcome.decision.age_group.map(|g| g.to_string()), Some("senior".into()));

        let mut out = Vec::new();
        render_outcome(&outcome, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("No --json provided"));
        assert!(text.contains("\"risk_probability\""));
    }

    #[test]
    fn test_without_payload_scores_the_example() {
        let (_dir, paths) = trained_artifacts();
        let outcome = run_prediction(&request(&paths, None)).unwrap();
        let example = outcome.example.as_ref().unwrap();
        assert!(example.contains_key("systolic_bp"));
        assert!(!outcome.decision.reasons.is_empty());

        let mut out = Vec::new();
        render_outcome(&outcome, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("No --json provided. Expected features: age_years"));
        assert!(text.contains("Example:"));
        assert!(text.contains("\"model_version\""));
    }

    #[test]
    fn test_bad_payloads_exit_with_two() {
        let (_dir, paths) = trained_artifacts();
        for json in ["{bad", "[1]", r#"{"age_years": 40}"#, r#"{"age_years": "old"}"#] {
            let err = run_prediction(&request(&paths, Some(json))).unwrap_err();
            assert_eq!(exit_code(&err), 2, "{json}: {err}");
        }
    }

    #[test]
    fn test_missing_model_exits_with_one() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path().join("absent"));
        let err = run_prediction(&request(&paths, Some("{}"))).unwrap_err();
        assert_eq!(exit_code(&err), 1);
        assert!(err.to_string().contains("Run: vitalrisk-train"), "{err}");
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let (_dir, paths) = trained_artifacts();
        for threshold in [2.0, 0.0, -0.1, f64::NAN] {
            let err = run_prediction(&PredictRequest {
                threshold: Some(threshold),
                ..request(&paths, None)
            })
            .unwrap_err();
            assert!(matches!(err, RiskError::Config(_)), "{threshold}: {err}");
            assert_eq!(exit_code(&err), 1);
        }
    }
}
