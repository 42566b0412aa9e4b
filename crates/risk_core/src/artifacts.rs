//! Artifact persistence: model, model hash, metrics report, evaluation report

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ArtifactPaths;
use crate::errors::{Result, RiskError};
use crate::metrics::MetricsReport;
use crate::model::RiskModel;
use crate::serialization::{canonical_json_string, content_hash};

const TRAIN_HINT: &str = "Run: vitalrisk-train";

/// Paths written by [`ArtifactStore::save_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifacts {
    pub model_path: PathBuf,
    pub hash_path: PathBuf,
    pub metrics_path: PathBuf,
    pub report_path: PathBuf,
    pub model_hash: String,
}

/// File-system artifact store rooted at an [`ArtifactPaths`] directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    paths: ArtifactPaths,
}

impl ArtifactStore {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.paths.dir)?;
        Ok(())
    }

    /// Write the model as canonical JSON plus its BLAKE3 hash.
    pub fn save_model(&self, model: &RiskModel) -> Result<String> {
        self.ensure_dir()?;
        let json = canonical_json_string(model)?;
        let hash = content_hash(json.as_bytes());
        fs::write(self.paths.model_path(), &json)?;
        fs::write(self.paths.hash_path(), &hash)?;
        debug!("Model hash: {hash}");
        Ok(hash)
    }

    pub fn save_metrics(&self, metrics: &MetricsReport) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.paths.metrics_path();
        fs::write(&path, canonical_json_string(metrics)?)?;
        Ok(path)
    }

    pub fn save_report<T: Serialize>(&self, report: &T) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.paths.report_path();
        fs::write(&path, canonical_json_string(report)?)?;
        Ok(path)
    }

    pub fn save_all<T: Serialize>(
        &self,
        model: &RiskModel,
        metrics: &MetricsReport,
        report: &T,
    ) -> Result<SavedArtifacts> {
        let model_hash = self.save_model(model)?;
        let metrics_path = self.save_metrics(metrics)?;
        let report_path = self.save_report(report)?;
        info!("Artifacts written to {}", self.paths.dir.display());
        Ok(SavedArtifacts {
            model_path: self.paths.model_path(),
            hash_path: self.paths.hash_path(),
            metrics_path,
            report_path,
            model_hash,
        })
    }

    pub fn load_model(&self) -> Result<RiskModel> {
        load_model(&self.paths.model_path(), Some(&self.paths.hash_path()))
    }

    pub fn load_metrics(&self) -> Result<MetricsReport> {
        load_metrics(&self.paths.metrics_path())
    }
}

fn read_artifact(what: &'static str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| match err.kind() {
        IoErrorKind::NotFound => RiskError::ArtifactNotFound {
            what,
            path: path.to_path_buf(),
            hint: TRAIN_HINT,
        },
        _ => RiskError::Io(err),
    })
}

/// Load a model, verifying it against `hash_path` when that file exists.
pub fn load_model(path: &Path, hash_path: Option<&Path>) -> Result<RiskModel> {
    let bytes = read_artifact("Model", path)?;

    if let Some(hash_path) = hash_path.filter(|p| p.exists()) {
        let expected = fs::read_to_string(hash_path)?.trim().to_string();
        let actual = content_hash(&bytes);
        if expected != actual {
            return Err(RiskError::IntegrityMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
    }

    let model: RiskModel = serde_json::from_slice(&bytes)?;
    if !model.is_fitted() {
        return Err(RiskError::Config(format!(
            "model artifact {} holds an unfitted model",
            path.display()
        )));
    }
    info!("Loaded model {} from {}", model.model_version, path.display());
    Ok(model)
}

/// Load a metrics report; the file must hold a JSON object.
pub fn load_metrics(path: &Path) -> Result<MetricsReport> {
    let bytes = read_artifact("Metrics", path)?;
    let value: Value = serde_json::from_slice(&bytes)?;
    if !value.is_object() {
        return Err(RiskError::MetricsNotObject(path.to_path_buf()));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, LogisticParams};
    use tempfile::tempdir;

    fn fitted_model() -> RiskModel {
        let mut model = RiskModel::new(Some(vec!["heart_rate".into()]), LogisticParams::default());
        model
            .fit(&[vec![60.0], vec![65.0], vec![120.0], vec![130.0]], &[0, 0, 1, 1])
            .unwrap();
        model
    }

    #[test]
    fn test_round_trip_with_hash() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ArtifactStore::new(ArtifactPaths::in_dir(dir.path().join("artifacts")));
        let model = fitted_model();
        let metrics = MetricsReport {
            accuracy: Some(0.85),
            threshold: Some(0.42),
            feature_names: Some(vec!["heart_rate".into()]),
            ..Default::default()
        };

        let saved = store.save_all(&model, &metrics, &serde_json::json!({"n_test": 4}))?;
        assert!(saved.model_path.exists());
        assert!(saved.hash_path.exists());
        assert!(saved.metrics_path.exists());
        assert!(saved.report_path.exists());

        assert_eq!(store.load_model()?, model);
        assert_eq!(store.load_metrics()?, metrics);
        Ok(())
    }

    #[test]
    fn test_tampered_model_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ArtifactStore::new(ArtifactPaths::in_dir(dir.path()));
        store.save_model(&fitted_model())?;
        let path = store.paths().model_path();
        let text = fs::read_to_string(&path)?.replace("heart_rate", "pulse_rate");
        fs::write(&path, text)?;
        assert!(matches!(
            store.load_model(),
            Err(RiskError::IntegrityMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_artifacts() {
        let err = load_model(Path::new("/nonexistent/model.json"), None).unwrap_err();
        assert!(err.to_string().contains("Run: vitalrisk-train"));
        let err = load_metrics(Path::new("/nonexistent/path/metrics.json")).unwrap_err();
        assert!(matches!(err, RiskError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_metrics_not_object() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("metrics.json");
        fs::write(&path, r#"["not", "a", "dict"]"#)?;
        let err = load_metrics(&path).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
        Ok(())
    }

    #[test]
    fn test_malformed_bucket_thresholds_fall_back() -> anyhow::Result<()> {
        use crate::age::{resolve_threshold, AgeGroup};
        use crate::features::payload_from_value;

        let dir = tempdir()?;
        let path = dir.path().join("metrics.json");
        fs::write(
            &path,
            r#"{"threshold": 0.5, "feature_names": ["age_years"],
                "age_group_thresholds": {"senior": "0.55", "adult": "x", "teen": null}}"#,
        )?;
        let metrics = load_metrics(&path)?;
        let thresholds = metrics.age_group_thresholds.clone().unwrap_or_default();
        assert_eq!(thresholds.get(AgeGroup::Senior), Some(0.55));
        assert_eq!(thresholds.adult, None);

        let senior = payload_from_value(serde_json::json!({"age_years": 70}))?;
        let adult = payload_from_value(serde_json::json!({"age_years": 30}))?;
        assert_eq!(resolve_threshold(&metrics, &senior, 0.5), 0.55);
        assert_eq!(resolve_threshold(&metrics, &adult, 0.42), 0.42);
        Ok(())
    }

    #[test]
    fn test_non_object_bucket_map_is_ignored() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("metrics.json");
        fs::write(&path, r#"{"threshold": "0.4", "age_group_thresholds": [0.5]}"#)?;
        let metrics = load_metrics(&path)?;
        assert_eq!(metrics.threshold, Some(0.4));
        assert_eq!(metrics.age_group_thresholds, None);
        Ok(())
    }
}
