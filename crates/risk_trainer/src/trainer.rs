//! Fit, held-out evaluation and operating-threshold search
//!
//! One call to [`Trainer::train`] validates the dataset, splits it with a
//! seeded stratified split, fits the standardized logistic model on the
//! training side and scores the held-out side. Reported metrics use the
//! reference cutoff; the persisted operating threshold is the F1-maximizing
//! cutoff on held-out probabilities, with per-age-bucket refinements where a
//! bucket has enough held-out rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vitalrisk_core::metrics::threshold_sweep;
use vitalrisk_core::model::{Classifier, LogisticParams, RiskModel};
use vitalrisk_core::{
    best_threshold, roc_auc, AgeGroup, AgeGroupThresholds, ClassificationScores, ConfusionMatrix,
    MetricsReport, ThresholdPoint,
};

use crate::dataset::Dataset;
use crate::deterministic::stratified_split;
use crate::errors::{Result, TrainerError};

const AGE_COLUMN: &str = "age_years";
const SWEEP_STEP: f64 = 0.05;

/// Training configuration
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingParams {
    /// Seed for the stratified split
    pub seed: u64,
    /// Cutoff for accuracy/precision/recall/F1 and the confusion matrix
    pub reference_threshold: f64,
    pub test_fraction: f64,
    /// Held-out rows a bucket needs before it gets its own threshold
    pub min_group_samples: usize,
    /// Columns that must be present in every training dataset
    pub required_columns: Vec<String>,
    pub logistic: LogisticParams,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            seed: 7,
            reference_threshold: 0.5,
            test_fraction: 0.25,
            min_group_samples: 20,
            required_columns: vec![AGE_COLUMN.to_string()],
            logistic: LogisticParams::default(),
        }
    }
}

/// Held-out support for one age bucket
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSupport {
    pub group: AgeGroup,
    pub n: usize,
    pub positives: usize,
    /// Bucket threshold, when the bucket qualified for one
    pub threshold: Option<f64>,
}

/// Detailed evaluation written next to the metrics report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
    pub n_train: usize,
    pub n_test: usize,
    pub reference_threshold: f64,
    pub selected_threshold: f64,
    pub at_reference: ClassificationScores,
    pub at_selected: ClassificationScores,
    pub confusion_at_selected: ConfusionMatrix,
    pub roc_auc: Option<f64>,
    pub threshold_sweep: Vec<ThresholdPoint>,
    pub age_groups: Vec<GroupSupport>,
    pub model_iterations: usize,
}

/// Everything one training run produces
#[derive(Clone, Debug)]
pub struct TrainOutput {
    pub model: RiskModel,
    pub metrics: MetricsReport,
    pub eval_report: EvaluationReport,
}

/// Logistic-model trainer
pub struct Trainer {
    params: TrainingParams,
}

impl Trainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Train on `dataset` and evaluate on a held-out partition.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainOutput> {
        self.validate(dataset)?;

        let split = stratified_split(&dataset.targets, self.params.test_fraction, self.params.seed)?;
        let (x_train, y_train) = take_rows(dataset, &split.train);
        let (x_test, y_test) = take_rows(dataset, &split.test);
        info!(
            "Split {} rows: {} train / {} held-out (seed {})",
            dataset.len(),
            x_train.len(),
            x_test.len(),
            self.params.seed
        );

        let mut model = RiskModel::new(Some(dataset.columns.clone()), self.params.logistic);
        model.fit(&x_train, &y_train)?;
        info!("Model fitted in {} Newton iterations", model.n_iter);

        let proba = model.predict_proba(&x_test)?;
        let reference = self.params.reference_threshold;
        let cm_reference = ConfusionMatrix::at_threshold(&y_test, &proba, reference);
        let scores = cm_reference.scores();
        let auc = roc_auc(&y_test, &proba);

        let threshold = best_threshold(&y_test, &proba);
        let cm_selected = ConfusionMatrix::at_threshold(&y_test, &proba, threshold);
        info!(
            "Held-out: accuracy {:.3}, f1 {:.3}, roc_auc {:.3}; selected threshold {:.2}",
            scores.accuracy,
            scores.f1,
            auc.unwrap_or(f64::NAN),
            threshold
        );

        let (age_group_thresholds, age_groups) = match dataset.column_index(AGE_COLUMN) {
            Some(age_idx) => self.group_thresholds(&x_test, &y_test, &proba, age_idx),
            None => {
                warn!("No {AGE_COLUMN} column; skipping per-bucket thresholds");
                (AgeGroupThresholds::default(), Vec::new())
            }
        };

        let metrics = MetricsReport {
            accuracy: Some(scores.accuracy),
            precision: Some(scores.precision),
            recall: Some(scores.recall),
            f1: Some(scores.f1),
            roc_auc: auc,
            confusion_matrix: Some(cm_reference),
            threshold: Some(threshold),
            age_group_thresholds: Some(age_group_thresholds),
            feature_names: Some(dataset.columns.clone()),
            n_rows: Some(dataset.len()),
            n_features: Some(dataset.feature_count()),
            positive_rate: Some(dataset.positive_rate()),
        };

        let eval_report = EvaluationReport {
            trained_at: Utc::now(),
            seed: self.params.seed,
            n_train: x_train.len(),
            n_test: x_test.len(),
            reference_threshold: reference,
            selected_threshold: threshold,
            at_reference: scores,
            at_selected: cm_selected.scores(),
            confusion_at_selected: cm_selected,
            roc_auc: auc,
            threshold_sweep: threshold_sweep(&y_test, &proba, SWEEP_STEP),
            age_groups,
            model_iterations: model.n_iter,
        };

        Ok(TrainOutput {
            model,
            metrics,
            eval_report,
        })
    }

    fn validate(&self, dataset: &Dataset) -> Result<()> {
        if let Some(missing) = self
            .params
            .required_columns
            .iter()
            .find(|c| dataset.column_index(c).is_none())
        {
            return Err(TrainerError::MissingColumn(missing.clone()));
        }
        if dataset.is_empty() {
            return Err(TrainerError::EmptyDataset);
        }
        if dataset.columns.is_empty() {
            return Err(TrainerError::NoFeatures);
        }
        for (row, values) in dataset.features.iter().enumerate() {
            if let Some(col) = values.iter().position(|v| !v.is_finite()) {
                return Err(TrainerError::NonFiniteValue {
                    column: dataset.columns[col].clone(),
                    row: row + 1,
                });
            }
        }
        let first = dataset.targets[0];
        if dataset.targets.iter().all(|&y| y == first) {
            return Err(TrainerError::SingleClass(first));
        }
        Ok(())
    }

    /// Best threshold per bucket over held-out rows. A bucket qualifies with
    /// at least `min_group_samples` rows containing both classes.
    fn group_thresholds(
        &self,
        x_test: &[Vec<f64>],
        y_test: &[u8],
        proba: &[f64],
        age_idx: usize,
    ) -> (AgeGroupThresholds, Vec<GroupSupport>) {
        let mut thresholds = AgeGroupThresholds::default();
        let mut support = Vec::with_capacity(AgeGroup::ALL.len());

        for group in AgeGroup::ALL {
            let (y, p): (Vec<u8>, Vec<f64>) = x_test
                .iter()
                .zip(y_test.iter().zip(proba))
                .filter(|(row, _)| AgeGroup::from_age(row[age_idx]) == Some(group))
                .map(|(_, (&y, &p))| (y, p))
                .unzip();

            let positives = y.iter().filter(|&&v| v == 1).count();
            let qualifies =
                y.len() >= self.params.min_group_samples && positives > 0 && positives < y.len();
            let threshold = qualifies.then(|| best_threshold(&y, &p));
            match threshold {
                Some(t) => debug!(%group, n = y.len(), positives, threshold = t, "bucket threshold"),
                None => debug!(%group, n = y.len(), positives, "bucket falls back to global threshold"),
            }

            thresholds.set(group, threshold);
            support.push(GroupSupport {
                group,
                n: y.len(),
                positives,
                threshold,
            });
        }
        (thresholds, support)
    }
}

fn take_rows(dataset: &Dataset, idx: &[usize]) -> (Vec<Vec<f64>>, Vec<u8>) {
    idx.iter()
        .map(|&i| (dataset.features[i].clone(), dataset.targets[i]))
        .unzip()
}

/// Train with default parameters apart from the split seed and reference cutoff.
pub fn train_model(dataset: &Dataset, seed: u64, reference_threshold: f64) -> Result<TrainOutput> {
    Trainer::new(TrainingParams {
        seed,
        reference_threshold,
        ..Default::default()
    })
    .train(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::make_synthetic_data;

    fn tiny(columns: &[&str], rows: Vec<Vec<f64>>, targets: Vec<u8>) -> Dataset {
        Dataset {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            features: rows,
            targets,
        }
    }

    #[test]
    fn test_missing_age_column() {
        let ds = tiny(&["heart_rate"], vec![vec![70.0], vec![80.0]], vec![0, 1]);
        let err = train_model(&ds, 42, 0.5).unwrap_err();
        assert!(err.to_string().contains("age_years"));
        assert!(matches!(err, TrainerError::MissingColumn(_)));
    }

    #[test]
    fn test_single_class_rejected() {
        let ds = tiny(
            &["age_years", "heart_rate"],
            vec![vec![30.0, 70.0], vec![40.0, 72.0], vec![50.0, 75.0]],
            vec![0, 0, 0],
        );
        assert!(matches!(
            train_model(&ds, 1, 0.5),
            Err(TrainerError::SingleClass(0))
        ));
    }

    #[test]
    fn test_empty_and_non_finite() {
        let empty = tiny(&["age_years"], Vec::new(), Vec::new());
        assert!(matches!(train_model(&empty, 1, 0.5), Err(TrainerError::EmptyDataset)));

        let nan = tiny(
            &["age_years", "heart_rate"],
            vec![vec![30.0, 70.0], vec![40.0, f64::NAN]],
            vec![0, 1],
        );
        let err = train_model(&nan, 1, 0.5).unwrap_err();
        assert!(err.to_string().contains("heart_rate"));
    }

    #[test]
    fn test_metrics_and_report() -> anyhow::Result<()> {
        let ds = make_synthetic_data(600, 30);
        let out = train_model(&ds, 42, 0.5)?;
        let m = &out.metrics;

        for v in [m.accuracy, m.precision, m.recall, m.f1, m.roc_auc] {
            let v = v.unwrap();
            assert!((0.0..=1.0).contains(&v));
        }
        let t = m.threshold.unwrap();
        assert!(t > 0.0 && t < 1.0);
        assert_eq!(m.feature_names.as_ref().unwrap(), &ds.columns);
        assert_eq!(m.n_rows, Some(600));
        assert_eq!(m.n_features, Some(ds.columns.len()));

        let cm = m.confusion_matrix.unwrap();
        assert_eq!(cm.total() as usize, out.eval_report.n_test);
        assert_eq!(out.eval_report.n_train + out.eval_report.n_test, 600);
        assert_eq!(out.eval_report.threshold_sweep.len(), 19);
        assert_eq!(out.eval_report.age_groups.len(), 5);

        let thresholds = m.age_group_thresholds.as_ref().unwrap();
        for support in &out.eval_report.age_groups {
            assert_eq!(thresholds.get(support.group), support.threshold);
            if support.n < 20 {
                assert!(support.threshold.is_none());
            }
        }
        Ok(())
    }

    #[test]
    fn test_training_is_deterministic() -> anyhow::Result<()> {
        let ds = make_synthetic_data(400, 20);
        let a = train_model(&ds, 42, 0.5)?;
        let b = train_model(&ds, 42, 0.5)?;
        assert_eq!(a.model, b.model);
        assert_eq!(a.metrics, b.metrics);
        Ok(())
    }

    #[test]
    fn test_model_learns_signal() -> anyhow::Result<()> {
        let ds = make_synthetic_data(2000, 7);
        let out = train_model(&ds, 7, 0.5)?;
        let auc = out.metrics.roc_auc.unwrap();
        assert!(auc > 0.75, "roc_auc {auc}");
        Ok(())
    }

    #[test]
    fn test_custom_required_columns() -> anyhow::Result<()> {
        let ds = crate::synthetic::make_synthetic_profile(
            crate::synthetic::SyntheticProfile::Activity,
            800,
            5,
        )?;
        let trainer = Trainer::new(TrainingParams {
            required_columns: vec!["commits_7d".into()],
            ..Default::default()
        });
        let out = trainer.train(&ds)?;
        assert!(out.eval_report.age_groups.is_empty());
        assert_eq!(out.metrics.age_group_thresholds, Some(AgeGroupThresholds::default()));
        Ok(())
    }
}
