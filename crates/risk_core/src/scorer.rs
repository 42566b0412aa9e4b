//! Online scoring: payload in, decision out
//!
//! A [`Scorer`] owns the loaded model and metrics report behind `Arc`s and is
//! never mutated after construction, so one instance can serve any number of
//! concurrent requests.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::age::{is_valid_threshold, resolve_threshold, AgeGroup};
use crate::artifacts::ArtifactStore;
use crate::errors::{Result, RiskError};
use crate::features::{coerce_payload, vectorize, Payload};
use crate::metrics::MetricsReport;
use crate::model::{Classifier, FeatureContribution};
use crate::MODEL_VERSION;

const MAX_REASONS: usize = 3;
/// Minimum |z| for a feature to be named in the reasons
const REASON_MIN_Z: f64 = 1.0;

/// Outcome of scoring one payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub risk_probability: f64,
    pub pred: u8,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<AgeGroup>,
    pub reasons: Vec<String>,
    pub model_version: String,
}

impl Decision {
    pub fn flagged(&self) -> bool {
        self.pred == 1
    }
}

/// Feature names in model order: the model's own record first, then the
/// metrics report.
pub fn resolve_feature_names(
    model_names: Option<&[String]>,
    metrics: &MetricsReport,
) -> Result<Vec<String>> {
    model_names
        .filter(|names| !names.is_empty())
        .or_else(|| metrics.feature_names())
        .map(<[String]>::to_vec)
        .ok_or(RiskError::FeatureNamesUnavailable)
}

/// Global cutoff: the trained threshold when usable, else `configured`.
pub fn default_threshold_for(metrics: &MetricsReport, configured: f64) -> f64 {
    metrics
        .threshold
        .filter(|t| is_valid_threshold(*t))
        .unwrap_or(configured)
}

/// Score `payload`, discovering feature names from `model` or `metrics`.
pub fn predict(
    model: &dyn Classifier,
    metrics: &MetricsReport,
    payload: &Payload,
    default_threshold: f64,
) -> Result<Decision> {
    let feature_names = resolve_feature_names(model.feature_names(), metrics)?;
    predict_with_features(model, &feature_names, metrics, payload, default_threshold)
}

/// Score `payload` against an explicit feature order.
pub fn predict_with_features(
    model: &dyn Classifier,
    feature_names: &[String],
    metrics: &MetricsReport,
    payload: &Payload,
    default_threshold: f64,
) -> Result<Decision> {
    let reconciled = coerce_payload(payload, feature_names);
    let x = vectorize(&reconciled, feature_names)?;

    let risk_probability = model
        .predict_proba(std::slice::from_ref(&x))?
        .first()
        .copied()
        .ok_or_else(|| RiskError::Model("model returned no probability".into()))?;

    let threshold = resolve_threshold(metrics, &reconciled, default_threshold);
    let age_group = AgeGroup::from_payload(&reconciled);
    let flagged = risk_probability >= threshold;

    let reasons = build_reasons(
        &model.explain(&x),
        feature_names,
        risk_probability,
        threshold,
        age_group,
    );
    debug!(risk_probability, threshold, flagged, "scored payload");

    Ok(Decision {
        risk_probability,
        pred: u8::from(flagged),
        threshold,
        age_group,
        reasons,
        model_version: MODEL_VERSION.to_string(),
    })
}

fn build_reasons(
    contributions: &[FeatureContribution],
    feature_names: &[String],
    probability: f64,
    threshold: f64,
    age_group: Option<AgeGroup>,
) -> Vec<String> {
    let mut notable: Vec<&FeatureContribution> = contributions
        .iter()
        .filter(|c| c.z_score.abs() >= REASON_MIN_Z)
        .collect();
    notable.sort_by(|a, b| {
        b.contribution
            .total_cmp(&a.contribution)
            .then(a.index.cmp(&b.index))
    });

    let mut reasons: Vec<String> = notable
        .into_iter()
        .filter_map(|c| {
            let name = feature_names.get(c.index)?;
            let direction = if c.z_score > 0.0 { "above" } else { "below" };
            Some(format!(
                "{name}={} is {direction} the training baseline ({:+.1} sd)",
                c.value, c.z_score
            ))
        })
        .take(MAX_REASONS)
        .collect();

    if reasons.is_empty() {
        let scope = age_group.map_or("default", |g| g.as_str());
        let relation = if probability >= threshold {
            "at or above"
        } else {
            "below"
        };
        reasons.push(format!(
            "Risk probability {probability:.2} is {relation} the {scope} threshold {threshold:.2}; no single vital deviates notably from the training baseline"
        ));
    }
    reasons
}

/// Loaded model plus metrics, ready to score.
#[derive(Clone)]
pub struct Scorer {
    model: Arc<dyn Classifier>,
    metrics: Arc<MetricsReport>,
    feature_names: Arc<[String]>,
    default_threshold: f64,
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorer")
            .field("feature_names", &self.feature_names)
            .field("default_threshold", &self.default_threshold)
            .finish_non_exhaustive()
    }
}

impl Scorer {
    /// Resolves feature names eagerly so a misconfigured artifact fails at
    /// startup rather than on the first request.
    pub fn new(
        model: Arc<dyn Classifier>,
        metrics: MetricsReport,
        configured_threshold: f64,
    ) -> Result<Self> {
        let feature_names = resolve_feature_names(model.feature_names(), &metrics)?;
        let default_threshold = default_threshold_for(&metrics, configured_threshold);
        info!(
            features = feature_names.len(),
            default_threshold, "Scorer ready"
        );
        Ok(Self {
            model,
            metrics: Arc::new(metrics),
            feature_names: feature_names.into(),
            default_threshold,
        })
    }

    pub fn from_store(store: &ArtifactStore, configured_threshold: f64) -> Result<Self> {
        let model = store.load_model()?;
        let metrics = store.load_metrics()?;
        Self::new(Arc::new(model), metrics, configured_threshold)
    }

    pub fn score(&self, payload: &Payload) -> Result<Decision> {
        predict_with_features(
            self.model.as_ref(),
            &self.feature_names,
            &self.metrics,
            payload,
            self.default_threshold,
        )
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    pub fn metrics(&self) -> &MetricsReport {
        &self.metrics
    }
}
