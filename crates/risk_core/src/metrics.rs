//! Evaluation metrics and the persisted metrics report
//!
//! The report is written once per training run and read back by the scorer.
//! Every field is optional on read so independently produced or older
//! reports still load; the trainer always fills all of them.

use serde::{Deserialize, Serialize};

use crate::age::{lenient_threshold, lenient_thresholds, AgeGroupThresholds};

/// Threshold used when a search has nothing to go on.
pub const FALLBACK_THRESHOLD: f64 = 0.5;

/// Binary confusion matrix with named cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: u64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub tp: u64,
}

impl ConfusionMatrix {
    /// Tally predictions `proba >= threshold` against `y_true`.
    pub fn at_threshold(y_true: &[u8], proba: &[f64], threshold: f64) -> Self {
        let mut cm = Self::default();
        for (&y, &p) in y_true.iter().zip(proba) {
            match (y == 1, p >= threshold) {
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
                (true, true) => cm.tp += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> u64 {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Zero when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Zero when there are no actual positives.
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }

    pub fn scores(&self) -> ClassificationScores {
        ClassificationScores {
            accuracy: self.accuracy(),
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Threshold-dependent scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScores {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// One row of a threshold sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Area under the ROC curve via the rank-sum statistic, averaging tied ranks.
///
/// `None` when `y_true` holds a single class.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let n = y_true.len().min(scores.len());
    let n_pos = y_true[..n].iter().filter(|&&y| y == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block i..=j shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] == 1 {
                rank_sum_pos += mean_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Candidate cutoffs 0.01, 0.02, ..., 0.99.
pub fn threshold_grid() -> impl Iterator<Item = f64> {
    (1..=99).map(|i| i as f64 / 100.0)
}

/// Cutoff maximizing F1 on `(y_true, proba)`.
///
/// Candidates are the grid points that fall inside the observed probability
/// range (the full grid when the range is degenerate). The lowest cutoff wins
/// ties. When no cutoff yields a true positive the fallback of 0.5 is returned,
/// so the result always lies strictly inside (0, 1).
pub fn best_threshold(y_true: &[u8], proba: &[f64]) -> f64 {
    let (lo, hi) = proba
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));

    let mut candidates: Vec<f64> = threshold_grid().filter(|&t| t > lo && t <= hi).collect();
    if candidates.is_empty() {
        candidates = threshold_grid().collect();
    }

    let mut best = (FALLBACK_THRESHOLD, 0.0);
    for t in candidates {
        let f1 = ConfusionMatrix::at_threshold(y_true, proba, t).f1();
        if f1 > best.1 + 1e-12 {
            best = (t, f1);
        }
    }
    best.0
}

/// Precision/recall/F1 every `step` across (0, 1).
pub fn threshold_sweep(y_true: &[u8], proba: &[f64], step: f64) -> Vec<ThresholdPoint> {
    let steps = (1.0 / step).round() as usize;
    (1..steps)
        .map(|i| {
            let threshold = (i as f64 * step * 100.0).round() / 100.0;
            let cm = ConfusionMatrix::at_threshold(y_true, proba, threshold);
            ThresholdPoint {
                threshold,
                precision: cm.precision(),
                recall: cm.recall(),
                f1: cm.f1(),
            }
        })
        .collect()
}

/// Persisted summary of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roc_auc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confusion_matrix: Option<ConfusionMatrix>,
    /// Selected global operating threshold
    #[serde(
        deserialize_with = "lenient_threshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub threshold: Option<f64>,
    #[serde(
        deserialize_with = "lenient_thresholds",
        skip_serializing_if = "Option::is_none"
    )]
    pub age_group_thresholds: Option<AgeGroupThresholds>,
    /// Fitting column order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_features: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positive_rate: Option<f64>,
}

impl MetricsReport {
    /// Feature names if the report carries a non-empty list.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref().filter(|names| !names.is_empty())
    }
}
