//! Life-stage buckets and the age-adaptive decision threshold

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

use crate::features::{numeric_value, Payload, AGE_YEARS};
use crate::metrics::MetricsReport;

/// Ordered life-stage bucket derived from `age_years`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Neonate,
    Child,
    Teen,
    Adult,
    Senior,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        AgeGroup::Neonate,
        AgeGroup::Child,
        AgeGroup::Teen,
        AgeGroup::Adult,
        AgeGroup::Senior,
    ];

    /// Bucket for an age in years using half-open intervals
    /// `[0,1) [1,13) [13,18) [18,65) [65,inf)`.
    ///
    /// Negative and non-finite ages have no bucket.
    pub fn from_age(age_years: f64) -> Option<Self> {
        if !age_years.is_finite() || age_years < 0.0 {
            return None;
        }
        let group = if age_years < 1.0 {
            AgeGroup::Neonate
        } else if age_years < 13.0 {
            AgeGroup::Child
        } else if age_years < 18.0 {
            AgeGroup::Teen
        } else if age_years < 65.0 {
            AgeGroup::Adult
        } else {
            AgeGroup::Senior
        };
        Some(group)
    }

    /// Bucket for a payload's `age_years`, if present and numeric.
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        payload
            .get(AGE_YEARS)
            .and_then(numeric_value)
            .and_then(Self::from_age)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Neonate => "neonate",
            AgeGroup::Child => "child",
            AgeGroup::Teen => "teen",
            AgeGroup::Adult => "adult",
            AgeGroup::Senior => "senior",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-bucket decision thresholds. A bucket without an entry falls back to
/// the global default at resolution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeGroupThresholds {
    #[serde(
        default,
        deserialize_with = "lenient_threshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub neonate: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_threshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub child: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_threshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub teen: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_threshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub adult: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_threshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub senior: Option<f64>,
}

/// Reads a stored threshold. Numeric strings are accepted; any other
/// non-numeric value becomes `None` and resolves to the global default.
pub(crate) fn lenient_threshold<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    let threshold = numeric_value(&value);
    if threshold.is_none() {
        warn!("Ignoring non-numeric threshold {value}");
    }
    Ok(threshold)
}

/// Reads the per-bucket map; anything but an object is ignored.
pub(crate) fn lenient_thresholds<'de, D>(
    deserializer: D,
) -> Result<Option<AgeGroupThresholds>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value @ Value::Object(_) => AgeGroupThresholds::deserialize(value)
            .map(Some)
            .map_err(D::Error::custom),
        other => {
            warn!("Ignoring age_group_thresholds that is not an object: {other}");
            Ok(None)
        }
    }
}

impl AgeGroupThresholds {
    /// Usable threshold for `group`: present, finite and strictly inside (0, 1).
    pub fn get(&self, group: AgeGroup) -> Option<f64> {
        let value = match group {
            AgeGroup::Neonate => self.neonate,
            AgeGroup::Child => self.child,
            AgeGroup::Teen => self.teen,
            AgeGroup::Adult => self.adult,
            AgeGroup::Senior => self.senior,
        };
        value.filter(|t| is_valid_threshold(*t))
    }

    pub fn set(&mut self, group: AgeGroup, threshold: Option<f64>) {
        let slot = match group {
            AgeGroup::Neonate => &mut self.neonate,
            AgeGroup::Child => &mut self.child,
            AgeGroup::Teen => &mut self.teen,
            AgeGroup::Adult => &mut self.adult,
            AgeGroup::Senior => &mut self.senior,
        };
        *slot = threshold;
    }

    pub fn is_empty(&self) -> bool {
        AgeGroup::ALL.iter().all(|g| self.get(*g).is_none())
    }
}

pub fn is_valid_threshold(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value < 1.0
}

/// Decision threshold for a payload.
///
/// Returns the bucket-specific threshold from `metrics` when the payload has a
/// numeric `age_years` and the report carries a usable entry for that bucket;
/// in every other case returns `default_threshold`. Never fails.
pub fn resolve_threshold(metrics: &MetricsReport, payload: &Payload, default_threshold: f64) -> f64 {
    AgeGroup::from_payload(payload)
        .and_then(|group| {
            metrics
                .age_group_thresholds
                .as_ref()
                .and_then(|thresholds| thresholds.get(group))
        })
        .unwrap_or(default_threshold)
}
