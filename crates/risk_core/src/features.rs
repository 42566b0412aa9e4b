//! Payload reconciliation and vectorization
//!
//! Inference payloads arrive as loosely shaped JSON objects. Before a payload
//! can be scored it is reconciled against the ordered feature list the model
//! was trained on: alias names are mapped onto canonical ones, pulse pressure
//! is derived when it can be, and the result is read out in model order.
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use crate::errors::{Result, RiskError};

/// One inference request as received: feature name to (ideally numeric) value.
pub type Payload = Map<String, Value>;

/// One training row: feature name to numeric value.
pub type Record = BTreeMap<String, f64>;

/// Ordered numeric input in the model's feature order.
pub type FeatureVector = Vec<f64>;

pub const AGE_YEARS: &str = "age_years";
pub const PULSE_PRESSURE: &str = "pulse_pressure";
pub const BP_SYSTOLIC: &str = "bp_systolic";
pub const BP_DIASTOLIC: &str = "bp_diastolic";

const SYSTOLIC_KEYS: [&str; 2] = [BP_SYSTOLIC, "systolic_bp"];
const DIASTOLIC_KEYS: [&str; 2] = [BP_DIASTOLIC, "diastolic_bp"];

/// Canonical feature name and the payload spellings accepted for it.
pub const FEATURE_ALIASES: &[(&str, &[&str])] = &[
    (BP_SYSTOLIC, &["systolic_bp"]),
    (BP_DIASTOLIC, &["diastolic_bp"]),
    ("respiratory_rate", &["resp_rate"]),
    ("temperature", &["temp_f"]),
    ("oxygen_saturation", &["spo2_pct"]),
    ("pain_level", &["pain_0_10"]),
];

/// Interpret a JSON value as a finite real number.
///
/// Numbers and numeric strings qualify; booleans, nulls, arrays, objects and
/// non-finite values do not.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn first_numeric(payload: &Payload, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| numeric_value(value).is_some())
        .cloned()
}

/// `systolic - diastolic`, kept integral when both inputs are integers.
fn difference(systolic: &Value, diastolic: &Value) -> Option<Value> {
    if let (Some(s), Some(d)) = (systolic.as_i64(), diastolic.as_i64()) {
        return s.checked_sub(d).map(Value::from);
    }
    let s = numeric_value(systolic)?;
    let d = numeric_value(diastolic)?;
    Number::from_f64(s - d).map(Value::Number)
}

/// Reconcile a raw payload against the model's required features.
///
/// Every input key is preserved, including ones the model does not use.
/// Aliased spellings are copied onto their canonical names when the canonical
/// name is required and absent. `pulse_pressure` is derived only when it is
/// required, absent, and both blood-pressure components are numeric;
/// otherwise it stays absent and vectorization reports it.
pub fn coerce_payload(payload: &Payload, feature_names: &[String]) -> Payload {
    let mut out = payload.clone();
    let required = |name: &str| feature_names.iter().any(|f| f == name);

    for (canonical, aliases) in FEATURE_ALIASES {
        if !required(canonical) || out.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = aliases.iter().find_map(|alias| payload.get(*alias)) {
            out.insert((*canonical).to_string(), value.clone());
        }
    }

    if required(PULSE_PRESSURE) && !out.contains_key(PULSE_PRESSURE) {
        let systolic = first_numeric(&out, &SYSTOLIC_KEYS);
        let diastolic = first_numeric(&out, &DIASTOLIC_KEYS);
        if let (Some(s), Some(d)) = (systolic, diastolic) {
            if let Some(pp) = difference(&s, &d) {
                out.insert(PULSE_PRESSURE.to_string(), pp);
            }
        }
    }

    out
}

/// Read a reconciled payload out in `feature_names` order.
///
/// Fails with [`RiskError::MissingFeatures`] naming every absent feature, and
/// otherwise with [`RiskError::NonNumericFeature`] for the first value that is
/// not a finite number. Keys outside `feature_names` are ignored.
pub fn vectorize(payload: &Payload, feature_names: &[String]) -> Result<FeatureVector> {
    let missing: Vec<String> = feature_names
        .iter()
        .filter(|name| matches!(payload.get(name.as_str()), None | Some(Value::Null)))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(RiskError::MissingFeatures(missing));
    }

    feature_names
        .iter()
        .map(|name| {
            let raw = &payload[name.as_str()];
            numeric_value(raw).ok_or_else(|| RiskError::NonNumericFeature {
                name: name.clone(),
                value: raw.to_string(),
            })
        })
        .collect()
}

/// Parse a JSON document that must be a single object.
pub fn parse_payload(text: &str) -> Result<Payload> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| RiskError::InvalidPayload(format!("malformed JSON: {err}")))?;
    payload_from_value(value)
}

/// Accept an already parsed JSON value as a payload if it is an object.
pub fn payload_from_value(value: Value) -> Result<Payload> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RiskError::InvalidPayload(format!(
            "payload must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// View a numeric training record as a payload.
pub fn payload_from_record(record: &Record) -> Payload {
    record
        .iter()
        .filter_map(|(k, v)| Number::from_f64(*v).map(|n| (k.clone(), Value::Number(n))))
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
