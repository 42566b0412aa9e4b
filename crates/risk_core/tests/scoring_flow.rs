//! End-to-end scoring: fit a model, persist it, reload it and score
//! payloads written with serving-side field names.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;
use vitalrisk_core::{
    payload_from_value, resolve_threshold, AgeGroup, AgeGroupThresholds, ArtifactPaths,
    ArtifactStore, Classifier, LogisticParams, MetricsReport, RiskError, RiskModel, Scorer,
};

const FEATURES: [&str; 5] = [
    "age_years",
    "bp_systolic",
    "bp_diastolic",
    "pulse_pressure",
    "oxygen_saturation",
];

fn training_rows() -> (Vec<Vec<f64>>, Vec<u8>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for i in 0..40 {
        let age = 20.0 + i as f64 * 1.5;
        let unwell = i % 4 == 0;
        let sys = if unwell { 165.0 } else { 118.0 } + (i % 7) as f64;
        let dia = if unwell { 95.0 } else { 76.0 } + (i % 3) as f64;
        let spo2 = if unwell { 89.0 } else { 97.0 } + (i % 2) as f64;
        x.push(vec![age, sys, dia, sys - dia, spo2]);
        y.push(u8::from(unwell));
    }
    (x, y)
}

fn fitted() -> Result<RiskModel> {
    let names = FEATURES.iter().map(|s| s.to_string()).collect();
    let mut model = RiskModel::new(Some(names), LogisticParams::default());
    let (x, y) = training_rows();
    model.fit(&x, &y)?;
    Ok(model)
}

fn metrics() -> MetricsReport {
    MetricsReport {
        threshold: Some(0.5),
        age_group_thresholds: Some(AgeGroupThresholds {
            senior: Some(0.55),
            child: Some(0.45),
            ..Default::default()
        }),
        feature_names: Some(FEATURES.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    }
}

#[test]
fn test_aliases_and_derived_pulse_pressure() -> Result<()> {
    let scorer = Scorer::new(Arc::new(fitted()?), metrics(), 0.5)?;
    let payload = payload_from_value(json!({
        "age_years": 70,
        "systolic_bp": 170,
        "diastolic_bp": 96,
        "spo2_pct": 88,
        "height_ft": 5
    }))?;

    let decision = scorer.score(&payload)?;
    assert_eq!(decision.threshold, 0.55);
    assert_eq!(decision.age_group, Some(AgeGroup::Senior));
    assert!(decision.flagged());
    assert!(!decision.reasons.is_empty());
    Ok(())
}

#[test]
fn test_missing_bp_is_reported_at_vectorization() -> Result<()> {
    let scorer = Scorer::new(Arc::new(fitted()?), metrics(), 0.5)?;
    let payload = payload_from_value(json!({
        "age_years": 30,
        "bp_systolic": "high",
        "oxygen_saturation": 97
    }))?;
    match scorer.score(&payload) {
        Err(RiskError::MissingFeatures(missing)) => {
            assert_eq!(missing, vec!["bp_diastolic", "pulse_pressure"]);
        }
        other => panic!("expected missing features, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_threshold_fallbacks() -> Result<()> {
    let report = metrics();
    let cases = [
        (json!({"age_years": 70}), 0.55),
        (json!({"age_years": 30}), 0.5),
        (json!({"age_years": "unknown"}), 0.5),
        (json!({}), 0.5),
        (json!({"age_years": 5}), 0.45),
    ];
    for (payload, expected) in cases {
        let payload = payload_from_value(payload)?;
        assert_eq!(resolve_threshold(&report, &payload, 0.5), expected);
    }
    let payload = payload_from_value(json!({"age_years": 70}))?;
    assert_eq!(resolve_threshold(&MetricsReport::default(), &payload, 0.5), 0.5);
    Ok(())
}

#[test]
fn test_persisted_artifacts_score_identically() -> Result<()> {
    let model = fitted()?;
    let dir = tempdir()?;
    let store = ArtifactStore::new(ArtifactPaths::in_dir(dir.path()));
    store.save_all(&model, &metrics(), &json!({"note": "fixture"}))?;

    let in_memory = Scorer::new(Arc::new(model), metrics(), 0.5)?;
    let reloaded = Scorer::from_store(&store, 0.5)?;
    let payload = payload_from_value(json!({
        "age_years": 45,
        "bp_systolic": 130,
        "bp_diastolic": 84,
        "oxygen_saturation": 95
    }))?;
    assert_eq!(in_memory.score(&payload)?, reloaded.score(&payload)?);
    Ok(())
}
