//! Synthetic labeled data for development and tests
//!
//! Both profiles label rows the same way: five boolean risk indicators are
//! weighted 0.35/0.25/0.20/0.10/0.10, Gaussian noise N(0, 0.15) is added and
//! the sum is cut at 0.55. Output is a pure function of `(profile, n, seed)`:
//! a single `StdRng` is seeded once and every column is drawn in a fixed order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson, StandardNormal};
use std::fmt;
use std::str::FromStr;
use vitalrisk_core::AgeGroup;

use crate::dataset::Dataset;
use crate::errors::{Result, TrainerError};

const INDICATOR_WEIGHTS: [f64; 5] = [0.35, 0.25, 0.20, 0.10, 0.10];
const LABEL_NOISE_SD: f64 = 0.15;
const LABEL_CUTOFF: f64 = 0.55;

pub const VITALS_COLUMNS: [&str; 9] = [
    "age_years",
    "bp_systolic",
    "bp_diastolic",
    "pulse_pressure",
    "heart_rate",
    "respiratory_rate",
    "temperature",
    "oxygen_saturation",
    "pain_level",
];

pub const ACTIVITY_COLUMNS: [&str; 6] = [
    "commits_7d",
    "prs_7d",
    "issues_7d",
    "reviews_7d",
    "active_days_14d",
    "repo_age_days",
];

/// Which predictor set to generate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyntheticProfile {
    /// Clinical vitals with an `age_years` column
    #[default]
    Vitals,
    /// Repository activity counts over rolling windows
    Activity,
}

impl SyntheticProfile {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            SyntheticProfile::Vitals => &VITALS_COLUMNS,
            SyntheticProfile::Activity => &ACTIVITY_COLUMNS,
        }
    }
}

impl fmt::Display for SyntheticProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntheticProfile::Vitals => f.write_str("vitals"),
            SyntheticProfile::Activity => f.write_str("activity"),
        }
    }
}

impl FromStr for SyntheticProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vitals" => Ok(SyntheticProfile::Vitals),
            "activity" => Ok(SyntheticProfile::Activity),
            other => Err(format!("unknown profile '{other}', expected vitals or activity")),
        }
    }
}

/// Vitals dataset of `n` rows.
pub fn make_synthetic_data(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let (columns, indicators) = vitals_columns(&mut rng, n);
    assemble(SyntheticProfile::Vitals, &mut rng, columns, &indicators)
}

pub fn make_synthetic_profile(profile: SyntheticProfile, n: usize, seed: u64) -> Result<Dataset> {
    match profile {
        SyntheticProfile::Vitals => Ok(make_synthetic_data(n, seed)),
        SyntheticProfile::Activity => {
            let mut rng = StdRng::seed_from_u64(seed);
            let (columns, indicators) = activity_columns(&mut rng, n)?;
            Ok(assemble(profile, &mut rng, columns, &indicators))
        }
    }
}

fn assemble(
    profile: SyntheticProfile,
    rng: &mut StdRng,
    columns: Vec<Vec<f64>>,
    indicators: &[[bool; 5]],
) -> Dataset {
    let n = indicators.len();
    let targets = label(rng, indicators);

    let features = (0..n)
        .map(|i| columns.iter().map(|col| col[i]).collect())
        .collect();
    Dataset {
        columns: profile.columns().iter().map(|c| c.to_string()).collect(),
        features,
        targets,
    }
}

/// Weighted indicator sum plus noise, cut at [`LABEL_CUTOFF`].
fn label(rng: &mut StdRng, indicators: &[[bool; 5]]) -> Vec<u8> {
    let noise: Vec<f64> = (0..indicators.len())
        .map(|_| normal(rng, 0.0, LABEL_NOISE_SD))
        .collect();
    indicators
        .iter()
        .zip(noise)
        .map(|(flags, eps)| {
            let score: f64 = flags
                .iter()
                .zip(INDICATOR_WEIGHTS)
                .filter(|(flag, _)| **flag)
                .map(|(_, w)| w)
                .sum();
            u8::from(score + eps >= LABEL_CUTOFF)
        })
        .collect()
}

fn counts(rng: &mut StdRng, n: usize, lambda: f64) -> Result<Vec<f64>> {
    let dist = Poisson::new(lambda).map_err(|e| TrainerError::Sampler(e.to_string()))?;
    Ok((0..n).map(|_| dist.sample(rng)).collect())
}

fn activity_columns(rng: &mut StdRng, n: usize) -> Result<(Vec<Vec<f64>>, Vec<[bool; 5]>)> {
    let commits = counts(rng, n, 12.0)?;
    let prs = counts(rng, n, 3.0)?;
    let issues = counts(rng, n, 4.0)?;
    let reviews = counts(rng, n, 6.0)?;
    let active_days: Vec<f64> = (0..n).map(|_| rng.gen_range(1..15) as f64).collect();
    let repo_age: Vec<f64> = (0..n).map(|_| rng.gen_range(30..3000) as f64).collect();

    let indicators = (0..n)
        .map(|i| {
            [
                commits[i] < 6.0,
                prs[i] < 2.0,
                reviews[i] < 3.0,
                active_days[i] < 5.0,
                issues[i] > 8.0,
            ]
        })
        .collect();

    Ok((
        vec![commits, prs, issues, reviews, active_days, repo_age],
        indicators,
    ))
}

/// Resting norms per life stage: (heart rate centre, heart rate range,
/// respiratory rate centre, respiratory rate range, systolic centre).
struct StageNorms {
    hr_centre: f64,
    hr_range: (f64, f64),
    rr_centre: f64,
    rr_range: (f64, f64),
    systolic_centre: f64,
}

fn stage_norms(group: AgeGroup) -> StageNorms {
    match group {
        AgeGroup::Neonate => StageNorms {
            hr_centre: 130.0,
            hr_range: (100.0, 160.0),
            rr_centre: 40.0,
            rr_range: (30.0, 60.0),
            systolic_centre: 80.0,
        },
        AgeGroup::Child => StageNorms {
            hr_centre: 95.0,
            hr_range: (70.0, 120.0),
            rr_centre: 22.0,
            rr_range: (18.0, 30.0),
            systolic_centre: 100.0,
        },
        AgeGroup::Teen => StageNorms {
            hr_centre: 78.0,
            hr_range: (60.0, 100.0),
            rr_centre: 16.0,
            rr_range: (12.0, 20.0),
            systolic_centre: 112.0,
        },
        AgeGroup::Adult => StageNorms {
            hr_centre: 75.0,
            hr_range: (60.0, 100.0),
            rr_centre: 16.0,
            rr_range: (12.0, 20.0),
            systolic_centre: 122.0,
        },
        AgeGroup::Senior => StageNorms {
            hr_centre: 72.0,
            hr_range: (60.0, 100.0),
            rr_centre: 17.0,
            rr_range: (12.0, 20.0),
            systolic_centre: 138.0,
        },
    }
}

/// Life-stage mix of the generated population and each stage's age span.
const STAGE_MIX: [(AgeGroup, f64, f64, f64); 5] = [
    (AgeGroup::Neonate, 0.05, 0.0, 1.0),
    (AgeGroup::Child, 0.15, 1.0, 13.0),
    (AgeGroup::Teen, 0.10, 13.0, 18.0),
    (AgeGroup::Adult, 0.45, 18.0, 65.0),
    (AgeGroup::Senior, 0.25, 65.0, 100.0),
];

/// Share of patients drawn from the deteriorating population.
const UNWELL_RATE: f64 = 0.25;

fn vitals_columns(rng: &mut StdRng, n: usize) -> (Vec<Vec<f64>>, Vec<[bool; 5]>) {
    let ages: Vec<f64> = (0..n).map(|_| sample_age(rng)).collect();
    let groups: Vec<AgeGroup> = ages
        .iter()
        .map(|&a| AgeGroup::from_age(a).unwrap_or(AgeGroup::Adult))
        .collect();
    let unwell: Vec<bool> = (0..n).map(|_| rng.gen::<f64>() < UNWELL_RATE).collect();
    let shift = |i: usize, amount: f64| if unwell[i] { amount } else { 0.0 };

    let systolic: Vec<f64> = (0..n)
        .map(|i| {
            let centre = stage_norms(groups[i]).systolic_centre + shift(i, 25.0);
            normal(rng, centre, 15.0).round().clamp(80.0, 200.0)
        })
        .collect();
    let diastolic: Vec<f64> = (0..n)
        .map(|i| {
            let raw = (systolic[i] * 0.6 + normal(rng, 6.0, 6.0)).round();
            raw.min(systolic[i] - 10.0).clamp(50.0, 120.0)
        })
        .collect();
    let pulse_pressure: Vec<f64> = (0..n).map(|i| systolic[i] - diastolic[i]).collect();
    let heart_rate: Vec<f64> = (0..n)
        .map(|i| {
            let centre = stage_norms(groups[i]).hr_centre + shift(i, 25.0);
            normal(rng, centre, 12.0).round().clamp(40.0, 150.0)
        })
        .collect();
    let respiratory_rate: Vec<f64> = (0..n)
        .map(|i| {
            let centre = stage_norms(groups[i]).rr_centre + shift(i, 7.0);
            normal(rng, centre, 3.0).round().clamp(8.0, 70.0)
        })
        .collect();
    let temperature: Vec<f64> = (0..n)
        .map(|i| {
            let t = normal(rng, 98.4 + shift(i, 1.6), 0.7).clamp(95.0, 103.0);
            (t * 10.0).round() / 10.0
        })
        .collect();
    let oxygen_saturation: Vec<f64> = (0..n)
        .map(|i| {
            let drop = normal(rng, 0.0, 2.0).abs() + shift(i, 5.0);
            (98.5 - drop).round().clamp(80.0, 100.0)
        })
        .collect();
    let pain_level: Vec<f64> = (0..n).map(|_| rng.gen_range(0..=10) as f64).collect();

    let indicators = (0..n)
        .map(|i| {
            let norms = stage_norms(groups[i]);
            [
                oxygen_saturation[i] < 92.0,
                systolic[i] >= 160.0,
                outside(heart_rate[i], norms.hr_range),
                temperature[i] >= 100.4,
                outside(respiratory_rate[i], norms.rr_range),
            ]
        })
        .collect();

    (
        vec![
            ages,
            systolic,
            diastolic,
            pulse_pressure,
            heart_rate,
            respiratory_rate,
            temperature,
            oxygen_saturation,
            pain_level,
        ],
        indicators,
    )
}

fn outside(value: f64, (lo, hi): (f64, f64)) -> bool {
    value < lo || value > hi
}

/// Age in years, one decimal, drawn from [`STAGE_MIX`].
fn sample_age(rng: &mut StdRng) -> f64 {
    let u: f64 = rng.gen();
    let mut acc = 0.0;
    let (_, _, lo, hi) = STAGE_MIX
        .iter()
        .find(|(_, share, _, _)| {
            acc += share;
            u < acc
        })
        .copied()
        .unwrap_or(STAGE_MIX[STAGE_MIX.len() - 1]);
    let age = rng.gen_range(lo..hi);
    // truncate so rounding never lifts an age into the next stage
    (age * 10.0).floor() / 10.0
}

fn normal(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    mean + sd * z
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(ds: &Dataset, name: &str) -> Vec<f64> {
        ds.column(name).unwrap()
    }

    #[test]
    fn test_vitals_shape() {
        let ds = make_synthetic_data(100, 42);
        assert_eq!(ds.len(), 100);
        assert_eq!(ds.columns, VITALS_COLUMNS.map(String::from).to_vec());
        assert!(ds.targets.iter().all(|&y| y <= 1));
        assert!(ds.features.iter().all(|row| row.len() == VITALS_COLUMNS.len()));
    }

    #[test]
    fn test_activity_profile() {
        let ds = make_synthetic_profile(SyntheticProfile::Activity, 500, 7).unwrap();
        assert_eq!(ds.columns.len(), 6);
        assert!(ds.column("age_years").is_none());
        let active = column(&ds, "active_days_14d");
        assert!(active.iter().all(|&d| (1.0..15.0).contains(&d)));
        let age = column(&ds, "repo_age_days");
        assert!(age.iter().all(|&d| (30.0..3000.0).contains(&d)));
        assert!(column(&ds, "commits_7d").iter().all(|c| c.fract() == 0.0));
        assert!(ds.targets.contains(&0) && ds.targets.contains(&1));
    }

    #[test]
    fn test_vitals_have_both_classes() {
        let ds = make_synthetic_data(500, 25);
        let positives = ds.targets.iter().filter(|&&y| y == 1).count();
        assert!(positives > 25, "positives: {positives}");
        assert!(positives < 475, "positives: {positives}");
    }

    #[test]
    fn test_ages_stay_in_their_stage() {
        let ds = make_synthetic_data(1000, 3);
        let ages = column(&ds, "age_years");
        assert!(ages.iter().all(|&a| (0.0..100.0).contains(&a)));
        assert!(ages.iter().any(|&a| a < 1.0));
        assert!(ages.iter().any(|&a| a >= 65.0));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("Vitals".parse::<SyntheticProfile>(), Ok(SyntheticProfile::Vitals));
        assert_eq!("activity".parse::<SyntheticProfile>(), Ok(SyntheticProfile::Activity));
        assert!("sleep".parse::<SyntheticProfile>().is_err());
        assert_eq!(SyntheticProfile::default().to_string(), "vitals");
    }

    #[test]
    fn test_activity_counts_follow_their_rates() {
        let a = make_synthetic_profile(SyntheticProfile::Activity, 2000, 11).unwrap();
        let b = make_synthetic_profile(SyntheticProfile::Activity, 2000, 11).unwrap();
        assert_eq!(a, b);
        for (name, rate) in [("commits_7d", 12.0), ("prs_7d", 3.0), ("reviews_7d", 6.0)] {
            let values = column(&a, name);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            assert!((mean - rate).abs() < 0.5, "{name}: mean {mean}");
        }
    }

    #[test]
    fn test_invalid_rate_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(counts(&mut rng, 10, -1.0), Err(TrainerError::Sampler(_))));
    }
}
