//! Classifier capability and the standardized logistic model
//!
//! The trainer and scorer only depend on [`Classifier`]; [`RiskModel`] is the
//! implementation shipped today: a standard scaler feeding an L2-regularized,
//! class-balanced logistic regression fitted with Newton iterations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, RiskError};
use crate::features::FeatureVector;

/// Anything that can be fitted on labeled rows and emit positive-class
/// probabilities.
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &[FeatureVector], y: &[u8]) -> Result<()>;

    fn predict_proba(&self, x: &[FeatureVector]) -> Result<Vec<f64>>;

    /// Training columns remembered by the model, if it records them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Per-feature pull towards the positive class for one input row.
    fn explain(&self, _x: &[f64]) -> Vec<FeatureContribution> {
        Vec::new()
    }
}

/// How far one feature sits from the training baseline and how much that
/// moves the log-odds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureContribution {
    pub index: usize,
    pub value: f64,
    pub z_score: f64,
    pub contribution: f64,
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Zero-mean, unit-variance scaling fitted on training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Population statistics per column; constant columns get scale 1.
    pub fn fit(x: &[FeatureVector]) -> Result<Self> {
        let width = check_matrix(x)?;
        let n = x.len() as f64;
        let mut mean = vec![0.0; width];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; width];
        for row in x {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        let scale = var
            .into_iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }
}

/// Logistic regression hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// Weight classes by `n / (2 * n_class)`
    pub balanced: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
            balanced: true,
        }
    }
}

/// Standardized logistic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    pub model_version: String,
    /// Columns the model was fitted on, in order
    pub feature_names: Option<Vec<String>>,
    pub params: LogisticParams,
    pub scaler: Option<StandardScaler>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub n_iter: usize,
}

impl RiskModel {
    pub fn new(feature_names: Option<Vec<String>>, params: LogisticParams) -> Self {
        Self {
            model_version: crate::MODEL_VERSION.to_string(),
            feature_names,
            params,
            scaler: None,
            coefficients: Vec::new(),
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    fn fitted_scaler(&self) -> Result<&StandardScaler> {
        self.scaler
            .as_ref()
            .ok_or_else(|| RiskError::Model("model has not been fitted".into()))
    }

    fn decision(&self, z: &[f64]) -> f64 {
        self.intercept
            + z.iter()
                .zip(&self.coefficients)
                .map(|(a, b)| a * b)
                .sum::<f64>()
    }
}

impl Classifier for RiskModel {
    fn fit(&mut self, x: &[FeatureVector], y: &[u8]) -> Result<()> {
        let width = check_matrix(x)?;
        if y.len() != x.len() {
            return Err(RiskError::Model(format!(
                "label count {} does not match row count {}",
                y.len(),
                x.len()
            )));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != width {
                return Err(RiskError::Model(format!(
                    "model expects {} features, rows have {width}",
                    names.len()
                )));
            }
        }
        let n_pos = y.iter().filter(|&&v| v == 1).count();
        if n_pos == 0 || n_pos == y.len() {
            return Err(RiskError::Model("training labels contain a single class".into()));
        }

        let scaler = StandardScaler::fit(x)?;
        let z: Vec<Vec<f64>> = x.iter().map(|row| scaler.transform_row(row)).collect();

        let n = y.len() as f64;
        let weight_for = |label: u8| -> f64 {
            if !self.params.balanced {
                return 1.0;
            }
            let class_count = if label == 1 { n_pos } else { y.len() - n_pos };
            n / (2.0 * class_count as f64)
        };
        let weights: Vec<f64> = y.iter().map(|&label| weight_for(label)).collect();

        let (beta, n_iter) = newton_logistic(&z, y, &weights, &self.params)?;
        debug!(n_iter, "logistic regression converged");

        self.coefficients = beta[..width].to_vec();
        self.intercept = beta[width];
        self.n_iter = n_iter;
        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict_proba(&self, x: &[FeatureVector]) -> Result<Vec<f64>> {
        let scaler = self.fitted_scaler()?;
        x.iter()
            .map(|row| {
                if row.len() != scaler.mean.len() {
                    return Err(RiskError::Model(format!(
                        "expected {} features, got {}",
                        scaler.mean.len(),
                        row.len()
                    )));
                }
                Ok(sigmoid(self.decision(&scaler.transform_row(row))))
            })
            .collect()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref().filter(|names| !names.is_empty())
    }

    fn explain(&self, x: &[f64]) -> Vec<FeatureContribution> {
        let Some(scaler) = self.scaler.as_ref() else {
            return Vec::new();
        };
        scaler
            .transform_row(x)
            .into_iter()
            .zip(&self.coefficients)
            .enumerate()
            .map(|(index, (z_score, coef))| FeatureContribution {
                index,
                value: x[index],
                z_score,
                contribution: z_score * coef,
            })
            .collect()
    }
}

fn check_matrix(x: &[FeatureVector]) -> Result<usize> {
    let width = x
        .first()
        .map(|row| row.len())
        .ok_or_else(|| RiskError::Model("no rows to fit".into()))?;
    if width == 0 {
        return Err(RiskError::Model("rows have no features".into()));
    }
    for (i, row) in x.iter().enumerate() {
        if row.len() != width {
            return Err(RiskError::Model(format!(
                "row {i} has {} features, expected {width}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(RiskError::Model(format!("row {i} contains a non-finite value")));
        }
    }
    Ok(width)
}

/// Penalized weighted negative log-likelihood; the intercept is not penalized.
fn objective(z: &[Vec<f64>], y: &[u8], weights: &[f64], beta: &[f64], c: f64) -> f64 {
    let d = beta.len() - 1;
    let penalty = 0.5 * beta[..d].iter().map(|b| b * b).sum::<f64>();
    let loss: f64 = z
        .iter()
        .zip(y)
        .zip(weights)
        .map(|((row, &label), w)| {
            let eta = linear(row, beta);
            w * (softplus(eta) - f64::from(label) * eta)
        })
        .sum();
    penalty + c * loss
}

fn linear(row: &[f64], beta: &[f64]) -> f64 {
    let d = row.len();
    beta[d] + row.iter().zip(&beta[..d]).map(|(a, b)| a * b).sum::<f64>()
}

/// Damped Newton-Raphson on the penalized objective. Returns the coefficient
/// vector with the intercept last, and the iteration count.
fn newton_logistic(
    z: &[Vec<f64>],
    y: &[u8],
    weights: &[f64],
    params: &LogisticParams,
) -> Result<(Vec<f64>, usize)> {
    let d = z[0].len();
    let dim = d + 1;
    let c = params.c;
    let mut beta = vec![0.0; dim];
    let mut current = objective(z, y, weights, &beta, c);

    for iter in 1..=params.max_iter {
        let mut grad = vec![0.0; dim];
        let mut hess = vec![vec![0.0; dim]; dim];
        for j in 0..d {
            grad[j] = beta[j];
            hess[j][j] = 1.0;
        }

        for ((row, &label), w) in z.iter().zip(y).zip(weights) {
            let p = sigmoid(linear(row, &beta));
            let r = c * w * (p - f64::from(label));
            let h = c * w * p * (1.0 - p);
            for a in 0..dim {
                let xa = if a < d { row[a] } else { 1.0 };
                grad[a] += r * xa;
                for b in a..dim {
                    let xb = if b < d { row[b] } else { 1.0 };
                    hess[a][b] += h * xa * xb;
                }
            }
        }
        for a in 0..dim {
            for b in 0..a {
                hess[a][b] = hess[b][a];
            }
        }

        let step = solve_linear(hess, grad)?;

        // halve the step until the objective stops increasing
        let mut scale = 1.0;
        let mut attempts = 0;
        let (candidate, next) = loop {
            let candidate: Vec<f64> = beta
                .iter()
                .zip(&step)
                .map(|(b, s)| b - scale * s)
                .collect();
            let next = objective(z, y, weights, &candidate, c);
            attempts += 1;
            if next <= current || attempts >= 30 {
                break (candidate, next);
            }
            scale *= 0.5;
        };

        let max_change = step.iter().map(|s| (scale * s).abs()).fold(0.0, f64::max);
        beta = candidate;
        current = next;
        if max_change < params.tol {
            return Ok((beta, iter));
        }
    }

    Ok((beta, params.max_iter))
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(RiskError::Model("singular Hessian during fit".into()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> (Vec<FeatureVector>, Vec<u8>) {
        let x = vec![
            vec![120.0, 72.0],
            vec![130.0, 80.0],
            vec![110.0, 68.0],
            vec![165.0, 110.0],
            vec![170.0, 105.0],
            vec![118.0, 75.0],
            vec![160.0, 98.0],
            vec![125.0, 70.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 0, 1, 0];
        (x, y)
    }

    #[test]
    fn test_sigmoid_properties() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scaler_constant_column() {
        let scaler = StandardScaler::fit(&[vec![1.0, 5.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);
        assert_eq!(scaler.transform_row(&[3.0, 5.0]), vec![1.0, 0.0]);
    }

    #[test]
    fn test_solve_linear() {
        let x = solve_linear(vec![vec![2.0, 1.0], vec![1.0, 3.0]], vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
        assert!(solve_linear(vec![vec![1.0, 2.0], vec![2.0, 4.0]], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_fit_orders_risk() {
        let (x, y) = toy();
        let mut model = RiskModel::new(
            Some(vec!["bp_systolic".into(), "heart_rate".into()]),
            LogisticParams::default(),
        );
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());

        let proba = model
            .predict_proba(&[vec![175.0, 115.0], vec![112.0, 66.0]])
            .unwrap();
        assert!(proba[0] > 0.5);
        assert!(proba[1] < 0.5);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = toy();
        let mut a = RiskModel::new(None, LogisticParams::default());
        let mut b = RiskModel::new(None, LogisticParams::default());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_rejects_single_class() {
        let mut model = RiskModel::new(None, LogisticParams::default());
        let err = model.fit(&[vec![1.0], vec![2.0]], &[1, 1]).unwrap_err();
        assert!(err.to_string().contains("single class"));
    }

    #[test]
    fn test_unfitted_model_cannot_score() {
        let model = RiskModel::new(None, LogisticParams::default());
        assert!(model.predict_proba(&[vec![1.0]]).is_err());
        assert!(model.explain(&[1.0]).is_empty());
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = toy();
        let mut model = RiskModel::new(None, LogisticParams::default());
        model.fit(&x, &y).unwrap();
        assert!(model.predict_proba(&[vec![1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_explain_matches_decision() {
        let (x, y) = toy();
        let mut model = RiskModel::new(None, LogisticParams::default());
        model.fit(&x, &y).unwrap();
        let row = vec![150.0, 90.0];
        let parts = model.explain(&row);
        let logit: f64 = model.intercept + parts.iter().map(|c| c.contribution).sum::<f64>();
        let p = model.predict_proba(&[row]).unwrap()[0];
        assert!((sigmoid(logit) - p).abs() < 1e-12);
    }
}
