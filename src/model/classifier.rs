//! Multinomial logistic regression
//!
//! Minimizes `C * sum_i w_i * -log p(y_i | x_i) + 0.5 * ||W||^2` with
//! full-batch gradient descent and Armijo backtracking. Intercepts are not
//! penalized. Parameters start at zero, so a fit is a pure function of its
//! inputs and their order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::vectorizer::Features;

/// Optimizer hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Inverse regularization strength
    pub regularization: f64,
    pub max_iter: usize,
    /// Stop once the gradient's max-norm falls below this fraction of its initial value
    pub tolerance: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            regularization: 1.0,
            max_iter: 1000,
            tolerance: 1e-6,
        }
    }
}

/// Fitted linear decision function over `n_classes` outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    n_features: usize,
    n_classes: usize,
    /// Row-major `n_classes x n_features`
    coef: Vec<f64>,
    intercept: Vec<f64>,
    /// Iterations the optimizer actually ran
    n_iter: usize,
}

/// Training rows with class indices and sample weights
pub struct TrainingSet<'a> {
    pub features: &'a [Features],
    pub targets: &'a [usize],
    pub weights: &'a [f64],
}

impl LogisticRegression {
    fn zeros(n_features: usize, n_classes: usize) -> Self {
        Self {
            n_features,
            n_classes,
            coef: vec![0.0; n_features * n_classes],
            intercept: vec![0.0; n_classes],
            n_iter: 0,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Fit on `data`. Every target must be below `n_classes`.
    pub fn fit(data: &TrainingSet<'_>, n_features: usize, n_classes: usize, params: &ClassifierParams) -> Self {
        let mut model = Self::zeros(n_features, n_classes);
        let mut grad = model.zeros_like();

        let mut loss = model.objective(data, params.regularization, Some(&mut grad));
        let initial_norm = max_abs(&grad).max(f64::MIN_POSITIVE);
        let mut step = 1.0 / initial_norm.max(1.0);
        let mut iter = 0;

        while iter < params.max_iter {
            let grad_norm = max_abs(&grad);
            if grad_norm <= params.tolerance * initial_norm {
                break;
            }
            let grad_sq: f64 = grad.iter().map(|g| g * g).sum();

            // Armijo backtracking from a slightly larger step than last time
            step *= 2.0;
            let mut candidate;
            let mut candidate_loss;
            loop {
                candidate = model.stepped(&grad, step);
                candidate_loss = candidate.objective(data, params.regularization, None);
                if candidate_loss <= loss - 0.5 * step * grad_sq || step < 1e-16 {
                    break;
                }
                step *= 0.5;
            }
            if step < 1e-16 {
                debug!("Line search stalled at iteration {}", iter);
                break;
            }

            model = candidate;
            loss = model.objective(data, params.regularization, Some(&mut grad));
            iter += 1;
        }

        model.n_iter = iter;
        debug!(
            "Logistic regression finished after {} iterations (loss {:.6})",
            iter, loss
        );
        model
    }

    /// Raw class scores for one row
    fn scores(&self, row: &Features) -> Vec<f64> {
        let mut z = self.intercept.clone();
        for (k, zk) in z.iter_mut().enumerate() {
            let offset = k * self.n_features;
            for &(j, x) in row {
                if j < self.n_features {
                    *zk += self.coef[offset + j] * x;
                }
            }
        }
        z
    }

    /// Class probabilities for one row
    pub fn predict_proba(&self, row: &Features) -> Vec<f64> {
        softmax(&self.scores(row))
    }

    /// Most probable class index and its probability
    pub fn predict(&self, row: &Features) -> (usize, f64) {
        let proba = self.predict_proba(row);
        argmax(&proba)
    }

    /// Objective value; fills `grad` (coef then intercept) when given
    fn objective(&self, data: &TrainingSet<'_>, c: f64, mut grad: Option<&mut Vec<f64>>) -> f64 {
        if let Some(g) = grad.as_deref_mut() {
            g.iter_mut().for_each(|v| *v = 0.0);
        }
        let coef_len = self.coef.len();
        let mut loss = 0.0;

        for ((row, &y), &w) in data.features.iter().zip(data.targets).zip(data.weights) {
            if w == 0.0 {
                continue;
            }
            let z = self.scores(row);
            let lse = log_sum_exp(&z);
            loss += c * w * (lse - z[y]);

            if let Some(g) = grad.as_deref_mut() {
                for k in 0..self.n_classes {
                    let p = (z[k] - lse).exp();
                    let residual = c * w * (p - if k == y { 1.0 } else { 0.0 });
                    let offset = k * self.n_features;
                    for &(j, x) in row {
                        if j < self.n_features {
                            g[offset + j] += residual * x;
                        }
                    }
                    g[coef_len + k] += residual;
                }
            }
        }

        loss += 0.5 * self.coef.iter().map(|v| v * v).sum::<f64>();
        if let Some(g) = grad {
            for (gj, wj) in g.iter_mut().zip(&self.coef) {
                *gj += wj;
            }
        }
        loss
    }

    fn zeros_like(&self) -> Vec<f64> {
        vec![0.0; self.coef.len() + self.intercept.len()]
    }

    fn stepped(&self, grad: &[f64], step: f64) -> Self {
        let (g_coef, g_int) = grad.split_at(self.coef.len());
        Self {
            n_features: self.n_features,
            n_classes: self.n_classes,
            coef: self.coef.iter().zip(g_coef).map(|(w, g)| w - step * g).collect(),
            intercept: self.intercept.iter().zip(g_int).map(|(b, g)| b - step * g).collect(),
            n_iter: self.n_iter,
        }
    }
}

fn log_sum_exp(z: &[f64]) -> f64 {
    let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + z.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn softmax(z: &[f64]) -> Vec<f64> {
    let lse = log_sum_exp(z);
    z.iter().map(|v| (v - lse).exp()).collect()
}

/// Index of the largest value; the first wins on ties
pub(crate) fn argmax(values: &[f64]) -> (usize, f64) {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |m, v| m.max(v.abs()))
}
