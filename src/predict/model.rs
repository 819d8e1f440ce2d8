//! Bagged ridge regression over feature rows.
//!
//! Each member is a closed-form ridge regressor fit on a bootstrap resample
//! of the training set. Spread across members doubles as an uncertainty
//! estimate for the forecast confidence.

use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::PredictionConfig;
use crate::predict::features::TrainingRow;

/// Linear model solving (XᵀX + λI)w = Xᵀy, with an intercept column.
#[derive(Clone, Debug)]
struct RidgeRegressor {
    weights: DVector<f64>,
}

impl RidgeRegressor {
    /// Closed-form fit via Cholesky. λ > 0 keeps the system positive
    /// definite even when rows are collinear.
    fn fit(rows: &[&TrainingRow], dim: usize, lambda: f64) -> Result<Self> {
        let n = rows.len();
        // Intercept as an extra all-ones column
        let x = DMatrix::from_fn(n, dim + 1, |r, c| {
            if c == dim {
                1.0
            } else {
                rows[r].features[c]
            }
        });
        let y = DVector::from_fn(n, |r, _| rows[r].target);

        let xt = x.transpose();
        let mut gram = &xt * &x;
        for i in 0..dim + 1 {
            gram[(i, i)] += lambda;
        }

        let Some(cholesky) = gram.cholesky() else {
            bail!("ridge system is not positive definite (lambda = {lambda})");
        };
        Ok(Self {
            weights: cholesky.solve(&(&xt * &y)),
        })
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let dim = self.weights.len() - 1;
        let dot: f64 = features
            .iter()
            .take(dim)
            .zip(self.weights.iter())
            .map(|(f, w)| f * w)
            .sum();
        dot + self.weights[dim]
    }
}

/// Ensemble of ridge regressors fit on bootstrap resamples.
#[derive(Clone, Debug)]
pub struct BaggedEnsemble {
    members: Vec<RidgeRegressor>,
    trained_rows: usize,
}

impl BaggedEnsemble {
    /// Trains the full ensemble. The RNG seed comes from the config, so
    /// retraining on an identical history rebuilds identical members.
    pub fn train(rows: &[TrainingRow], config: &PredictionConfig) -> Result<Self> {
        if rows.is_empty() {
            bail!("cannot train on an empty feature set");
        }
        let dim = rows[0].features.len();
        if let Some(bad) = rows.iter().find(|r| r.features.len() != dim) {
            bail!(
                "inconsistent feature dimensions: {} vs {}",
                bad.features.len(),
                dim
            );
        }

        let mut rng = StdRng::seed_from_u64(config.rng_seed);
        let mut members = Vec::with_capacity(config.ensemble_size.max(1));
        for _ in 0..config.ensemble_size.max(1) {
            let sample: Vec<&TrainingRow> =
                (0..rows.len()).map(|_| &rows[rng.gen_range(0..rows.len())]).collect();
            members.push(RidgeRegressor::fit(&sample, dim, config.ridge_lambda)?);
        }

        debug!(
            members = members.len(),
            rows = rows.len(),
            dim,
            "ensemble trained"
        );
        Ok(Self {
            members,
            trained_rows: rows.len(),
        })
    }

    /// Mean prediction across members (floored at zero, a zone count can't
    /// go negative) and the member standard deviation.
    pub fn predict(&self, features: &[f64]) -> (f64, f64) {
        let raw: Vec<f64> = self.members.iter().map(|m| m.predict(features)).collect();
        let mean = raw.iter().sum::<f64>() / raw.len() as f64;
        let variance =
            raw.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / raw.len() as f64;
        (mean.max(0.0), variance.sqrt())
    }

    pub fn trained_rows(&self) -> usize {
        self.trained_rows
    }
}
