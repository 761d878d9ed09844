//! Binary gradient-boosted trees (`gbdt` crate, log-likelihood loss).
//! Targets are 0/1 on the outside and ±1 for the booster.

use crate::error::{PipelineError, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Booster hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    pub max_depth: u32,
    /// Shrinkage applied to every tree
    pub learning_rate: f32,
    pub min_leaf_size: usize,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
            min_leaf_size: 1,
        }
    }
}

impl GradientBoostingParams {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::Training("n_estimators must be positive".into()));
        }
        if self.max_depth == 0 {
            return Err(PipelineError::Training("max_depth must be positive".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(PipelineError::Training("learning_rate must be positive".into()));
        }
        Ok(())
    }

    fn booster_config(&self, n_features: usize) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(n_features);
        cfg.set_max_depth(self.max_depth);
        cfg.set_iterations(self.n_estimators);
        cfg.set_shrinkage(self.learning_rate);
        cfg.set_min_leaf_size(self.min_leaf_size.max(1));
        cfg.set_loss("LogLikelyhood");
        cfg.set_data_sample_ratio(1.0);
        cfg.set_feature_sample_ratio(1.0);
        cfg.set_training_optimization_level(2);
        cfg.set_debug(false);
        cfg
    }
}

#[derive(Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    params: GradientBoostingParams,
    n_features: usize,
    booster: GBDT,
}

impl std::fmt::Debug for GradientBoostingClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientBoostingClassifier")
            .field("params", &self.params)
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

fn row_features(row: ArrayView1<'_, f64>) -> Vec<f32> {
    row.iter().map(|&v| v as f32).collect()
}

impl GradientBoostingClassifier {
    pub fn fit(params: &GradientBoostingParams, x: &Array2<f64>, y: &[u8]) -> Result<Self> {
        params.validate()?;
        if x.nrows() == 0 {
            return Err(PipelineError::Training("no training rows".into()));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::Training(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() == 0 {
            return Err(PipelineError::Training("no input features".into()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Training("non-finite feature value".into()));
        }
        if let Some(bad) = y.iter().find(|&&t| t > 1) {
            return Err(PipelineError::Training(format!("target must be 0 or 1, got {bad}")));
        }
        let positives = y.iter().filter(|&&t| t == 1).count();
        if positives == 0 || positives == y.len() {
            return Err(PipelineError::Training("training targets contain a single class".into()));
        }

        let mut train: DataVec = x
            .rows()
            .into_iter()
            .zip(y)
            .map(|(row, &t)| {
                let label = if t == 1 { 1.0 } else { -1.0 };
                Data::new_training_data(row_features(row), 1.0, label, None)
            })
            .collect();

        let cfg = params.booster_config(x.ncols());
        let booster = catch_unwind(AssertUnwindSafe(move || {
            let mut booster = GBDT::new(&cfg);
            booster.fit(&mut train);
            booster
        }))
        .map_err(|_| PipelineError::Training("gradient boosting fit panicked".into()))?;

        Ok(Self {
            params: params.clone(),
            n_features: x.ncols(),
            booster,
        })
    }

    pub fn params(&self) -> &GradientBoostingParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Probability of the positive class for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::Scoring(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        let rows: DataVec = x
            .rows()
            .into_iter()
            .map(|row| Data::new_test_data(row_features(row), None))
            .collect();
        let raw = catch_unwind(AssertUnwindSafe(|| self.booster.predict(&rows)))
            .map_err(|_| PipelineError::Scoring("gradient boosting predict panicked".into()))?;

        raw.into_iter()
            .map(|p| {
                let p = f64::from(p);
                if p.is_finite() {
                    Ok(p.clamp(0.0, 1.0))
                } else {
                    Err(PipelineError::Scoring("model produced a non-finite probability".into()))
                }
            })
            .collect()
    }
}
