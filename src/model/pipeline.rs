//! Preprocessing and classifier bundled into one persisted object, so serving
//! always applies exactly the transformation fitted at training time.

use super::classifier::{GradientBoostingClassifier, GradientBoostingParams};
use super::preprocess::{FittedPreprocessor, PreprocessorSpec};
use super::table::FeatureTable;
use crate::error::{PipelineError, Result};
use crate::features::CustomerFeatures;
use serde::{Deserialize, Serialize};

/// Probability above which a customer is classified high risk.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub risk_probability: f64,
    pub is_high_risk: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreditRiskPipeline {
    preprocessor: FittedPreprocessor,
    classifier: GradientBoostingClassifier,
    threshold: f64,
}

impl CreditRiskPipeline {
    pub const MODEL_CLASS: &'static str = "GradientBoostingClassifier";

    pub fn fit(
        spec: &PreprocessorSpec,
        params: &GradientBoostingParams,
        table: &FeatureTable,
        target: &[u8],
    ) -> Result<Self> {
        if table.len() != target.len() {
            return Err(PipelineError::Training(format!(
                "{} rows but {} targets",
                table.len(),
                target.len()
            )));
        }
        let preprocessor = spec.fit(table)?;
        let x = preprocessor.transform(table)?;
        let classifier = GradientBoostingClassifier::fit(params, &x, target)?;
        Ok(Self {
            preprocessor,
            classifier,
            threshold: DEFAULT_THRESHOLD,
        })
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &GradientBoostingClassifier {
        &self.classifier
    }

    pub fn input_columns(&self) -> Vec<&str> {
        self.preprocessor.input_columns()
    }

    pub fn predict_proba(&self, table: &FeatureTable) -> Result<Vec<f64>> {
        let x = self.preprocessor.transform(table)?;
        self.classifier.predict_proba(&x)
    }

    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(table)?
            .into_iter()
            .map(|p| self.decide(p))
            .collect())
    }

    /// Score one customer.
    pub fn score(&self, features: &CustomerFeatures) -> Result<Prediction> {
        let table = FeatureTable::from_customers([features]);
        let risk_probability = self
            .predict_proba(&table)?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Scoring("model returned no prediction".into()))?;
        Ok(Prediction {
            risk_probability,
            is_high_risk: self.decide(risk_probability),
        })
    }

    fn decide(&self, p: f64) -> u8 {
        u8::from(p > self.threshold)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
