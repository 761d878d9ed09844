//! Training run: stratified split, fit, evaluate, then register and promote.
//! Nothing reaches the registry unless fit and evaluation both succeed.

use crate::config::TrainingConfig;
use crate::dataset::TrainingData;
use crate::error::{PipelineError, Result};
use crate::model::{ClassificationMetrics, CreditRiskPipeline, PreprocessorSpec};
use crate::storage::{ModelRegistry, ModelVersion, NewVersion, Stage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

/// Row indices of the two halves of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so both halves keep the class balance of `target`.
///
/// Each class gives `round(n_c * test_size)` rows to the test half, clamped so
/// both halves hold at least one member of every class.
pub fn stratified_split(target: &[u8], test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::Training(format!(
            "test_size must lie strictly between 0 and 1, got {test_size}"
        )));
    }
    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, &y) in target.iter().enumerate() {
        by_class.entry(y).or_default().push(i);
    }
    if by_class.len() < 2 {
        return Err(PipelineError::Training(
            "training data holds a single class".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::with_capacity(target.len()),
        test: Vec::new(),
    };
    for (class, mut rows) in by_class {
        let n = rows.len();
        if n < 2 {
            return Err(PipelineError::Training(format!(
                "class {class} has {n} member; stratified split needs at least 2"
            )));
        }
        let n_test = ((n as f64 * test_size).round() as usize).clamp(1, n - 1);
        rows.shuffle(&mut rng);
        split.test.extend_from_slice(&rows[..n_test]);
        split.train.extend_from_slice(&rows[n_test..]);
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// Result of a completed run, printed as one JSON line by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub experiment: String,
    pub model_name: String,
    pub version: u32,
    pub stage: Stage,
    pub params: BTreeMap<String, String>,
    pub metrics: ClassificationMetrics,
}

pub struct Trainer {
    config: TrainingConfig,
    experiment: String,
    spec: PreprocessorSpec,
}

impl Trainer {
    pub fn new(config: TrainingConfig, experiment: impl Into<String>) -> Self {
        Self {
            config,
            experiment: experiment.into(),
            spec: PreprocessorSpec::credit_default(),
        }
    }

    /// Fit and evaluate without touching any registry.
    pub fn fit_and_evaluate(
        &self,
        data: &TrainingData,
    ) -> Result<(CreditRiskPipeline, ClassificationMetrics, Split)> {
        if data.is_empty() {
            return Err(PipelineError::EmptyInput("training data".to_string()));
        }
        let split = stratified_split(&data.target, self.config.test_size, self.config.seed)?;
        let pick = |idx: &[usize]| idx.iter().map(|&i| data.target[i]).collect::<Vec<u8>>();
        let (y_train, y_test) = (pick(&split.train), pick(&split.test));
        let train = data.table.select_rows(&split.train);
        let test = data.table.select_rows(&split.test);

        info!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            "fitting credit risk pipeline"
        );
        let pipeline = CreditRiskPipeline::fit(&self.spec, &self.config.classifier, &train, &y_train)?;

        let scores = pipeline.predict_proba(&test)?;
        let decisions = pipeline.predict(&test)?;
        let metrics = ClassificationMetrics::compute(&y_test, &decisions, &scores)?;
        info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1_score,
            roc_auc = metrics.roc_auc,
            "evaluated on held-out split"
        );
        Ok((pipeline, metrics, split))
    }

    /// Full run: fit, evaluate, register and promote to `Production`.
    pub fn run(
        &self,
        data: &TrainingData,
        registry: &ModelRegistry,
        model_name: &str,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        info!(%run_id, experiment = %self.experiment, rows = data.len(), "starting training run");

        let (pipeline, metrics, split) = self.fit_and_evaluate(data)?;
        let params = self.run_params(&split);
        let artifact = pipeline.to_json()?;

        let version: ModelVersion = registry.register_and_promote(
            model_name,
            &NewVersion {
                run_id: &run_id,
                params: &params,
                metrics: &metrics.as_map(),
                artifact: &artifact,
            },
            Stage::Production,
        )?;
        info!(%run_id, model = model_name, version = version.version, "promoted to Production");

        Ok(RunSummary {
            run_id,
            experiment: self.experiment.clone(),
            model_name: model_name.to_string(),
            version: version.version,
            stage: version.stage,
            params,
            metrics,
        })
    }

    fn run_params(&self, split: &Split) -> BTreeMap<String, String> {
        let c = &self.config.classifier;
        [
            ("model_class", CreditRiskPipeline::MODEL_CLASS.to_string()),
            ("n_estimators", c.n_estimators.to_string()),
            ("max_depth", c.max_depth.to_string()),
            ("learning_rate", c.learning_rate.to_string()),
            ("min_leaf_size", c.min_leaf_size.to_string()),
            ("test_size", self.config.test_size.to_string()),
            ("seed", self.config.seed.to_string()),
            ("experiment", self.experiment.clone()),
            ("train_rows", split.train.len().to_string()),
            ("test_rows", split.test.len().to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LabeledCustomer;
    use crate::features::CustomerFeatures;
    use crate::model::GradientBoostingParams;

    fn data(n: usize) -> TrainingData {
        let rows: Vec<LabeledCustomer> = (0..n)
            .map(|i| {
                let risky = i % 4 == 0;
                LabeledCustomer {
                    features: CustomerFeatures {
                        customer_id: format!("C{i:03}"),
                        total_transactions: if risky { 1 } else { 10 + (i % 7) as u64 },
                        total_value: if risky { 40.0 } else { 2_000.0 + i as f64 * 10.0 },
                        avg_value: if risky { 40.0 } else { 200.0 },
                        std_value: if risky { 0.0 } else { 35.0 },
                        unique_products: if risky { 1 } else { 3 },
                        most_frequent_channel: format!("ChannelId_{}", 1 + i % 3),
                    },
                    is_high_risk: risky,
                }
            })
            .collect();
        TrainingData::from_rows(&rows)
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            classifier: GradientBoostingParams {
                n_estimators: 20,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn split_is_stratified_and_deterministic() {
        let target: Vec<u8> = (0..50).map(|i| u8::from(i % 5 == 0)).collect();
        let a = stratified_split(&target, 0.2, 42).unwrap();
        let b = stratified_split(&target, 0.2, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 10);
        assert_eq!(a.train.len() + a.test.len(), 50);
        let positives = a.test.iter().filter(|&&i| target[i] == 1).count();
        assert_eq!(positives, 2);
        assert!(a.test.iter().all(|i| !a.train.contains(i)));
    }

    #[test]
    fn split_rejects_degenerate_input() {
        assert!(stratified_split(&[0, 0, 0, 0], 0.2, 1).is_err());
        assert!(stratified_split(&[0, 0, 0, 1], 0.2, 1).is_err());
        assert!(stratified_split(&[0, 0, 1, 1], 1.0, 1).is_err());
    }

    #[test]
    fn run_registers_production_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let trainer = Trainer::new(config(), "test-experiment");

        let first = trainer.run(&data(60), &registry, "CreditRiskModel").unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.stage, Stage::Production);
        assert_eq!(first.params["model_class"], "GradientBoostingClassifier");
        assert!(first.metrics.roc_auc > 0.9);

        let second = trainer.run(&data(60), &registry, "CreditRiskModel").unwrap();
        assert_eq!(second.version, 2);
        let versions = registry.list_versions("CreditRiskModel").unwrap();
        assert_eq!(versions[0].stage, Stage::Archived);
        assert_eq!(versions[1].stage, Stage::Production);
    }

    #[test]
    fn failed_run_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let mut bad = config();
        bad.classifier.n_estimators = 0;
        let trainer = Trainer::new(bad, "test-experiment");
        assert!(trainer.run(&data(40), &registry, "CreditRiskModel").is_err());
        assert!(registry.list_versions("CreditRiskModel").unwrap().is_empty());
    }
}
