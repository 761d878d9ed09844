//! Pipeline configuration: one JSON file, every section optional, a few env overrides.

use crate::dataset::JoinPolicy;
use crate::model::GradientBoostingParams;
use crate::storage::Stage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, overridden by `CREDIT_RISK_CONFIG` or `--config`.
pub const DEFAULT_CONFIG_FILE: &str = "credit-risk.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Raw input and processed output locations
    pub data: DataConfig,
    /// RFM clustering parameters for the proxy label
    pub labeling: LabelingConfig,
    /// Split and classifier parameters
    pub training: TrainingConfig,
    /// Model registry location
    pub registry: RegistryConfig,
    /// Prediction API
    pub serving: ServingConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_data_path: PathBuf,
    pub processed_data_dir: PathBuf,
    /// What to do with customers present in only one of features / labels
    pub join: JoinPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    pub n_clusters: usize,
    /// Number of k-means initializations; the lowest inertia run wins
    pub n_init: usize,
    pub max_iterations: u64,
    pub tolerance: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation (strictly between 0 and 1)
    pub test_size: f64,
    pub seed: u64,
    pub classifier: GradientBoostingParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding `registry.db` and `artifacts/`
    pub root: PathBuf,
    pub experiment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    pub host: String,
    pub port: u16,
    pub model_name: String,
    /// Stage resolved once at startup
    pub model_stage: Stage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_data_path: PathBuf::from("data/raw/data.csv"),
            processed_data_dir: PathBuf::from("data/processed"),
            join: JoinPolicy::DropUnmatched,
        }
    }
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            classifier: GradientBoostingParams::default(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("mlruns"),
            experiment: "Credit_Risk_B5W5_Production".to_string(),
        }
    }
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_name: "CreditRiskModel".to_string(),
            model_stage: Stage::Production,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `MODEL_NAME`, `MODEL_STAGE` and `CREDIT_RISK_REGISTRY` overrides.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(self)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(name) = lookup("MODEL_NAME") {
            self.serving.model_name = name;
        }
        if let Some(stage) = lookup("MODEL_STAGE") {
            self.serving.model_stage = stage.parse().map_err(|reason| ConfigError::Env {
                var: "MODEL_STAGE",
                reason,
            })?;
        }
        if let Some(root) = lookup("CREDIT_RISK_REGISTRY") {
            self.registry.root = PathBuf::from(root);
        }
        Ok(())
    }
}
