//! Prediction service and its HTTP surface.
//!
//! The model is resolved once at startup. A failed load leaves the service
//! unavailable for the rest of the process; predict then answers 503.

mod error;
pub mod handlers;
mod request;
pub mod routes;

pub use error::{FieldError, ServiceError};
pub use request::parse_features;
pub use routes::build_router;

use crate::features::CustomerFeatures;
use crate::model::{CreditRiskPipeline, Prediction};
use crate::storage::{ModelRegistry, Stage};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// A pipeline resolved from the registry.
#[derive(Debug)]
pub struct LoadedModel {
    pub name: String,
    pub version: u32,
    pub stage: Stage,
    pub pipeline: CreditRiskPipeline,
}

/// Set once when the service is built, read-only afterwards.
#[derive(Debug, Clone)]
pub enum ModelState {
    Ready(Arc<LoadedModel>),
    Unavailable { reason: String },
}

#[derive(Debug)]
pub struct PredictionService {
    state: ModelState,
}

impl PredictionService {
    pub fn ready(model: LoadedModel) -> Self {
        Self {
            state: ModelState::Ready(Arc::new(model)),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    /// Resolve `name` + `stage` in the registry. Never fails; a load error
    /// yields an unavailable service.
    pub fn load(registry: &ModelRegistry, name: &str, stage: Stage) -> Self {
        let loaded = registry
            .load_artifact(name, stage)
            .and_then(|(version, bytes)| {
                Ok(LoadedModel {
                    name: version.name,
                    version: version.version,
                    stage: version.stage,
                    pipeline: CreditRiskPipeline::from_json(&bytes)?,
                })
            });
        match loaded {
            Ok(model) => {
                info!(model = %model.name, version = model.version, stage = %model.stage, "model loaded");
                Self::ready(model)
            }
            Err(e) => {
                error!(model = name, %stage, error = %e, "model not loaded; serving unavailable");
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Open the registry at `root` and [`load`](Self::load) from it.
    pub fn open(root: &Path, name: &str, stage: Stage) -> Self {
        match ModelRegistry::open(root) {
            Ok(registry) => Self::load(&registry, name, stage),
            Err(e) => {
                error!(root = %root.display(), error = %e, "cannot open model registry");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        match &self.state {
            ModelState::Ready(m) => Some(m),
            ModelState::Unavailable { .. } => None,
        }
    }

    pub fn predict(&self, features: &CustomerFeatures) -> Result<Prediction, ServiceError> {
        let model = match &self.state {
            ModelState::Ready(m) => m,
            ModelState::Unavailable { reason } => {
                return Err(ServiceError::Unavailable(format!("model not loaded: {reason}")))
            }
        };
        model
            .pipeline
            .score(features)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
