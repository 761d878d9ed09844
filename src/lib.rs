//! Credit risk pipeline: behavioral features from transactions, an RFM
//! clustering proxy label, a gradient-boosting classifier kept in a versioned
//! registry, and an HTTP prediction service.
//!
//! Modular structure:
//! - [`transactions`]: Raw transaction CSV ingestion
//! - [`features`]: Per-customer aggregate features
//! - [`risk`]: RFM metrics and the k-means proxy label
//! - [`dataset`] / [`processing`]: Labeled dataset and the processing run
//! - [`model`]: Preprocessing, classifier, metrics
//! - [`training`]: Stratified split, fit, evaluate, register
//! - [`storage`]: SQLite model registry
//! - [`api`]: Prediction service and routes
//! - [`logging`]: Structured JSON logging

pub mod api;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod processing;
pub mod risk;
pub mod storage;
pub mod training;
pub mod transactions;

pub use api::{build_router, AppState, PredictionService};
pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use features::{CustomerFeatures, FeatureExtractor};
pub use logging::StructuredLogger;
pub use model::{CreditRiskPipeline, Prediction};
pub use risk::ProxyLabeler;
pub use storage::{ModelRegistry, Stage};
pub use training::Trainer;
pub use transactions::Transaction;
