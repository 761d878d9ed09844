//! Model side of the pipeline: column preprocessing, gradient boosting,
//! the persisted combined pipeline and evaluation metrics.

mod classifier;
mod metrics;
mod pipeline;
mod preprocess;
mod table;

pub use classifier::{GradientBoostingClassifier, GradientBoostingParams};
pub use metrics::{roc_auc, ClassificationMetrics};
pub use pipeline::{CreditRiskPipeline, Prediction, DEFAULT_THRESHOLD};
pub use preprocess::{FittedPreprocessor, NumericImpute, PreprocessorSpec, Remainder, UnknownCategory};
pub use table::{Cell, FeatureTable};
