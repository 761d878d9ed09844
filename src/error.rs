//! Crate-wide error type for ingestion, labeling, training and the model registry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid record at line {line}: field `{field}` {reason}")]
    InvalidRecord {
        line: u64,
        field: String,
        reason: String,
    },

    #[error("no rows in {0}")]
    EmptyInput(String),

    #[error("labeling failed: {0}")]
    Labeling(String),

    #[error("dataset join failed: {0}")]
    Join(String),

    #[error("preprocessing failed on column `{column}`: {reason}")]
    Preprocessing { column: String, reason: String },

    #[error("training failed: {0}")]
    Training(String),

    #[error("scoring failed: {0}")]
    Scoring(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("artifact {path} is corrupted: expected sha256 {expected}, found {actual}")]
    ArtifactCorrupted {
        path: String,
        expected: String,
        actual: String,
    },
}

impl PipelineError {
    pub(crate) fn invalid(line: u64, field: &str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidRecord {
            line,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn preprocessing(column: &str, reason: impl Into<String>) -> Self {
        PipelineError::Preprocessing {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
