use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn describe(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{} {}", f.field, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Prediction API errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No model loaded; retry later or alert an operator
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Request body failed validation
    #[error("Invalid request: {}", describe(.fields))]
    BadRequest { fields: Vec<FieldError> },

    /// Scoring failed inside the loaded pipeline
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn bad_request(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::BadRequest {
            fields: vec![FieldError::new(field, reason)],
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ServiceError::BadRequest { .. } => "BAD_REQUEST",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(error_code = error_code, message = %message, "Rejected request");
        }

        let mut error = json!({
            "code": error_code,
            "message": message,
            "status": status.as_u16(),
        });
        if let ServiceError::BadRequest { fields } = &self {
            error["fields"] = json!(fields);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
