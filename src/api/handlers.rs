use super::{parse_features, AppState, ServiceError};
use crate::model::Prediction;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_RUNNING: &str = "API is running";
const MODEL_LOADED: &str = "Model loaded successfully.";
const MODEL_NOT_LOADED: &str = "Error: Model not loaded.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<u32>,
}

fn health_of(state: &AppState) -> HealthResponse {
    let model = state.service.model();
    HealthResponse {
        status: API_RUNNING.to_string(),
        model_status: if model.is_some() { MODEL_LOADED } else { MODEL_NOT_LOADED }.to_string(),
        model_version: model.map(|m| m.version),
    }
}

/// Health check; always 200, reports whether a model is loaded
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_of(&state))
}

/// Liveness probe
pub async fn live() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 503 until a model is loaded
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let status = if state.service.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health_of(&state)))
}

/// Score one customer feature vector
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Prediction>, ServiceError> {
    if !state.service.is_ready() {
        return Err(ServiceError::Unavailable(
            "model not loaded; retry later or contact an operator".to_string(),
        ));
    }
    let Json(body) = payload.map_err(|e| ServiceError::bad_request("body", e.body_text()))?;
    let features = parse_features(&body)?;
    let prediction = state.service.predict(&features)?;
    tracing::debug!(
        risk_probability = prediction.risk_probability,
        is_high_risk = prediction.is_high_risk,
        "scored request"
    );
    Ok(Json(prediction))
}
