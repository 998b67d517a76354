//! HTTP handlers
//!
//! Core calls block on disk and CPU, so each one runs on the blocking pool.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::error::Error;
use crate::evaluation::MetricsReport;
use crate::feedback::FeedbackRecord;
use crate::server::ServerState;
use crate::types::Label;

/// Predict request
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

/// Predict response
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Label,
    pub confidence: f64,
    pub model_version: u32,
}

/// Feedback request; labels are parsed leniently by name
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub text: String,
    pub model_prediction: String,
    pub human_label: String,
}

/// Feedback response
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub version: Option<u32>,
}

/// Metrics response
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub version: u32,
    pub metrics: MetricsReport,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub current_version: Option<u32>,
}

/// HTTP status for each core error
fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::VersionNotFound(_) => StatusCode::NOT_FOUND,
        Error::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        Error::RetrainInProgress => StatusCode::CONFLICT,
        Error::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Storage { .. } | Error::Corrupted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: Error) -> Response {
    let status = status_for(&err);
    if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
        error!("Request failed: {}", err);
    }
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "kind": err.kind()
        })),
    )
        .into_response()
}

/// Run a blocking core call off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(error_response(e)),
        Err(e) => {
            error!("Blocking task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal task failure",
                    "kind": "internal_error"
                })),
            )
                .into_response())
        }
    }
}

/// Service descriptor
pub async fn index_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "name": "HumanLoop",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "predict": "POST /predict",
                "feedback": "POST /feedback",
                "metrics": "GET /metrics?version=N",
                "model_version": "GET /model/version",
                "health": "GET /health"
            }
        })),
    )
}

/// Health handler
pub async fn health_handler(State(state): State<ServerState>) -> Response {
    let registry = state.app.registry.clone();
    match blocking(move || registry.current_version()).await {
        Ok(current) => {
            let response = HealthResponse {
                status: "ok".to_string(),
                model_loaded: current.is_some(),
                current_version: current,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(response) => response,
    }
}

/// Prediction handler
pub async fn predict_handler(
    State(state): State<ServerState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(Error::InvalidInput(rejection.body_text())),
    };
    let predictor = state.app.predictor.clone();
    match blocking(move || predictor.predict(&req.text)).await {
        Ok(prediction) => {
            let response = PredictResponse {
                prediction: prediction.label,
                confidence: prediction.confidence,
                model_version: prediction.version,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(response) => response,
    }
}

/// Feedback handler; the record is durable before success is reported
pub async fn feedback_handler(
    State(state): State<ServerState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(Error::InvalidInput(rejection.body_text())),
    };
    let app = state.app.clone();
    let result = blocking(move || {
        if req.text.trim().is_empty() {
            return Err(Error::InvalidInput("text must not be empty".to_string()));
        }
        let model_prediction: Label = req.model_prediction.parse()?;
        let human_label: Label = req.human_label.parse()?;
        let model_version = app.registry.current_version()?.unwrap_or(0);

        let record = FeedbackRecord::new(req.text, model_prediction, human_label, model_version);
        app.feedback.append(&record)?;
        Ok(record)
    })
    .await;

    match result {
        Ok(record) => {
            info!(
                "Feedback recorded ({} -> {}, model v{})",
                record.model_prediction, record.human_label, record.model_version
            );
            let response = FeedbackResponse {
                message: "Feedback recorded".to_string(),
                timestamp: record.timestamp,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(response) => response,
    }
}

/// Metrics handler; an unknown version is a 404, never the current version
pub async fn metrics_handler(
    State(state): State<ServerState>,
    query: Result<Query<MetricsQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return error_response(Error::InvalidInput(rejection.body_text())),
    };
    let registry = state.app.registry.clone();
    match blocking(move || registry.get(query.version)).await {
        Ok(model) => {
            let response = MetricsResponse {
                version: model.version,
                metrics: model.metrics.clone(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(response) => response,
    }
}

/// Current model version handler
pub async fn model_version_handler(State(state): State<ServerState>) -> Response {
    let registry = state.app.registry.clone();
    match blocking(move || registry.current_version()?.ok_or(Error::ModelNotLoaded)).await {
        Ok(version) => (
            StatusCode::OK,
            Json(json!({
                "version": format!("v{}", version),
                "version_number": version
            })),
        )
            .into_response(),
        Err(response) => response,
    }
}
