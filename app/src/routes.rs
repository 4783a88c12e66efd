//! HTTP surface of the prediction service.

use std::time::Duration;

use agrirec::{PredictionRequest, ServiceError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// A handler failure, rendered as `{"error", "kind"}`.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(ServiceError::Validation(format!(
            "Invalid JSON body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Validation(_) | ServiceError::UnknownCategory { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("request failed: {}", self.0);
        } else {
            log::debug!("rejected request: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

type Body = Result<Json<PredictionRequest>, JsonRejection>;

pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/meta", get(meta))
        .route("/states", get(states))
        .route("/districts/{state}", get(districts))
        .route("/predict_crop", post(predict_crop))
        .route("/api/predict_crop", post(predict_crop))
        .route("/predict_fertilizer", post(predict_fertilizer))
        .route("/check_suitability", post(check_suitability))
        .route("/check", post(check_suitability));
    with_timeout(router.with_state(state), request_timeout)
}

/// Cuts off slow requests with a 408 carrying the usual JSON error body.
fn with_timeout(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(middleware::map_response(timeout_body))
}

async fn timeout_body(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    log::warn!("request timed out");
    let body = ErrorResponse {
        error: "Request timed out".to_string(),
        kind: "timeout",
    };
    (StatusCode::REQUEST_TIMEOUT, Json(body)).into_response()
}

async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "OK", "models": state.service.status() }))
}

async fn meta(State(state): State<AppState>) -> Json<agrirec::Meta> {
    Json(state.service.meta())
}

async fn states(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "states": state.districts.states(),
        "mapping": state.districts.mapping(),
    }))
}

async fn districts(State(state): State<AppState>, Path(name): Path<String>) -> Json<Value> {
    Json(json!({ "districts": state.districts.districts(&name) }))
}

async fn predict_crop(State(state): State<AppState>, body: Body) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let crop = state.service.predict_crop(&request)?;
    Ok(Json(json!({ "crop": crop })))
}

async fn predict_fertilizer(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let fertilizer = state.service.predict_fertilizer(&request)?;
    Ok(Json(json!({ "fertilizer": fertilizer })))
}

async fn check_suitability(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<agrirec::SuitabilityReport>, ApiError> {
    let Json(request) = body?;
    Ok(Json(state.service.check_suitability(&request)?))
}
