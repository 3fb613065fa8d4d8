//! HTTP API
//!
//! `POST /api/execute` runs a snippet and `GET /health` is a liveness probe.

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::sandbox::ExecutionResult;
use crate::service::ExecutionService;

// ---- Error Handling ----

/// Error wrapper that renders as the execute endpoint's JSON shape
pub struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            if self.0.is_infrastructure() {
                error!("Sandbox unavailable: {}", self.0);
            } else {
                error!("Code execution error: {}", self.0);
            }
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ExecuteResponse {
            success: false,
            output: None,
            error: Some(self.0.public_message()),
            execution_time: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

// ---- Request / Response Types ----

/// Body of `POST /api/execute`
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
}

/// Response of `POST /api/execute`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        let error = result.error_text();
        ExecuteResponse {
            success: result.success,
            execution_time: Some(result.execution_time_ms()),
            output: Some(result.stdout),
            error,
        }
    }
}

// ---- Handlers ----

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn execute_code(
    State(service): State<ExecutionService>,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<ExecuteResponse>, AppError> {
    let result = service
        .submit(body.code, body.language.as_deref(), body.input)
        .await?;
    Ok(Json(result.into()))
}

// ---- Router ----

/// Build the API router around an execution service
pub fn build_router(service: ExecutionService, config: &ServerConfig) -> Router {
    let api = Router::new().route("/execute", post(execute_code));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(service)
        .layer(cors_layer(config))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let Some(origin) = &config.cors_origin else {
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any),
        Err(e) => {
            warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
            CorsLayer::permissive()
        }
    }
}
