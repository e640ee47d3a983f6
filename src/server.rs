//! HTTP boundary: `POST /generate` and a liveness route.
//!
//! ```text
//! POST /generate   multipart: file (binary), mode ("flashcards" | "quiz")
//!   200 {"result": {"flashcards": [...]}}   or {"result": {"quiz": [...]}}
//!   400 {"error": "...", "code": "...", "recoverable": false}
//!   500 {"error": "...", "code": "...", "recoverable": ...}
//! GET /            {"message": "flashgen backend is live"}
//! ```
//!
//! When a client disconnects, axum drops the handler future, which drops the
//! in-flight gateway request with it.

use crate::config::ServerConfig;
use crate::document::UploadedDocument;
use crate::error::{ErrorKind, PipelineError};
use crate::generate::Pipeline;
use crate::output::{GenerationMode, GenerationResult};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Liveness message returned by `GET /`.
pub const LIVENESS_MESSAGE: &str = "flashgen backend is live";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Successful `POST /generate` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: GenerationResult,
}

/// Error body for every non-200 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling.
    pub code: ErrorKind,
    /// Whether repeating the same request may succeed.
    pub recoverable: bool,
}

/// Build the application router.
pub fn router(pipeline: Arc<Pipeline>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/generate", post(generate))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline })
}

/// Bind `config.bind_addr()` and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &ServerConfig, pipeline: Pipeline) -> std::io::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        origins = %config.allowed_origins.join(","),
        max_upload_mb = config.max_upload_bytes / 1024 / 1024,
        "Server ready and accepting connections"
    );

    let app = router(Arc::new(pipeline), config);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        warn!("CORS configured to allow all origins");
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(parsed)
}

async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": LIVENESS_MESSAGE }))
}

async fn generate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerateResponse>, PipelineError> {
    let multipart = multipart
        .map_err(|e| PipelineError::InvalidRequest(format!("Expected a multipart form: {e}")))?;
    let (document, mode) = read_form(multipart).await?;

    let output = state.pipeline.generate(&document, mode).await?;
    debug!(stats = ?output.stats, "generation finished");
    Ok(Json(GenerateResponse {
        result: output.result,
    }))
}

/// Pull the `file` and `mode` fields out of the form.
///
/// A file part with no bytes counts as missing; browsers send one when the
/// file input was left empty.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(UploadedDocument, GenerationMode), PipelineError> {
    let mut document = None;
    let mut mode = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::InvalidRequest(format!("Failed to read multipart: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("unknown").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    PipelineError::InvalidRequest(format!("Failed to read file data: {e}"))
                })?;
                if !data.is_empty() {
                    document = Some(UploadedDocument::new(data, content_type, filename));
                }
            }
            Some("mode") => {
                let text = field.text().await.map_err(|e| {
                    PipelineError::InvalidRequest(format!("Failed to read mode: {e}"))
                })?;
                mode = Some(text);
            }
            _ => {}
        }
    }

    let document =
        document.ok_or_else(|| PipelineError::InvalidRequest("No file uploaded".to_string()))?;
    let mode = mode
        .ok_or_else(|| PipelineError::InvalidRequest("Missing 'mode' field".to_string()))?
        .parse::<GenerationMode>()?;
    Ok((document, mode))
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        log_error(&self);

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.kind(),
            recoverable: self.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

fn log_error(e: &PipelineError) {
    let kind = e.kind().as_str();
    match e {
        // Blocks every request until an operator fixes the environment.
        PipelineError::MissingCredential { .. } | PipelineError::Internal(_) => {
            error!(error = %e, kind, "Request failed");
        }
        _ if e.status_code() >= 500 => warn!(error = %e, kind, "Request failed"),
        _ => info!(error = %e, kind, "Request rejected"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
    info!("Shutting down gracefully...");
}
