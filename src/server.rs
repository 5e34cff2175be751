//! HTTP surface: the upload endpoint and the liveness root.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `GET`  | `/` | `{"message": "Document Intelligence System is running!"}` |
//! | `POST` | `/upload-document/` | `{"success": true, "data": ProcessingResult}` |
//! | `GET`  | `/static/*` | frontend files, when a static directory is configured |
//!
//! Failures come back as `{"detail": "<error message>"}`: `500` for
//! pipeline errors, `422` for a malformed upload, `413` when the body limit is
//! exceeded.

use crate::error::DocIntelError;
use crate::output::ProcessingResult;
use crate::pipeline::input::UploadedDocument;
use crate::process::DocumentProcessor;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const ROOT_MESSAGE: &str = "Document Intelligence System is running!";

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "file";

/// HTTP-side settings; provider settings live in [`crate::ProcessorConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory uploads are staged in. Default: `uploads`.
    pub upload_dir: PathBuf,
    /// Frontend directory served under `/static`. Default: none.
    pub static_dir: Option<PathBuf>,
    /// Request body limit in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            static_dir: None,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Shared across handlers; read-only after start-up.
#[derive(Clone)]
pub struct AppState {
    processor: Arc<DocumentProcessor>,
    upload_dir: Arc<PathBuf>,
    max_upload_bytes: usize,
}

/// Build the application router.
pub fn router(processor: DocumentProcessor, config: &ServerConfig) -> Router {
    let state = AppState {
        processor: Arc::new(processor),
        upload_dir: Arc::new(config.upload_dir.clone()),
        max_upload_bytes: config.max_upload_bytes,
    };

    let mut app = Router::new()
        .route("/", get(root))
        .route("/upload-document/", post(upload_document))
        .route("/upload-document", post(upload_document));

    if let Some(dir) = &config.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /`
async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": ROOT_MESSAGE }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub data: ProcessingResult,
}

/// `POST /upload-document/`
async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let document = read_upload(&mut multipart, state.max_upload_bytes).await?;
    info!(file = %document.file_name(), bytes = document.len(), "Upload received");
    if document.is_empty() {
        warn!(file = %document.file_name(), "Upload is empty; processing anyway");
    }

    // Held until processing finishes; the staged file is removed on drop.
    let _staged = document.stage(&state.upload_dir).await?;
    let result = state.processor.process(&document).await?;

    Ok(Json(UploadResponse {
        success: true,
        data: result,
    }))
}

/// Pull the `file` part out of the multipart body; other parts are ignored.
async fn read_upload(
    multipart: &mut Multipart,
    limit: usize,
) -> Result<UploadedDocument, DocIntelError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        return Ok(UploadedDocument::new(&file_name, bytes));
    }
    Err(DocIntelError::Upload(format!(
        "multipart field '{FILE_FIELD}' is required"
    )))
}

fn multipart_error(err: MultipartError, limit: usize) -> DocIntelError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DocIntelError::UploadTooLarge { limit }
    } else {
        DocIntelError::Upload(err.body_text())
    }
}

/// Error response: `{"detail": message}` with a status matching the error.
#[derive(Debug)]
pub struct ApiError(pub DocIntelError);

impl From<DocIntelError> for ApiError {
    fn from(e: DocIntelError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            DocIntelError::Upload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DocIntelError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
