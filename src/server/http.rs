//! HTTP routes.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/upload` | multipart `files` fields |
//! | `POST` | `/query` | `{"query": "..."}` |
//! | `POST` | `/upload-and-query` | multipart `files` fields plus a `query` field |
//! | `POST` | `/summarize` | `{"text": "...", "summary_type": "brief"}` |
//! | `POST` | `/compare` | `{"text1": "...", "text2": "...", "comparison_type": "..."}` |
//! | `GET` | `/memory` | memory snapshot |
//! | `POST` | `/memory/clear` | clear message history |
//! | `GET` | `/files` | resident documents |
//! | `DELETE` | `/files/{name}` | remove a document |
//! | `GET` | `/health` | liveness and cache size |
//!
//! Errors use `{ "error": { "code": "...", "message": "..." } }`.
//!
//! Request bodies are not capped as a whole. File fields are streamed and
//! the per-file limit is enforced on each one, so an oversize file is
//! rejected on its own while the rest of the batch is accepted.

use std::collections::HashMap;

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use super::handlers::{self, CompareRequest, QueryRequest, SummarizeRequest, UploadedFile};
use super::SharedState;
use crate::error::ServerError;

/// Cap on a non-file multipart field such as `query`.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error converted into an HTTP response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::BadRequest { message } => Self::bad_request(message),
            ServerError::NotFound { message } => Self {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Build the router over `state`.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload", post(upload))
        .route("/query", post(query))
        .route("/upload-and-query", post(upload_and_query))
        .route("/summarize", post(summarize))
        .route("/compare", post(compare))
        .route("/memory", get(memory))
        .route("/memory/clear", post(clear_memory))
        .route("/files", get(list_files))
        .route("/files/{name}", delete(delete_file))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM, then run the shutdown hook.
pub async fn run(state: SharedState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: bind.to_string(),
            source,
        })?;
    info!(addr = %bind, "HTTP server listening");

    axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    handlers::handle_shutdown(&state).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Files and text fields from one multipart body
#[derive(Default)]
struct MultipartForm {
    files: Vec<UploadedFile>,
    text: HashMap<String, String>,
}

async fn read_form(
    multipart: &mut Multipart,
    max_file_bytes: u64,
) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        if field_name == "files" {
            let name = field.file_name().unwrap_or_default().to_string();
            form.files.push(read_file(&mut field, name, max_file_bytes).await?);
        } else {
            let text = read_text(&mut field, &field_name).await?;
            form.text.insert(field_name, text);
        }
    }
    Ok(form)
}

/// Stream one file field, keeping its bytes only while within `max_bytes`.
async fn read_file(
    field: &mut Field<'_>,
    name: String,
    max_bytes: u64,
) -> Result<UploadedFile, ApiError> {
    let mut bytes = Vec::new();
    let mut size_bytes: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read {}: {}", name, e)))?
    {
        size_bytes += chunk.len() as u64;
        if size_bytes <= max_bytes {
            bytes.extend_from_slice(&chunk);
        } else if !bytes.is_empty() {
            bytes = Vec::new();
        }
    }

    if size_bytes > max_bytes {
        debug!(file = %name, size_bytes, "Discarded oversize upload body");
        Ok(UploadedFile::oversize(name, size_bytes))
    } else {
        Ok(UploadedFile::new(name, bytes))
    }
}

async fn read_text(field: &mut Field<'_>, field_name: &str) -> Result<String, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read {}: {}", field_name, e)))?
    {
        if bytes.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(ApiError::bad_request(format!(
                "field {} exceeds {} bytes",
                field_name, MAX_TEXT_FIELD_BYTES
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes)
        .map_err(|_| ApiError::bad_request(format!("field {} is not valid UTF-8", field_name)))
}

async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(&mut multipart, state.cache.max_upload_bytes()).await?;
    Ok(Json(handlers::accept_upload(&state, form.files).await?))
}

async fn query(
    State(state): State<SharedState>,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(handlers::handle_query(&state, request).await?))
}

async fn upload_and_query(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_form(&mut multipart, state.cache.max_upload_bytes()).await?;
    let query = form.text.remove("query").unwrap_or_default();
    let response = handlers::handle_upload_and_query(&state, form.files, query).await?;
    Ok(Json(response))
}

async fn summarize(
    State(state): State<SharedState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(handlers::handle_summarize(&state, request).await?))
}

async fn compare(
    State(state): State<SharedState>,
    Json(request): Json<CompareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(handlers::handle_compare(&state, request).await?))
}

async fn memory(State(state): State<SharedState>) -> impl IntoResponse {
    Json(handlers::handle_memory(&state).await)
}

async fn clear_memory(State(state): State<SharedState>) -> impl IntoResponse {
    Json(handlers::handle_clear_memory(&state).await)
}

async fn list_files(State(state): State<SharedState>) -> impl IntoResponse {
    Json(handlers::handle_list_files(&state).await)
}

async fn delete_file(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(handlers::handle_delete_file(&state, &name).await?))
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(handlers::handle_health(&state).await)
}
