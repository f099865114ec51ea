use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SharedState;
use crate::cache::{RecoveryReport, UploadOutcome, MAX_DOCUMENTS};
use crate::collaborators::{ComparisonMode, SummaryStyle};
use crate::error::{AppResult, ServerError};
use crate::memory::{task_metadata, MemorySnapshot, Role};
use crate::router::Category;

/// One file received for upload
///
/// When `size_bytes` exceeds `bytes.len()` the body was dropped while
/// streaming because it was over the per-file limit.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub size_bytes: u64,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            bytes,
        }
    }

    /// A file whose body was discarded after `size_bytes` were seen.
    pub fn oversize(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            bytes: Vec::new(),
            size_bytes,
        }
    }

    pub fn is_oversize(&self) -> bool {
        self.size_bytes > self.bytes.len() as u64
    }
}

/// Per-file upload status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Accepted,
    Skipped,
    Rejected,
}

/// Per-file upload result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    pub name: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<String>,
}

/// Batch upload result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub success: bool,
    pub message: String,
    pub files: Vec<UploadItem>,
    pub evicted: Vec<String>,
    pub errors: Vec<String>,
    pub total_uploaded: usize,
    pub total_skipped: usize,
    pub total_errors: usize,
}

impl UploadReport {
    /// True when no file was accepted or skipped.
    pub fn nothing_processed(&self) -> bool {
        self.total_uploaded == 0 && self.total_skipped == 0
    }
}

/// Query request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Query reply
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub success: bool,
    pub task_type: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    pub confidence: f64,
    pub reasoning: String,
    pub memory: MemorySnapshot,
}

/// Upload-then-query reply
#[derive(Debug, Clone, Serialize)]
pub struct UploadAndQueryResponse {
    pub success: bool,
    pub upload: UploadReport,
    pub query: QueryResponse,
}

fn default_summary_type() -> String {
    "brief".to_string()
}

fn default_comparison_type() -> String {
    "comprehensive".to_string()
}

/// Direct summarization request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default = "default_summary_type")]
    pub summary_type: String,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
    pub success: bool,
}

/// Direct comparison request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    pub text1: String,
    pub text2: String,
    #[serde(default = "default_comparison_type")]
    pub comparison_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareResponse {
    pub comparison: String,
    pub success: bool,
}

/// Memory inspection reply
#[derive(Debug, Clone, Serialize)]
pub struct MemoryResponse {
    pub success: bool,
    pub memory: MemorySnapshot,
    pub context_summary: String,
}

/// Generic acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

/// Resident document listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub has_raw_file: bool,
    pub has_index: bool,
    pub created_at: String,
}

/// Resident document listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesResponse {
    pub files: Vec<FileInfo>,
    pub count: usize,
    pub max_allowed: usize,
}

/// Health reply
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cache_size: usize,
    pub max_documents: usize,
    pub memory_ready: bool,
    pub missing_indices: Vec<String>,
    pub orphaned_indices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_error: Option<String>,
}

/// Store each file and register accepted ones as conversation context.
///
/// The upload lock is held from cache acceptance through the memory update,
/// so document context always lists residents in cache order.
pub async fn handle_upload(state: &SharedState, files: Vec<UploadedFile>) -> UploadReport {
    let mut items = Vec::with_capacity(files.len());
    let mut evicted_all = Vec::new();
    let mut errors = Vec::new();

    for file in files {
        let _guard = state.upload_lock.lock().await;
        let outcome = if file.is_oversize() {
            state.cache.reject_oversize(&file.name, file.size_bytes)
        } else {
            state.cache.upload(&file.name, &file.bytes).await
        };
        match outcome {
            UploadOutcome::Accepted { document, evicted } => {
                for name in &evicted {
                    state.memory.remove_document_context(name).await;
                }
                state.memory.add_document_context(&document.name).await;
                state
                    .memory
                    .add_message(
                        Role::System,
                        format!("PDF uploaded: {}", document.name),
                        task_metadata("upload"),
                    )
                    .await;
                evicted_all.extend(evicted);
                items.push(UploadItem {
                    name: document.name,
                    status: UploadStatus::Accepted,
                    reason: None,
                    existing: None,
                });
            }
            UploadOutcome::SkippedDuplicate { reason, existing } => {
                items.push(UploadItem {
                    name: file.name,
                    status: UploadStatus::Skipped,
                    reason: Some(reason.to_string()),
                    existing: Some(existing),
                });
            }
            UploadOutcome::Rejected { reason } => {
                errors.push(reason.to_string());
                items.push(UploadItem {
                    name: file.name,
                    status: UploadStatus::Rejected,
                    reason: Some(reason.to_string()),
                    existing: None,
                });
            }
        }
    }

    let count = |status| items.iter().filter(|i| i.status == status).count();
    let total_uploaded = count(UploadStatus::Accepted);
    let total_skipped = count(UploadStatus::Skipped);
    let total_errors = count(UploadStatus::Rejected);

    let mut message = format!(
        "Processed {} file(s): {} uploaded, {} skipped",
        items.len(),
        total_uploaded,
        total_skipped
    );
    if total_errors > 0 {
        message.push_str(&format!(", {} error(s)", total_errors));
    }

    info!(
        uploaded = total_uploaded,
        skipped = total_skipped,
        errors = total_errors,
        "Upload batch processed"
    );

    UploadReport {
        success: total_uploaded + total_skipped > 0,
        message,
        files: items,
        evicted: evicted_all,
        errors,
        total_uploaded,
        total_skipped,
        total_errors,
    }
}

/// Classify and answer one query.
pub async fn handle_query(
    state: &SharedState,
    request: QueryRequest,
) -> Result<QueryResponse, ServerError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ServerError::BadRequest {
            message: "query must not be empty".to_string(),
        });
    }

    let request_id = Uuid::new_v4();
    debug!(request_id = %request_id, "Query received");

    let names = state.cache.names().await;
    let context = if names.is_empty() {
        "No documents uploaded".to_string()
    } else {
        format!("Resident documents: {}", names.join(", "))
    };

    let classification = state.router.classify(query, Some(&context)).await;
    let outcome = state.dispatcher.dispatch(query, &classification).await;

    info!(
        request_id = %request_id,
        category = %classification.category,
        success = outcome.success,
        "Query handled"
    );

    if outcome.success {
        state
            .memory
            .add_message(
                Role::Assistant,
                outcome.response.clone(),
                task_metadata(outcome.task_type.as_str()),
            )
            .await;
    }

    Ok(QueryResponse {
        response: outcome.response,
        success: outcome.success,
        task_type: outcome.task_type,
        sources: (!outcome.sources.is_empty()).then_some(outcome.sources),
        confidence: classification.confidence,
        reasoning: classification.reasoning,
        memory: state.memory.snapshot().await,
    })
}

/// Upload a batch, then answer `query` against the updated cache.
///
/// The query is checked before anything is stored. A batch in which no
/// file was accepted or skipped fails without running the query.
pub async fn handle_upload_and_query(
    state: &SharedState,
    files: Vec<UploadedFile>,
    query: String,
) -> Result<UploadAndQueryResponse, ServerError> {
    if query.trim().is_empty() {
        return Err(ServerError::BadRequest {
            message: "query must not be empty".to_string(),
        });
    }
    let upload = accept_upload(state, files).await?;
    let query = handle_query(state, QueryRequest { query }).await?;
    Ok(UploadAndQueryResponse {
        success: upload.success && query.success,
        upload,
        query,
    })
}

/// [`handle_upload`] that treats an empty or wholly rejected batch as a bad request.
pub async fn accept_upload(
    state: &SharedState,
    files: Vec<UploadedFile>,
) -> Result<UploadReport, ServerError> {
    if files.is_empty() {
        return Err(ServerError::BadRequest {
            message: "no files provided".to_string(),
        });
    }
    let report = handle_upload(state, files).await;
    if report.nothing_processed() {
        return Err(ServerError::BadRequest {
            message: format!("No files were processed. Errors: {}", report.errors.join("; ")),
        });
    }
    Ok(report)
}

/// Summarize text supplied in the request.
pub async fn handle_summarize(
    state: &SharedState,
    request: SummarizeRequest,
) -> Result<SummarizeResponse, ServerError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ServerError::BadRequest {
            message: "text must not be empty".to_string(),
        });
    }
    let style = SummaryStyle::resolve(&request.summary_type, request.audience.as_deref())
        .map_err(|message| ServerError::BadRequest { message })?;

    let outcome = state.dispatcher.summarize_text(text, style).await;
    Ok(SummarizeResponse {
        summary: outcome.response,
        success: outcome.success,
    })
}

/// Compare two texts supplied in the request.
pub async fn handle_compare(
    state: &SharedState,
    request: CompareRequest,
) -> Result<CompareResponse, ServerError> {
    let (text_a, text_b) = (request.text1.trim(), request.text2.trim());
    if text_a.is_empty() || text_b.is_empty() {
        return Err(ServerError::BadRequest {
            message: "text1 and text2 must not be empty".to_string(),
        });
    }
    let mode: ComparisonMode = request
        .comparison_type
        .parse()
        .map_err(|message| ServerError::BadRequest { message })?;

    let outcome = state.dispatcher.compare_texts(text_a, text_b, mode).await;
    Ok(CompareResponse {
        comparison: outcome.response,
        success: outcome.success,
    })
}

pub async fn handle_memory(state: &SharedState) -> MemoryResponse {
    let memory = state.memory.snapshot().await;
    MemoryResponse {
        success: true,
        context_summary: memory.summary.clone(),
        memory,
    }
}

/// Clear the message history; document context and topic are kept.
pub async fn handle_clear_memory(state: &SharedState) -> StatusResponse {
    state.memory.clear_messages().await;
    StatusResponse {
        success: true,
        message: "Conversation memory cleared".to_string(),
    }
}

pub async fn handle_list_files(state: &SharedState) -> FilesResponse {
    let files: Vec<FileInfo> = state
        .cache
        .documents()
        .await
        .into_iter()
        .map(|d| FileInfo {
            has_raw_file: d.storage_path.exists(),
            has_index: d.index_path.exists(),
            name: d.name,
            content_hash: d.content_hash,
            size_bytes: d.size_bytes,
            created_at: d.created_at.to_rfc3339(),
        })
        .collect();
    FilesResponse {
        count: files.len(),
        files,
        max_allowed: MAX_DOCUMENTS,
    }
}

/// Remove a resident document and drop it from conversation context.
pub async fn handle_delete_file(
    state: &SharedState,
    name: &str,
) -> Result<StatusResponse, ServerError> {
    let _guard = state.upload_lock.lock().await;
    match state.cache.remove(name).await {
        Some(document) => {
            state.memory.remove_document_context(&document.name).await;
            Ok(StatusResponse {
                success: true,
                message: format!("File {} deleted successfully", document.name),
            })
        }
        None => Err(ServerError::NotFound {
            message: format!("File {} not found", name),
        }),
    }
}

pub async fn handle_health(state: &SharedState) -> HealthResponse {
    let recovery: RecoveryReport = state.cache.last_recovery().await;
    HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cache_size: state.cache.len().await,
        max_documents: MAX_DOCUMENTS,
        memory_ready: true,
        missing_indices: recovery.missing_index,
        orphaned_indices: recovery.orphaned,
        manifest_error: recovery.manifest_error,
    }
}

/// Restore the cache from disk and seed conversation context with it.
pub async fn handle_startup(state: &SharedState) -> AppResult<RecoveryReport> {
    let report = state.cache.recover().await?;
    for name in &report.recovered {
        state.memory.add_document_context(name).await;
    }
    if !report.recovered.is_empty() {
        state
            .memory
            .add_message(
                Role::System,
                format!("Restored documents: {}", report.recovered.join(", ")),
                Map::new(),
            )
            .await;
    }
    Ok(report)
}

/// Graceful-shutdown hook. Idempotent.
///
/// Persists the manifest, or wipes every artifact when
/// `PURGE_ON_SHUTDOWN` is set.
pub async fn handle_shutdown(state: &SharedState) -> AppResult<()> {
    if state.config.storage.purge_on_shutdown {
        warn!("Purging cached documents on shutdown");
        state.cache.purge_all().await?;
    } else {
        state.cache.save().await?;
    }
    info!("Shutdown hook complete");
    Ok(())
}
