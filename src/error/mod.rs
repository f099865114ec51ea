use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("External service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Reasons an uploaded file is refused before it reaches the cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file object or missing filename")]
    MissingName,

    #[error("{name}: Only PDF files are allowed")]
    NotPdf { name: String },

    #[error("{name}: File is empty")]
    Empty { name: String },

    #[error(
        "{name}: File too large ({:.1}MB). Maximum size is {:.0}MB.",
        mib(.size_bytes),
        mib(.limit_bytes)
    )]
    TooLarge {
        name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },
}

fn mib(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

/// Disk persistence errors for cache artifacts
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to commit empty artifact: {}", .path.display())]
    EmptyArtifact { path: PathBuf },

    #[error("Manifest error: {message}")]
    Manifest { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of external collaborators (indexer, retriever, LLM)
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Index error: {message}")]
    Index { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why semantic classification could not produce a category.
///
/// The router never returns this; it folds it into a `general` result whose
/// reasoning carries the message.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classifier call failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Empty response from classifier")]
    EmptyResponse,

    #[error("Non-JSON response: {preview}")]
    NotJson { preview: String },

    #[error("Missing 'category' in output")]
    MissingCategory,
}

/// HTTP surface errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result type alias for collaborator calls
pub type ServiceResult<T> = Result<T, ServiceError>;
