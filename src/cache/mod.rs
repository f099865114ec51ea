//! Bounded, deduplicating document cache with crash-consistent persistence.
//!
//! At most [`MAX_DOCUMENTS`] documents are resident. A document is identified
//! both by its sanitized name and by the SHA-256 of its bytes; either match
//! makes a new upload a duplicate. When full, the oldest accepted document is
//! evicted (FIFO, independent of reads).
//!
//! Layout under the data directory:
//!
//! - `uploads/<name>`: raw bytes
//! - `indices/<name>.idx`: opaque index blob from the [`Indexer`]
//! - `manifest.json`: [`CacheManifest`] in acceptance order
//!
//! Every mutation holds the write lock for its whole read-modify-persist
//! sequence. Index building happens before the lock is taken.

mod manifest;
mod persist;

pub use manifest::{CacheManifest, ManifestEntry};
pub use persist::{atomic_write, quarantine, remove_dir_if_exists, remove_file_if_exists};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::collaborators::{bounded, IndexHandle, Indexer};
use crate::config::StorageConfig;
use crate::error::{PersistenceResult, ValidationError};

/// Maximum number of resident documents.
pub const MAX_DOCUMENTS: usize = 2;

const INDEX_EXTENSION: &str = "idx";

/// A resident document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub name: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub storage_path: PathBuf,
    pub index_path: PathBuf,
    pub index: IndexHandle,
    pub created_at: DateTime<Utc>,
}

impl Document {
    fn manifest_entry(&self) -> ManifestEntry {
        ManifestEntry {
            name: self.name.clone(),
            content_hash: self.content_hash.clone(),
            size_bytes: self.size_bytes,
            created_at: self.created_at,
        }
    }
}

/// Which identity an upload collided on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateReason {
    #[serde(rename = "duplicate_name")]
    Name,
    #[serde(rename = "duplicate_content")]
    Content,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::Name => f.write_str("duplicate_name"),
            DuplicateReason::Content => f.write_str("duplicate_content"),
        }
    }
}

/// Why an upload was refused
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Validation(ValidationError),
    Indexing(String),
    Persistence(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Validation(e) => write!(f, "{}", e),
            RejectReason::Indexing(msg) => write!(f, "Failed to index document: {}", msg),
            RejectReason::Persistence(msg) => write!(f, "Failed to store document: {}", msg),
        }
    }
}

/// Result of a single upload
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Accepted {
        document: Document,
        evicted: Vec<String>,
    },
    SkippedDuplicate {
        reason: DuplicateReason,
        existing: String,
    },
    Rejected {
        reason: RejectReason,
    },
}

/// What [`DocumentCache::recover`] found on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Documents made resident again, oldest first
    pub recovered: Vec<String>,
    /// Manifest entries whose index failed to deserialize
    pub skipped_corrupt: Vec<String>,
    /// Manifest entries with no index on disk
    pub missing_index: Vec<String>,
    /// Index files with no manifest entry
    pub orphaned: Vec<String>,
    /// Why the manifest could not be read, when it could not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_error: Option<String>,
    /// Where an unreadable manifest was moved to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantined_manifest: Option<PathBuf>,
}

#[derive(Default)]
struct CacheInner {
    /// Oldest first
    documents: Vec<Document>,
    last_recovery: RecoveryReport,
}

impl CacheInner {
    fn find(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    fn duplicate_of(&self, name: &str, content_hash: &str) -> Option<(DuplicateReason, String)> {
        if let Some(doc) = self.find(name) {
            return Some((DuplicateReason::Name, doc.name.clone()));
        }
        self.documents
            .iter()
            .find(|d| d.content_hash == content_hash)
            .map(|d| (DuplicateReason::Content, d.name.clone()))
    }

    fn manifest(&self) -> CacheManifest {
        CacheManifest::new(self.documents.iter().map(Document::manifest_entry).collect())
    }
}

/// The document cache
pub struct DocumentCache {
    storage: StorageConfig,
    max_upload_bytes: u64,
    indexer: Arc<dyn Indexer>,
    timeout: Duration,
    inner: RwLock<CacheInner>,
}

impl DocumentCache {
    pub fn new(
        storage: StorageConfig,
        max_upload_bytes: u64,
        indexer: Arc<dyn Indexer>,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            max_upload_bytes,
            indexer,
            timeout,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Validate, deduplicate, index and store one uploaded file.
    pub async fn upload(&self, raw_name: &str, bytes: &[u8]) -> UploadOutcome {
        let name = match validate(raw_name, bytes.len() as u64, self.max_upload_bytes) {
            Ok(name) => name,
            Err(e) => {
                warn!(file = %raw_name, error = %e, "Upload rejected");
                return UploadOutcome::Rejected {
                    reason: RejectReason::Validation(e),
                };
            }
        };
        let content_hash = content_hash(bytes);

        if let Some((reason, existing)) = self.inner.read().await.duplicate_of(&name, &content_hash)
        {
            info!(
                document = %name,
                existing = %existing,
                reason = %reason,
                "Duplicate upload skipped"
            );
            return UploadOutcome::SkippedDuplicate { reason, existing };
        }

        let index = match bounded(self.timeout, self.indexer.build_index(bytes)).await {
            Ok(index) => index,
            Err(e) => {
                error!(document = %name, error = %e, "Index build failed");
                return UploadOutcome::Rejected {
                    reason: RejectReason::Indexing(e.to_string()),
                };
            }
        };

        let mut inner = self.inner.write().await;

        // Another request may have stored the same document while we indexed
        if let Some((reason, existing)) = inner.duplicate_of(&name, &content_hash) {
            info!(
                document = %name,
                existing = %existing,
                reason = %reason,
                "Duplicate upload skipped"
            );
            return UploadOutcome::SkippedDuplicate { reason, existing };
        }

        let document = Document {
            storage_path: self.upload_path(&name),
            index_path: self.index_path(&name),
            name: name.clone(),
            content_hash,
            size_bytes: bytes.len() as u64,
            index,
            created_at: Utc::now(),
        };

        if let Err(e) = self.write_artifacts(&document, bytes) {
            error!(document = %name, error = %e, "Failed to persist document");
            self.delete_artifacts(&document);
            return UploadOutcome::Rejected {
                reason: RejectReason::Persistence(e.to_string()),
            };
        }

        let mut evicted = Vec::new();
        while inner.documents.len() >= MAX_DOCUMENTS {
            let oldest = inner.documents.remove(0);
            info!(document = %oldest.name, "Evicting oldest document");
            self.delete_artifacts(&oldest);
            evicted.push(oldest.name);
        }

        inner.documents.push(document.clone());
        if let Err(e) = inner.manifest().save(&self.storage.manifest_path()) {
            warn!(error = %e, "Failed to save manifest after upload");
        }

        info!(
            document = %document.name,
            size_bytes = document.size_bytes,
            resident = inner.documents.len(),
            "Document accepted"
        );
        UploadOutcome::Accepted { document, evicted }
    }

    /// Refuse a file whose body was dropped after it passed the size limit.
    ///
    /// Name checks still come first, so a `.txt` upload reports `NotPdf`.
    pub fn reject_oversize(&self, raw_name: &str, size_bytes: u64) -> UploadOutcome {
        let reason = match validate(raw_name, size_bytes, self.max_upload_bytes) {
            Err(e) => e,
            Ok(name) => ValidationError::TooLarge {
                name,
                size_bytes,
                limit_bytes: self.max_upload_bytes,
            },
        };
        warn!(file = %raw_name, error = %reason, "Upload rejected");
        UploadOutcome::Rejected {
            reason: RejectReason::Validation(reason),
        }
    }

    /// Per-file size limit in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Look up a resident document by name.
    pub async fn get(&self, name: &str) -> Option<Document> {
        self.inner.read().await.find(name).cloned()
    }

    /// Remove a document and its artifacts; `None` when it was not resident.
    pub async fn remove(&self, name: &str) -> Option<Document> {
        let mut inner = self.inner.write().await;
        let pos = inner.documents.iter().position(|d| d.name == name)?;
        let document = inner.documents.remove(pos);
        self.delete_artifacts(&document);
        if let Err(e) = inner.manifest().save(&self.storage.manifest_path()) {
            warn!(error = %e, "Failed to save manifest after removal");
        }
        info!(document = %name, "Document removed");
        Some(document)
    }

    /// Persist the manifest for the current resident set.
    pub async fn save(&self) -> PersistenceResult<()> {
        let inner = self.inner.write().await;
        inner.manifest().save(&self.storage.manifest_path())
    }

    /// Rebuild the resident set from disk without re-parsing any PDF.
    ///
    /// An unreadable manifest is moved aside rather than overwritten; the
    /// cache then starts empty and every index on disk is reported orphaned.
    pub async fn recover(&self) -> PersistenceResult<RecoveryReport> {
        let mut inner = self.inner.write().await;
        let manifest_path = self.storage.manifest_path();

        let mut report = RecoveryReport::default();
        let manifest = match CacheManifest::load(&manifest_path) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(error = %e, "Manifest unreadable, starting with an empty cache");
                report.manifest_error = Some(e.to_string());
                match quarantine(&manifest_path) {
                    Ok(moved) => {
                        warn!(path = %moved.display(), "Unreadable manifest set aside");
                        report.quarantined_manifest = Some(moved);
                    }
                    Err(e) => error!(error = %e, "Failed to set unreadable manifest aside"),
                }
                None
            }
        };
        let on_disk = self.scan_indices()?;

        let manifest_readable = manifest.is_some();
        let entries = manifest.map(|m| m.documents).unwrap_or_default();

        let mut documents = Vec::new();
        for entry in entries {
            if !on_disk.contains(&entry.name) {
                warn!(document = %entry.name, "Index missing for manifest entry");
                report.missing_index.push(entry.name);
                continue;
            }

            let index_path = self.index_path(&entry.name);
            let loaded = std::fs::read(&index_path)
                .map_err(|e| e.to_string())
                .and_then(|blob| self.indexer.load_index(blob).map_err(|e| e.to_string()));

            match loaded {
                Ok(index) => {
                    debug!(document = %entry.name, "Index recovered");
                    report.recovered.push(entry.name.clone());
                    documents.push(Document {
                        storage_path: self.upload_path(&entry.name),
                        index_path,
                        name: entry.name,
                        content_hash: entry.content_hash,
                        size_bytes: entry.size_bytes,
                        index,
                        created_at: entry.created_at,
                    });
                }
                Err(e) => {
                    warn!(document = %entry.name, error = %e, "Skipping corrupt index");
                    report.skipped_corrupt.push(entry.name);
                }
            }
        }

        for name in on_disk {
            let known = report.recovered.contains(&name)
                || report.skipped_corrupt.contains(&name);
            if !known {
                warn!(index = %name, "Index file has no manifest entry");
                report.orphaned.push(name);
            }
        }

        while documents.len() > MAX_DOCUMENTS {
            let oldest: Document = documents.remove(0);
            warn!(document = %oldest.name, "Recovered cache over capacity, evicting");
            self.delete_artifacts(&oldest);
            report.recovered.retain(|n| n != &oldest.name);
        }

        inner.documents = documents;
        inner.last_recovery = report.clone();
        if manifest_readable {
            inner.manifest().save(&manifest_path)?;
        }

        info!(
            recovered = report.recovered.len(),
            corrupt = report.skipped_corrupt.len(),
            missing = report.missing_index.len(),
            orphaned = report.orphaned.len(),
            "Cache recovery complete"
        );
        Ok(report)
    }

    /// Drop every resident document and delete all persisted artifacts.
    ///
    /// Idempotent.
    pub async fn purge_all(&self) -> PersistenceResult<()> {
        let mut inner = self.inner.write().await;
        inner.documents.clear();
        inner.last_recovery = RecoveryReport::default();
        remove_dir_if_exists(&self.storage.uploads_dir())?;
        remove_dir_if_exists(&self.storage.indices_dir())?;
        remove_file_if_exists(&self.storage.manifest_path())?;
        info!(data_dir = %self.storage.data_dir.display(), "All cached documents purged");
        Ok(())
    }

    /// Resident documents, oldest first.
    pub async fn documents(&self) -> Vec<Document> {
        self.inner.read().await.documents.clone()
    }

    /// Resident document names, oldest first.
    pub async fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .documents
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Report from the most recent [`recover`](Self::recover).
    pub async fn last_recovery(&self) -> RecoveryReport {
        self.inner.read().await.last_recovery.clone()
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    fn upload_path(&self, name: &str) -> PathBuf {
        self.storage.uploads_dir().join(name)
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.storage
            .indices_dir()
            .join(format!("{}.{}", name, INDEX_EXTENSION))
    }

    fn write_artifacts(&self, document: &Document, bytes: &[u8]) -> PersistenceResult<()> {
        atomic_write(&document.storage_path, bytes)?;
        atomic_write(&document.index_path, document.index.as_bytes())
    }

    fn delete_artifacts(&self, document: &Document) {
        for path in [&document.storage_path, &document.index_path] {
            if let Err(e) = remove_file_if_exists(path) {
                warn!(document = %document.name, error = %e, "Failed to delete artifact");
            }
        }
    }

    fn scan_indices(&self) -> PersistenceResult<Vec<String>> {
        let dir = self.storage.indices_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(crate::error::PersistenceError::io(dir, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name().into_string().ok()?;
                file_name
                    .strip_suffix(&format!(".{}", INDEX_EXTENSION))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Normalize an uploaded filename to the name used as cache key.
///
/// Keeps only the final path component and replaces spaces with `_`.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.replace(' ', "_"))
}

/// Hex SHA-256 of the raw bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn validate(raw_name: &str, size_bytes: u64, max_bytes: u64) -> Result<String, ValidationError> {
    let name = sanitize_name(raw_name).ok_or(ValidationError::MissingName)?;
    if !name.to_lowercase().ends_with(".pdf") {
        return Err(ValidationError::NotPdf { name });
    }
    if size_bytes == 0 {
        return Err(ValidationError::Empty { name });
    }
    if size_bytes > max_bytes {
        return Err(ValidationError::TooLarge {
            name,
            size_bytes,
            limit_bytes: max_bytes,
        });
    }
    Ok(name)
}
