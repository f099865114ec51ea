//! Versioned on-disk record of resident documents.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::persist::atomic_write;
use crate::error::{PersistenceError, PersistenceResult};

/// One manifest row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Resident documents in acceptance order (oldest first)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub documents: Vec<ManifestEntry>,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            version: Self::VERSION,
            documents: Vec::new(),
        }
    }
}

impl CacheManifest {
    pub const VERSION: u32 = 1;

    pub fn new(documents: Vec<ManifestEntry>) -> Self {
        Self {
            version: Self::VERSION,
            documents,
        }
    }

    /// Read the manifest at `path`; a missing file is an empty manifest.
    pub fn load(path: &Path) -> PersistenceResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(PersistenceError::io(path, e)),
        };
        let manifest: CacheManifest = serde_json::from_slice(&bytes)?;
        if manifest.version != Self::VERSION {
            return Err(PersistenceError::Manifest {
                message: format!(
                    "unsupported manifest version {} (expected {})",
                    manifest.version,
                    Self::VERSION
                ),
            });
        }
        Ok(manifest)
    }

    /// Atomically write the manifest to `path`.
    pub fn save(&self, path: &Path) -> PersistenceResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &bytes)
    }
}
