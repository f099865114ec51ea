//! Atomic file replacement for cache artifacts.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PersistenceError, PersistenceResult};

/// Replace `path` with `content` so readers see either the old file or the new one.
///
/// The bytes go to a temporary file in the destination directory, which is
/// size-checked and synced before being renamed over `path`. On any failure
/// the temporary file is dropped (deleting it) and `path` is untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> PersistenceResult<()> {
    if content.is_empty() {
        return Err(PersistenceError::EmptyArtifact {
            path: path.to_path_buf(),
        });
    }

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| PersistenceError::io(parent, e))?;
    temp.write_all(content)
        .map_err(|e| PersistenceError::io(temp.path(), e))?;
    temp.flush().map_err(|e| PersistenceError::io(temp.path(), e))?;

    let written = temp
        .as_file()
        .metadata()
        .map_err(|e| PersistenceError::io(temp.path(), e))?
        .len();
    if written == 0 {
        return Err(PersistenceError::EmptyArtifact {
            path: path.to_path_buf(),
        });
    }

    temp.as_file()
        .sync_data()
        .map_err(|e| PersistenceError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| PersistenceError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = written, "Artifact committed");
    Ok(())
}

/// Delete a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> PersistenceResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}

/// Delete a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> PersistenceResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}

/// Move `path` aside to `<path>.bad`, replacing any earlier quarantined copy.
pub fn quarantine(path: &Path) -> PersistenceResult<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".bad");
    let target = PathBuf::from(target);
    fs::rename(path, &target).map_err(|e| PersistenceError::io(path, e))?;
    Ok(target)
}
