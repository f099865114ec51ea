//! Document cache integration tests
//!
//! Exercises the cache against a real temporary directory: capacity and
//! eviction, duplicate detection, and crash recovery from the manifest.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use common::{pdf_bytes, FakeIndexer};
use doc_assistant::cache::{
    CacheManifest, DocumentCache, DuplicateReason, RejectReason, UploadOutcome, MAX_DOCUMENTS,
};
use doc_assistant::config::StorageConfig;
use doc_assistant::error::ValidationError;

const TIMEOUT: Duration = Duration::from_secs(5);

fn storage(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        data_dir: dir.path().to_path_buf(),
        purge_on_shutdown: false,
    }
}

fn cache_with(dir: &TempDir, indexer: Arc<FakeIndexer>) -> DocumentCache {
    DocumentCache::new(storage(dir), 1024 * 1024, indexer, TIMEOUT)
}

fn accepted(outcome: UploadOutcome) -> Vec<String> {
    match outcome {
        UploadOutcome::Accepted { evicted, .. } => evicted,
        other => panic!("expected Accepted, got {:?}", other),
    }
}

// ============================================================================
// Capacity and eviction
// ============================================================================

#[tokio::test]
async fn test_third_upload_evicts_oldest() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, Arc::new(FakeIndexer::new()));

    assert!(accepted(cache.upload("a.pdf", &pdf_bytes("alpha")).await).is_empty());
    assert!(accepted(cache.upload("b.pdf", &pdf_bytes("beta")).await).is_empty());
    let evicted = accepted(cache.upload("c.pdf", &pdf_bytes("gamma")).await);

    assert_eq!(evicted, vec!["a.pdf".to_string()]);
    assert_eq!(cache.names().await, vec!["b.pdf", "c.pdf"]);
    assert_eq!(cache.len().await, MAX_DOCUMENTS);

    let storage = storage(&dir);
    assert!(!storage.uploads_dir().join("a.pdf").exists());
    assert!(!storage.indices_dir().join("a.pdf.idx").exists());
    assert!(storage.uploads_dir().join("c.pdf").exists());
    assert!(storage.indices_dir().join("c.pdf.idx").exists());

    let manifest = CacheManifest::load(&storage.manifest_path()).unwrap();
    let names: Vec<_> = manifest.documents.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["b.pdf", "c.pdf"]);
}

#[tokio::test]
async fn test_reads_do_not_change_eviction_order() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, Arc::new(FakeIndexer::new()));

    cache.upload("a.pdf", &pdf_bytes("alpha")).await;
    cache.upload("b.pdf", &pdf_bytes("beta")).await;
    assert!(cache.get("a.pdf").await.is_some());

    let evicted = accepted(cache.upload("c.pdf", &pdf_bytes("gamma")).await);
    assert_eq!(evicted, vec!["a.pdf".to_string()]);
}

#[tokio::test]
async fn test_failed_index_build_evicts_nothing() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, Arc::new(FakeIndexer::new()));
    cache.upload("a.pdf", &pdf_bytes("alpha")).await;
    cache.upload("b.pdf", &pdf_bytes("beta")).await;

    let failing = DocumentCache::new(
        storage(&dir),
        1024 * 1024,
        Arc::new(FakeIndexer {
            fail_build: true,
            ..FakeIndexer::default()
        }),
        TIMEOUT,
    );
    failing.recover().await.unwrap();

    match failing.upload("c.pdf", &pdf_bytes("gamma")).await {
        UploadOutcome::Rejected {
            reason: RejectReason::Indexing(msg),
        } => assert!(msg.contains("no extractable text")),
        other => panic!("expected indexing rejection, got {:?}", other),
    }
    assert_eq!(failing.names().await, vec!["a.pdf", "b.pdf"]);
    assert!(storage(&dir).indices_dir().join("a.pdf.idx").exists());
}

// ============================================================================
// Duplicates and validation
// ============================================================================

#[tokio::test]
async fn test_duplicate_name_and_content_are_skipped() {
    let dir = TempDir::new().unwrap();
    let indexer = Arc::new(FakeIndexer::new());
    let cache = cache_with(&dir, indexer.clone());

    cache.upload("report.pdf", &pdf_bytes("quarterly")).await;

    assert_eq!(
        cache.upload("report.pdf", &pdf_bytes("different body")).await,
        UploadOutcome::SkippedDuplicate {
            reason: DuplicateReason::Name,
            existing: "report.pdf".to_string(),
        }
    );
    assert_eq!(
        cache.upload("copy.pdf", &pdf_bytes("quarterly")).await,
        UploadOutcome::SkippedDuplicate {
            reason: DuplicateReason::Content,
            existing: "report.pdf".to_string(),
        }
    );
    assert_eq!(cache.len().await, 1);
    assert_eq!(indexer.build_count(), 1);
}

#[tokio::test]
async fn test_name_is_sanitized_before_duplicate_check() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, Arc::new(FakeIndexer::new()));

    cache.upload("Annual Report.pdf", &pdf_bytes("one")).await;
    let outcome = cache
        .upload("uploads/Annual Report.pdf", &pdf_bytes("two"))
        .await;
    assert_eq!(
        outcome,
        UploadOutcome::SkippedDuplicate {
            reason: DuplicateReason::Name,
            existing: "Annual_Report.pdf".to_string(),
        }
    );
}

#[tokio::test]
async fn test_validation_rejections() {
    let dir = TempDir::new().unwrap();
    let cache = DocumentCache::new(storage(&dir), 16, Arc::new(FakeIndexer::new()), TIMEOUT);

    let reject = |outcome: UploadOutcome| match outcome {
        UploadOutcome::Rejected {
            reason: RejectReason::Validation(e),
        } => e,
        other => panic!("expected validation rejection, got {:?}", other),
    };

    assert_eq!(
        reject(cache.upload("notes.txt", b"plain").await),
        ValidationError::NotPdf {
            name: "notes.txt".to_string()
        }
    );
    assert_eq!(
        reject(cache.upload("empty.pdf", b"").await),
        ValidationError::Empty {
            name: "empty.pdf".to_string()
        }
    );
    assert_eq!(reject(cache.upload("", b"x").await), ValidationError::MissingName);
    assert!(matches!(
        reject(cache.upload("big.pdf", &[b'x'; 17]).await),
        ValidationError::TooLarge { size_bytes: 17, limit_bytes: 16, .. }
    ));
    assert!(cache.is_empty().await);
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_recover_round_trip_without_rebuilding() {
    let dir = TempDir::new().unwrap();
    let first = cache_with(&dir, Arc::new(FakeIndexer::new()));
    first.upload("a.pdf", &pdf_bytes("alpha")).await;
    first.upload("b.pdf", &pdf_bytes("beta")).await;
    first.save().await.unwrap();
    let before = first.documents().await;

    let indexer = Arc::new(FakeIndexer::new());
    let second = cache_with(&dir, indexer.clone());
    let report = second.recover().await.unwrap();

    assert_eq!(report.recovered, vec!["a.pdf", "b.pdf"]);
    assert!(report.skipped_corrupt.is_empty());
    assert!(report.missing_index.is_empty());
    assert!(report.orphaned.is_empty());
    assert_eq!(indexer.build_count(), 0);

    let after = second.documents().await;
    assert_eq!(after.len(), 2);
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.index, b.index);
    }

    // Order survives, so the next upload evicts the same document it would have
    let evicted = accepted(second.upload("c.pdf", &pdf_bytes("gamma")).await);
    assert_eq!(evicted, vec!["a.pdf".to_string()]);
}

#[tokio::test]
async fn test_recover_skips_corrupt_index() {
    let dir = TempDir::new().unwrap();
    let first = cache_with(&dir, Arc::new(FakeIndexer::new()));
    first.upload("a.pdf", &pdf_bytes("alpha")).await;
    first.upload("b.pdf", &pdf_bytes("beta")).await;

    std::fs::write(storage(&dir).indices_dir().join("a.pdf.idx"), b"garbage").unwrap();

    let second = cache_with(&dir, Arc::new(FakeIndexer::new()));
    let report = second.recover().await.unwrap();

    assert_eq!(report.recovered, vec!["b.pdf"]);
    assert_eq!(report.skipped_corrupt, vec!["a.pdf"]);
    assert!(report.orphaned.is_empty());
    assert_eq!(second.names().await, vec!["b.pdf"]);
}

#[tokio::test]
async fn test_recover_reports_missing_and_orphaned_indices() {
    let dir = TempDir::new().unwrap();
    let first = cache_with(&dir, Arc::new(FakeIndexer::new()));
    first.upload("a.pdf", &pdf_bytes("alpha")).await;
    first.upload("b.pdf", &pdf_bytes("beta")).await;

    let indices = storage(&dir).indices_dir();
    std::fs::remove_file(indices.join("b.pdf.idx")).unwrap();
    std::fs::write(indices.join("stray.pdf.idx"), b"IDX:stray").unwrap();

    let second = cache_with(&dir, Arc::new(FakeIndexer::new()));
    let report = second.recover().await.unwrap();

    assert_eq!(report.recovered, vec!["a.pdf"]);
    assert_eq!(report.missing_index, vec!["b.pdf"]);
    assert_eq!(report.orphaned, vec!["stray.pdf"]);
    assert_eq!(second.last_recovery().await, report);

    // The rewritten manifest only lists what was recovered
    let manifest = CacheManifest::load(&storage(&dir).manifest_path()).unwrap();
    let names: Vec<_> = manifest.documents.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.pdf"]);
}

#[tokio::test]
async fn test_recover_with_empty_directory() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, Arc::new(FakeIndexer::new()));

    let report = cache.recover().await.unwrap();
    assert!(report.recovered.is_empty());
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_recover_sets_unreadable_manifest_aside() {
    let dir = TempDir::new().unwrap();
    let first = cache_with(&dir, Arc::new(FakeIndexer::new()));
    first.upload("a.pdf", &pdf_bytes("alpha")).await;

    let manifest_path = storage(&dir).manifest_path();
    std::fs::write(&manifest_path, b"{not json").unwrap();

    let second = cache_with(&dir, Arc::new(FakeIndexer::new()));
    let report = second.recover().await.unwrap();
    assert!(report.recovered.is_empty());
    assert_eq!(report.orphaned, vec!["a.pdf"]);
    assert!(report.manifest_error.is_some());

    // The damaged bytes survive for inspection and nothing overwrote them
    let bad = dir.path().join("manifest.json.bad");
    assert_eq!(report.quarantined_manifest, Some(bad.clone()));
    assert_eq!(std::fs::read(&bad).unwrap(), b"{not json");
    assert!(!manifest_path.exists());

    // The orphaned artifacts are still on disk
    assert!(storage(&dir).indices_dir().join("a.pdf.idx").exists());
    assert!(storage(&dir).uploads_dir().join("a.pdf").exists());
    assert_eq!(second.last_recovery().await, report);
}

#[tokio::test]
async fn test_recover_sets_future_manifest_version_aside() {
    let dir = TempDir::new().unwrap();
    let first = cache_with(&dir, Arc::new(FakeIndexer::new()));
    first.upload("a.pdf", &pdf_bytes("alpha")).await;

    let manifest_path = storage(&dir).manifest_path();
    let future = br#"{"version":2,"documents":[]}"#;
    std::fs::write(&manifest_path, future).unwrap();

    let second = cache_with(&dir, Arc::new(FakeIndexer::new()));
    let report = second.recover().await.unwrap();

    assert!(second.is_empty().await);
    assert!(report.manifest_error.unwrap().contains("version 2"));
    assert_eq!(
        std::fs::read(dir.path().join("manifest.json.bad")).unwrap(),
        future.to_vec()
    );
    assert!(!manifest_path.exists());
}

// ============================================================================
// Concurrent uploads
// ============================================================================

#[tokio::test]
async fn test_concurrent_same_content_keeps_one_copy() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(cache_with(
        &dir,
        Arc::new(FakeIndexer::slow_build(Duration::from_millis(20))),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .upload(&format!("copy-{}.pdf", i), &pdf_bytes("same body"))
                    .await
            })
        })
        .collect();

    let mut accepted_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            UploadOutcome::Accepted { .. } => accepted_count += 1,
            UploadOutcome::SkippedDuplicate { reason, .. } => {
                assert_eq!(reason, DuplicateReason::Content)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(accepted_count, 1);
    assert_eq!(cache.len().await, 1);
    let uploads = std::fs::read_dir(storage(&dir).uploads_dir()).unwrap().count();
    assert_eq!(uploads, 1);
    let manifest = CacheManifest::load(&storage(&dir).manifest_path()).unwrap();
    assert_eq!(manifest.documents.len(), 1);
}

#[tokio::test]
async fn test_concurrent_distinct_uploads_respect_capacity() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(cache_with(
        &dir,
        Arc::new(FakeIndexer::slow_build(Duration::from_millis(20))),
    ));

    let uploads: Vec<_> = (0..6)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let name = format!("doc-{}.pdf", i);
                cache.upload(&name, &pdf_bytes(&format!("body {}", i))).await
            })
        })
        .collect();
    let readers: Vec<_> = (0..6)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let name = format!("doc-{}.pdf", i);
                let _ = cache.get(&name).await;
                if i % 3 == 0 {
                    let _ = cache.remove(&name).await;
                }
                assert!(cache.len().await <= MAX_DOCUMENTS);
            })
        })
        .collect();

    for handle in uploads {
        assert!(!matches!(
            handle.await.unwrap(),
            UploadOutcome::Rejected { .. }
        ));
    }
    for handle in readers {
        handle.await.unwrap();
    }

    let documents = cache.documents().await;
    assert!(documents.len() <= MAX_DOCUMENTS);
    if documents.len() == 2 {
        assert_ne!(documents[0].content_hash, documents[1].content_hash);
    }

    // Disk and manifest agree with memory
    let storage = storage(&dir);
    let on_disk = std::fs::read_dir(storage.uploads_dir()).unwrap().count();
    assert_eq!(on_disk, documents.len());
    let manifest = CacheManifest::load(&storage.manifest_path()).unwrap();
    let listed: Vec<_> = manifest.documents.into_iter().map(|e| e.name).collect();
    assert_eq!(listed, cache.names().await);
}

#[tokio::test]
async fn test_concurrent_distinct_uploads_end_full() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(cache_with(
        &dir,
        Arc::new(FakeIndexer::slow_build(Duration::from_millis(10))),
    ));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let name = format!("doc-{}.pdf", i);
                cache.upload(&name, &pdf_bytes(&format!("body {}", i))).await
            })
        })
        .collect();
    for handle in handles {
        accepted(handle.await.unwrap());
    }

    let documents = cache.documents().await;
    assert_eq!(documents.len(), MAX_DOCUMENTS);
    assert_ne!(documents[0].content_hash, documents[1].content_hash);
    let on_disk = std::fs::read_dir(storage(&dir).indices_dir()).unwrap().count();
    assert_eq!(on_disk, MAX_DOCUMENTS);
}

// ============================================================================
// Removal and purge
// ============================================================================

#[tokio::test]
async fn test_remove_deletes_artifacts() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, Arc::new(FakeIndexer::new()));
    cache.upload("a.pdf", &pdf_bytes("alpha")).await;

    let removed = cache.remove("a.pdf").await.unwrap();
    assert!(!removed.storage_path.exists());
    assert!(!removed.index_path.exists());
    assert!(cache.remove("a.pdf").await.is_none());
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_purge_all_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, Arc::new(FakeIndexer::new()));
    cache.upload("a.pdf", &pdf_bytes("alpha")).await;

    cache.purge_all().await.unwrap();
    cache.purge_all().await.unwrap();

    let storage = storage(&dir);
    assert!(cache.is_empty().await);
    assert!(!storage.uploads_dir().exists());
    assert!(!storage.indices_dir().exists());
    assert!(!storage.manifest_path().exists());
}
