//! Local retrieval index built from PDF text.
//!
//! Text is pulled out of the PDF with `pdf-extract`, split into overlapping
//! character windows, and serialized as a small JSON document. Retrieval is
//! term-overlap scoring over those windows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::collaborators::{IndexHandle, Indexer, Passage};
use crate::error::{ServiceError, ServiceResult};

/// Characters per chunk.
pub const CHUNK_SIZE: usize = 400;

/// Characters shared between neighbouring chunks.
pub const CHUNK_OVERLAP: usize = 50;

const INDEX_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredIndex {
    version: u32,
    text: String,
    chunks: Vec<String>,
}

/// [`Indexer`] backed by in-process PDF extraction and keyword retrieval
#[derive(Debug, Clone, Default)]
pub struct LocalIndexer;

impl LocalIndexer {
    pub fn new() -> Self {
        Self
    }

    /// Build a serialized index from already extracted text.
    pub fn index_text(&self, text: &str) -> ServiceResult<IndexHandle> {
        if text.trim().is_empty() {
            return Err(ServiceError::Index {
                message: "document contains no extractable text".to_string(),
            });
        }
        let stored = StoredIndex {
            version: INDEX_VERSION,
            text: text.to_string(),
            chunks: chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP),
        };
        let blob = serde_json::to_vec(&stored).map_err(|e| ServiceError::Index {
            message: format!("failed to serialize index: {}", e),
        })?;
        debug!(chunks = stored.chunks.len(), bytes = blob.len(), "Index built");
        Ok(IndexHandle::from_bytes(blob))
    }

    fn decode(bytes: &[u8]) -> ServiceResult<StoredIndex> {
        let stored: StoredIndex =
            serde_json::from_slice(bytes).map_err(|e| ServiceError::Index {
                message: format!("corrupt index: {}", e),
            })?;
        if stored.version != INDEX_VERSION {
            return Err(ServiceError::Index {
                message: format!("unsupported index version {}", stored.version),
            });
        }
        Ok(stored)
    }
}

#[async_trait]
impl Indexer for LocalIndexer {
    async fn build_index(&self, raw: &[u8]) -> ServiceResult<IndexHandle> {
        let bytes = raw.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ServiceError::Index {
                message: format!("extraction task failed: {}", e),
            })?
            .map_err(|e| ServiceError::Index {
                message: format!("PDF extraction failed: {}", e),
            })?;
        self.index_text(&text)
    }

    fn load_index(&self, blob: Vec<u8>) -> ServiceResult<IndexHandle> {
        Self::decode(&blob)?;
        Ok(IndexHandle::from_bytes(blob))
    }

    async fn retrieve(
        &self,
        index: &IndexHandle,
        query: &str,
        k: usize,
    ) -> ServiceResult<Vec<Passage>> {
        let stored = Self::decode(index.as_bytes())?;
        let terms = terms(query);

        let mut scored: Vec<(usize, f64)> = stored
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, score(chunk, &terms)))
            .collect();
        // Stable sort keeps document order for equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, s)| Passage::new(stored.chunks[i].clone(), s))
            .collect())
    }

    async fn full_text(&self, index: &IndexHandle) -> ServiceResult<String> {
        Ok(Self::decode(index.as_bytes())?.text)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn score(chunk: &str, query_terms: &HashSet<String>) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    chunk
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| query_terms.contains(&w.to_lowercase()))
        .count() as f64
}

/// Split `text` into windows of at most `chunk_size` characters.
///
/// Windows end on whitespace when one exists in their second half, and each
/// window starts `overlap` characters before the previous one ended.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    if chunk_size == 0 {
        return chunks;
    }
    let overlap = overlap.min(chunk_size / 2);

    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            if let Some(ws) = (start + chunk_size / 2..end)
                .rev()
                .find(|&i| chars[i].is_whitespace())
            {
                end = ws;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Chunking
    // ========================================================================

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(chunk_text("Hello, world!", 400, 50), vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_text("", 400, 50).is_empty());
        assert!(chunk_text("   ", 400, 50).is_empty());
    }

    #[test]
    fn test_unbroken_text_hard_splits_with_overlap() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, 400, 50);
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![400, 400, 300]);
    }

    #[test]
    fn test_chunks_end_on_word_boundaries() {
        let text = "word ".repeat(300);
        let chunks = chunk_text(&text, 400, 50);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 400);
            assert!(chunk.ends_with("word"));
            assert!(chunk.starts_with("word"));
        }
    }

    #[test]
    fn test_multibyte_text_is_split_by_chars() {
        let text = "é".repeat(450);
        let chunks = chunk_text(&text, 400, 50);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 400);
        assert_eq!(chunks[1].chars().count(), 100);
    }

    // ========================================================================
    // Index build / load / retrieve
    // ========================================================================

    #[test]
    fn test_index_text_rejects_blank() {
        let err = LocalIndexer::new().index_text("  \n ").unwrap_err();
        assert!(matches!(err, ServiceError::Index { .. }));
    }

    #[test]
    fn test_load_index_rejects_garbage() {
        let indexer = LocalIndexer::new();
        assert!(indexer.load_index(b"not json".to_vec()).is_err());
        assert!(indexer
            .load_index(br#"{"version":7,"text":"x","chunks":["x"]}"#.to_vec())
            .is_err());
    }

    #[test]
    fn test_load_index_accepts_built_blob() {
        let indexer = LocalIndexer::new();
        let handle = indexer.index_text("Quarterly revenue grew.").unwrap();
        let reloaded = indexer.load_index(handle.as_bytes().to_vec()).unwrap();
        assert_eq!(reloaded, handle);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_term_overlap() {
        let indexer = LocalIndexer::new();
        let text = format!(
            "{}\n\n{}\n\n{}",
            "The cafeteria menu changed on Tuesday. ".repeat(8),
            "Revenue increased while operating revenue margins improved. ".repeat(6),
            "Parking rules are unchanged. ".repeat(12)
        );
        let handle = indexer.index_text(&text).unwrap();

        let passages = indexer.retrieve(&handle, "How did revenue change?", 2).await.unwrap();
        assert_eq!(passages.len(), 2);
        assert!(passages[0].text.contains("Revenue"));
        assert!(passages[0].score >= passages[1].score);
    }

    #[tokio::test]
    async fn test_full_text_round_trips() {
        let indexer = LocalIndexer::new();
        let handle = indexer.index_text("Alpha beta gamma.").unwrap();
        assert_eq!(indexer.full_text(&handle).await.unwrap(), "Alpha beta gamma.");
    }

    #[tokio::test]
    async fn test_build_index_rejects_non_pdf_bytes() {
        let err = LocalIndexer::new().build_index(b"plain text").await.unwrap_err();
        assert!(matches!(err, ServiceError::Index { .. }));
    }
}
