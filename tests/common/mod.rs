//! Shared fakes for integration tests.
//!
//! mockall mocks are only generated for the library's own unit tests, so the
//! integration suites use these small hand-written collaborators instead.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use doc_assistant::collaborators::{
    ComparisonMode, IndexHandle, Indexer, LanguageModel, Passage, SummaryStyle,
};
use doc_assistant::error::{ServiceError, ServiceResult};

const BLOB_PREFIX: &[u8] = b"IDX:";

/// Minimal PDF-looking payload whose "text" is `body`.
pub fn pdf_bytes(body: &str) -> Vec<u8> {
    format!("%PDF-1.4 {}", body).into_bytes()
}

/// Indexer that treats the raw upload as the document text.
#[derive(Default)]
pub struct FakeIndexer {
    pub passages: Vec<Passage>,
    pub retrieve_delay: Option<Duration>,
    pub build_delay: Option<Duration>,
    pub fail_build: bool,
    pub builds: AtomicUsize,
}

impl FakeIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_passages(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            ..Self::default()
        }
    }

    /// Indexer whose builds yield for `delay`, so concurrent uploads interleave.
    pub fn slow_build(delay: Duration) -> Self {
        Self {
            build_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Indexer for FakeIndexer {
    async fn build_index(&self, raw: &[u8]) -> ServiceResult<IndexHandle> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.build_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_build {
            return Err(ServiceError::Index {
                message: "document contains no extractable text".to_string(),
            });
        }
        let mut blob = BLOB_PREFIX.to_vec();
        blob.extend_from_slice(raw);
        Ok(IndexHandle::from_bytes(blob))
    }

    fn load_index(&self, blob: Vec<u8>) -> ServiceResult<IndexHandle> {
        if !blob.starts_with(BLOB_PREFIX) {
            return Err(ServiceError::Index {
                message: "unrecognized index blob".to_string(),
            });
        }
        Ok(IndexHandle::from_bytes(blob))
    }

    async fn retrieve(
        &self,
        _index: &IndexHandle,
        _query: &str,
        k: usize,
    ) -> ServiceResult<Vec<Passage>> {
        if let Some(delay) = self.retrieve_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.passages.iter().take(k).cloned().collect())
    }

    async fn full_text(&self, index: &IndexHandle) -> ServiceResult<String> {
        let body = &index.as_bytes()[BLOB_PREFIX.len()..];
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

/// Language model with canned replies.
pub struct ScriptedModel {
    classification: Mutex<String>,
    pub answer: String,
    delay: Option<Duration>,
    pub summarized: Mutex<Vec<String>>,
    pub compared: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::classifying(r#"{"category": "general", "confidence": 0.5, "reasoning": "default"}"#)
    }

    /// Model whose classifier always returns `raw`.
    pub fn classifying(raw: &str) -> Self {
        Self {
            classification: Mutex::new(raw.to_string()),
            answer: "The report covers revenue.".to_string(),
            delay: None,
            summarized: Mutex::new(Vec::new()),
            compared: Mutex::new(Vec::new()),
        }
    }

    /// Delay summarize and compare replies by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn set_classification(&self, raw: &str) {
        *self.classification.lock().unwrap() = raw.to_string();
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn summarize(&self, text: &str, _style: SummaryStyle) -> ServiceResult<String> {
        self.pause().await;
        self.summarized.lock().unwrap().push(text.to_string());
        Ok(format!("summary of {} chars", text.chars().count()))
    }

    async fn compare(
        &self,
        text_a: &str,
        text_b: &str,
        _mode: ComparisonMode,
    ) -> ServiceResult<String> {
        self.pause().await;
        self.compared
            .lock()
            .unwrap()
            .push((text_a.to_string(), text_b.to_string()));
        Ok("Both texts describe quarterly results.".to_string())
    }

    async fn classify(&self, _prompt: &str) -> ServiceResult<String> {
        Ok(self.classification.lock().unwrap().clone())
    }

    async fn answer(&self, _question: &str, _passages: &[Passage]) -> ServiceResult<String> {
        Ok(self.answer.clone())
    }
}
