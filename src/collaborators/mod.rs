//! Narrow interfaces to the external services the core depends on.
//!
//! - [`Indexer`]: builds, reloads and queries per-document retrieval indices
//! - [`LanguageModel`]: summarization, comparison, classification and answering
//!
//! The core never looks inside an [`IndexHandle`]; it persists the blob and
//! hands it back to the indexer. Every call made from the core goes through
//! [`bounded`] so a stalled collaborator turns into [`ServiceError::Timeout`].

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Opaque reference to an externally built retrieval index.
#[derive(Clone, PartialEq, Eq)]
pub struct IndexHandle(Arc<[u8]>);

impl IndexHandle {
    /// Wrap a serialized index.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into().into_boxed_slice()))
    }

    /// The serialized index, exactly as produced by the indexer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Size of the serialized index in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexHandle({} bytes)", self.0.len())
    }
}

/// A passage returned by retrieval, most relevant first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub score: f64,
}

impl Passage {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Summary shape requested from the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    Brief,
    Detailed,
    BulletPoints,
    Micro,
    AudienceGeneral,
    AudienceProfessional,
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SummaryStyle::Brief => "brief",
            SummaryStyle::Detailed => "detailed",
            SummaryStyle::BulletPoints => "bullet_points",
            SummaryStyle::Micro => "micro",
            SummaryStyle::AudienceGeneral => "audience_general",
            SummaryStyle::AudienceProfessional => "audience_professional",
        };
        f.write_str(s)
    }
}

impl FromStr for SummaryStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "brief" => Ok(SummaryStyle::Brief),
            "detailed" => Ok(SummaryStyle::Detailed),
            "bullet_points" | "bullets" => Ok(SummaryStyle::BulletPoints),
            "micro" => Ok(SummaryStyle::Micro),
            "audience_general" | "general" => Ok(SummaryStyle::AudienceGeneral),
            "audience_professional" | "professional" => Ok(SummaryStyle::AudienceProfessional),
            other => Err(format!("unknown summary style: {}", other)),
        }
    }
}

impl SummaryStyle {
    /// Style for a `summary_type` plus optional `audience`.
    ///
    /// `"audience"` picks the audience variant, defaulting to general readers.
    pub fn resolve(summary_type: &str, audience: Option<&str>) -> Result<Self, String> {
        if !summary_type.eq_ignore_ascii_case("audience") {
            return summary_type.parse();
        }
        match audience.map(str::to_lowercase).as_deref() {
            None | Some("general") => Ok(SummaryStyle::AudienceGeneral),
            Some("professional") => Ok(SummaryStyle::AudienceProfessional),
            Some(other) => Err(format!("unknown audience: {}", other)),
        }
    }
}

/// Focus of a two-text comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    Comprehensive,
    Similarities,
    Differences,
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonMode::Comprehensive => "comprehensive",
            ComparisonMode::Similarities => "similarities",
            ComparisonMode::Differences => "differences",
        };
        f.write_str(s)
    }
}

impl FromStr for ComparisonMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "comprehensive" => Ok(ComparisonMode::Comprehensive),
            "similarities" => Ok(ComparisonMode::Similarities),
            "differences" => Ok(ComparisonMode::Differences),
            other => Err(format!("unknown comparison mode: {}", other)),
        }
    }
}

/// Builds and queries per-document retrieval indices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Parse raw document bytes and build a searchable index.
    async fn build_index(&self, raw: &[u8]) -> ServiceResult<IndexHandle>;

    /// Rehydrate a previously built index from its persisted blob.
    ///
    /// An error means the blob could not be deserialized.
    fn load_index(&self, blob: Vec<u8>) -> ServiceResult<IndexHandle>;

    /// Top `k` passages for `query`, most relevant first.
    async fn retrieve(
        &self,
        index: &IndexHandle,
        query: &str,
        k: usize,
    ) -> ServiceResult<Vec<Passage>>;

    /// Full document text backing the index.
    async fn full_text(&self, index: &IndexHandle) -> ServiceResult<String>;
}

/// Generative model operations used by routing and task handling.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn summarize(&self, text: &str, style: SummaryStyle) -> ServiceResult<String>;

    async fn compare(
        &self,
        text_a: &str,
        text_b: &str,
        mode: ComparisonMode,
    ) -> ServiceResult<String>;

    /// Raw classifier output for a fully rendered classification prompt.
    async fn classify(&self, prompt: &str) -> ServiceResult<String>;

    /// Answer `question` grounded in `passages`.
    async fn answer(&self, question: &str, passages: &[Passage]) -> ServiceResult<String>;
}

/// Run a collaborator call with an upper bound on its duration.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
