//! Executes a classified query.
//!
//! Handlers never fail: collaborator errors become a user-facing message
//! with `success: false`, and every outcome carries non-empty text.

mod extract;

pub use extract::{extract_text_for_summary, extract_two_texts};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::cache::DocumentCache;
use crate::collaborators::{bounded, ComparisonMode, Indexer, LanguageModel, SummaryStyle};
use crate::config::TaskConfig;
use crate::error::ServiceResult;
use crate::memory::ConversationMemory;
use crate::router::{out_of_scope_response, Category, ClassificationResult};

const NEED_SUMMARY_INPUT: &str =
    "I need text content or a PDF to summarize. Please provide text or upload a PDF first.";
const NEED_COMPARISON_INPUT: &str =
    "I need two texts or two PDFs to compare. \
     Please provide them separated by a clear line break or upload two PDFs.";
const NO_DOCUMENTS: &str = "No PDFs available for Q&A. Please upload a PDF first.";
const EMPTY_RESPONSE: &str =
    "I processed your request but didn't generate a response. Please try again.";
const GREETING_FALLBACK: &str =
    "Hello! I can summarize, compare, or answer questions about your PDFs.";

/// Passage previews included in a Q&A reply.
const MAX_SOURCE_PREVIEWS: usize = 3;

/// Characters per passage preview.
const SOURCE_PREVIEW_CHARS: usize = 150;

/// Result of running one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub response: String,
    pub task_type: Category,
    /// Document names and passage previews used
    pub sources: Vec<String>,
    pub success: bool,
}

struct Reply {
    text: String,
    sources: Vec<String>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// Maps a classification to its handler
pub struct TaskDispatcher {
    cache: Arc<DocumentCache>,
    memory: Arc<ConversationMemory>,
    indexer: Arc<dyn Indexer>,
    llm: Arc<dyn LanguageModel>,
    tasks: TaskConfig,
    timeout: Duration,
}

impl TaskDispatcher {
    pub fn new(
        cache: Arc<DocumentCache>,
        memory: Arc<ConversationMemory>,
        indexer: Arc<dyn Indexer>,
        llm: Arc<dyn LanguageModel>,
        tasks: TaskConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            memory,
            indexer,
            llm,
            tasks,
            timeout,
        }
    }

    /// Run the handler for `classification`.
    pub async fn dispatch(
        &self,
        query: &str,
        classification: &ClassificationResult,
    ) -> DispatchOutcome {
        let task_type = classification.category;
        debug!(task = %task_type, "Dispatching query");

        let result = match task_type {
            Category::Greeting => Ok(Reply::text(
                classification
                    .response
                    .clone()
                    .unwrap_or_else(|| GREETING_FALLBACK.to_string()),
            )),
            Category::OutOfScope => Ok(Reply::text(
                classification
                    .response
                    .clone()
                    .unwrap_or_else(out_of_scope_response),
            )),
            Category::Summarization => self
                .summarize(query)
                .await
                .map_err(|e| format!("Summarization error: {}", e)),
            Category::Comparison => self
                .compare(query)
                .await
                .map_err(|e| format!("Comparison error: {}", e)),
            Category::Rag | Category::General => self
                .answer(query)
                .await
                .map_err(|e| format!("Q&A error: {}", e)),
        };

        finish(task_type, result)
    }

    /// Summarize caller-supplied text directly, bypassing classification.
    pub async fn summarize_text(&self, text: &str, style: SummaryStyle) -> DispatchOutcome {
        let result = bounded(self.timeout, self.llm.summarize(text, style))
            .await
            .map(Reply::text)
            .map_err(|e| format!("Summarization error: {}", e));
        finish(Category::Summarization, result)
    }

    /// Compare two caller-supplied texts directly, bypassing classification.
    pub async fn compare_texts(
        &self,
        text_a: &str,
        text_b: &str,
        mode: ComparisonMode,
    ) -> DispatchOutcome {
        let result = bounded(self.timeout, self.llm.compare(text_a, text_b, mode))
            .await
            .map(Reply::text)
            .map_err(|e| format!("Comparison error: {}", e));
        finish(Category::Comparison, result)
    }

    async fn summarize(&self, query: &str) -> ServiceResult<Reply> {
        let context = self.memory.document_context().await;
        if let Some(name) = context.last() {
            if let Some(document) = self.cache.get(name).await {
                let text = bounded(self.timeout, self.indexer.full_text(&document.index)).await?;
                let summary = bounded(
                    self.timeout,
                    self.llm.summarize(&text, self.tasks.summary_style),
                )
                .await?;
                return Ok(Reply {
                    text: format!("PDF Summary for {}:\n\n{}", name, summary),
                    sources: vec![name.clone()],
                });
            }
            debug!(document = %name, "Context document not resident, using query text");
        }

        match extract_text_for_summary(query) {
            Some(text) => {
                let summary =
                    bounded(self.timeout, self.llm.summarize(&text, self.tasks.summary_style))
                        .await?;
                Ok(Reply::text(format!("Text Summary:\n\n{}", summary)))
            }
            None => Ok(Reply::text(NEED_SUMMARY_INPUT)),
        }
    }

    async fn compare(&self, query: &str) -> ServiceResult<Reply> {
        let context = self.memory.document_context().await;
        if let [.., first, second] = context.as_slice() {
            let pair = (self.cache.get(first).await, self.cache.get(second).await);
            if let (Some(a), Some(b)) = pair {
                let text_a = bounded(self.timeout, self.indexer.full_text(&a.index)).await?;
                let text_b = bounded(self.timeout, self.indexer.full_text(&b.index)).await?;
                let comparison = bounded(
                    self.timeout,
                    self.llm.compare(&text_a, &text_b, self.tasks.comparison_mode),
                )
                .await?;
                return Ok(Reply {
                    text: format!("PDF Comparison ({} vs {}):\n\n{}", first, second, comparison),
                    sources: vec![first.clone(), second.clone()],
                });
            }
            debug!("Context documents not resident, using query text");
        }

        match extract_two_texts(query) {
            Some((text_a, text_b)) => {
                let comparison = bounded(
                    self.timeout,
                    self.llm.compare(&text_a, &text_b, self.tasks.comparison_mode),
                )
                .await?;
                Ok(Reply::text(format!("Text Comparison:\n\n{}", comparison)))
            }
            None => Ok(Reply::text(NEED_COMPARISON_INPUT)),
        }
    }

    async fn answer(&self, query: &str) -> ServiceResult<Reply> {
        let context = self.memory.document_context().await;
        let Some(name) = context.last() else {
            return Ok(Reply::text(NO_DOCUMENTS));
        };
        let Some(document) = self.cache.get(name).await else {
            return Ok(Reply::text(format!(
                "PDF {} not found in the document cache.",
                name
            )));
        };

        let passages = bounded(
            self.timeout,
            self.indexer
                .retrieve(&document.index, query, self.tasks.retrieval_k),
        )
        .await?;
        let mut answer = bounded(self.timeout, self.llm.answer(query, &passages)).await?;
        if answer.trim().is_empty() {
            answer = format!(
                "I found {} but couldn't generate a clear answer. \
                 Please try rephrasing your question.",
                name
            );
        }

        let mut text = format!("Answer from {}:\n\n{}", name, answer);
        let mut sources = vec![name.clone()];
        if !passages.is_empty() {
            text.push_str("\n\nSources:\n");
            for (i, passage) in passages.iter().take(MAX_SOURCE_PREVIEWS).enumerate() {
                let preview = source_preview(&passage.text);
                text.push_str(&format!("{}. {}\n", i + 1, preview));
                sources.push(preview);
            }
        }

        Ok(Reply { text, sources })
    }
}

fn finish(task_type: Category, result: Result<Reply, String>) -> DispatchOutcome {
    let (mut response, sources, success) = match result {
        Ok(reply) => (reply.text, reply.sources, true),
        Err(message) => {
            error!(task = %task_type, error = %message, "Task failed");
            (message, Vec::new(), false)
        }
    };

    if response.trim().is_empty() {
        response = EMPTY_RESPONSE.to_string();
    }

    info!(task = %task_type, success, sources = sources.len(), "Task complete");
    DispatchOutcome {
        response,
        task_type,
        sources,
        success,
    }
}

fn source_preview(text: &str) -> String {
    if text.chars().count() > SOURCE_PREVIEW_CHARS {
        let head: String = text.chars().take(SOURCE_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
