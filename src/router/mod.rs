//! Cascading intent router.
//!
//! Each query passes through three stages, the first match winning:
//!
//! 1. greeting phrases
//! 2. scope keywords (allowed tasks override the deny list)
//! 3. semantic classification by the language model
//!
//! Stage 3 never fails: a classifier error, an empty reply or a reply
//! without a category becomes a `general` result carrying the diagnostic.

mod patterns;

pub use patterns::{
    check_scope, greeting_result, match_greeting, out_of_scope_response, GreetingKind,
    ALLOWED_TASK_KEYWORDS, GREETING_PATTERNS, OUT_OF_SCOPE_INDICATORS, OUT_OF_SCOPE_TOPIC,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::collaborators::{bounded, LanguageModel};
use crate::error::ClassificationError;
use crate::memory::{ConversationMemory, Role};
use crate::prompts::classification_prompt;

/// Query category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Greeting,
    OutOfScope,
    Summarization,
    Comparison,
    Rag,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Greeting => "greeting",
            Category::OutOfScope => "out_of_scope",
            Category::Summarization => "summarization",
            Category::Comparison => "comparison",
            Category::Rag => "rag",
            Category::General => "general",
        }
    }

    /// Parse a semantic category; anything unrecognized is `general`.
    pub fn from_semantic(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "summarization" => Category::Summarization,
            "comparison" => Category::Comparison,
            "rag" => Category::Rag,
            _ => Category::General,
        }
    }

    /// Topic label recorded after a successful semantic classification.
    pub fn semantic_topic(&self) -> &'static str {
        match self {
            Category::Summarization => "Text/PDF Summarization",
            Category::Comparison => "Text/PDF Comparison",
            Category::Rag => "PDF Question & Answer",
            _ => "General Inquiry",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    /// In `[0, 1]`
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Precomputed reply for greeting and out-of-scope results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ClassificationResult {
    /// Soft-failure result for a semantic stage error.
    pub fn fallback(query: &str, error: &ClassificationError) -> Self {
        let mut parameters = Map::new();
        parameters.insert("query".to_string(), Value::String(query.to_string()));
        Self {
            category: Category::General,
            confidence: 0.0,
            reasoning: format!("Fallback after classification error: {}", error),
            parameters,
            response: None,
        }
    }
}

/// Parse raw classifier output into a result.
///
/// Accepts a bare JSON object or one embedded in surrounding prose.
pub fn parse_classification(
    raw: &str,
    query: &str,
) -> Result<ClassificationResult, ClassificationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassificationError::EmptyResponse);
    }

    let value = serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(Value::is_object)
        .or_else(|| {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            if end <= start {
                return None;
            }
            serde_json::from_str::<Value>(&trimmed[start..=end])
                .ok()
                .filter(Value::is_object)
        })
        .ok_or_else(|| ClassificationError::NotJson {
            preview: trimmed.chars().take(200).collect(),
        })?;

    let category = match value.get("category") {
        Some(Value::String(s)) => Category::from_semantic(s),
        Some(_) => Category::General,
        None => return Err(ClassificationError::MissingCategory),
    };

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut parameters = match value.get("parameters") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    let has_query = parameters
        .get("query")
        .and_then(Value::as_str)
        .is_some_and(|q| !q.trim().is_empty());
    if !has_query {
        parameters.insert("query".to_string(), Value::String(query.to_string()));
    }

    Ok(ClassificationResult {
        category,
        confidence,
        reasoning,
        parameters,
        response: None,
    })
}

/// Routes queries to a category
pub struct IntentRouter {
    memory: Arc<ConversationMemory>,
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl IntentRouter {
    pub fn new(
        memory: Arc<ConversationMemory>,
        llm: Arc<dyn LanguageModel>,
        timeout: Duration,
    ) -> Self {
        Self {
            memory,
            llm,
            timeout,
        }
    }

    /// Record the query in memory and classify it.
    pub async fn classify(&self, query: &str, context: Option<&str>) -> ClassificationResult {
        self.memory.add_message(Role::User, query, Map::new()).await;

        if let Some((kind, pattern)) = match_greeting(query) {
            debug!(greeting = kind.as_str(), pattern, "Greeting stage matched");
            self.memory.set_topic(kind.topic()).await;
            return greeting_result(kind, pattern);
        }

        if let Some(result) = check_scope(query) {
            debug!("Scope stage matched");
            self.memory.set_topic(OUT_OF_SCOPE_TOPIC).await;
            return result;
        }

        match self.classify_semantic(query, context).await {
            Ok(result) => {
                info!(
                    category = %result.category,
                    confidence = result.confidence,
                    "Query classified"
                );
                self.memory.set_topic(result.category.semantic_topic()).await;
                result
            }
            Err(e) => {
                warn!(error = %e, "Classification failed, falling back to general");
                ClassificationResult::fallback(query, &e)
            }
        }
    }

    async fn classify_semantic(
        &self,
        query: &str,
        context: Option<&str>,
    ) -> Result<ClassificationResult, ClassificationError> {
        let summary = self.memory.summary().await;
        let prompt = classification_prompt(&summary, query, context);
        let raw = bounded(self.timeout, self.llm.classify(&prompt)).await?;
        parse_classification(&raw, query)
    }
}
