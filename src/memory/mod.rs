//! Fixed-capacity conversation memory.
//!
//! Holds the last [`MAX_MESSAGES`] messages, the last [`MAX_PDF_CONTEXT`]
//! document names the user worked with, and a single topic label. All
//! mutations go through one lock per memory instance.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

/// Messages kept before the oldest is dropped.
pub const MAX_MESSAGES: usize = 10;

/// Document names kept before the oldest is dropped.
pub const MAX_PDF_CONTEXT: usize = 2;

/// Messages rendered into the context summary.
const SUMMARY_RECENT_MESSAGES: usize = 5;

/// Characters of message content shown in the context summary.
const SUMMARY_PREVIEW_CHARS: usize = 100;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
            Role::System => f.write_str("system"),
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Full conversation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Oldest first
    pub messages: VecDeque<Message>,
    /// Oldest first; the last entry is the most recent document
    pub pdf_context: VecDeque<String>,
    pub current_topic: Option<String>,
}

impl ConversationState {
    /// Most recently added document name.
    pub fn latest_document(&self) -> Option<&str> {
        self.pdf_context.back().map(String::as_str)
    }

    /// The two most recent document names, older first.
    pub fn latest_pair(&self) -> Option<(&str, &str)> {
        let n = self.pdf_context.len();
        if n < 2 {
            return None;
        }
        Some((&self.pdf_context[n - 2], &self.pdf_context[n - 1]))
    }

    /// Human-readable rendering used in classification prompts.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.pdf_context.is_empty() {
            let names: Vec<&str> = self.pdf_context.iter().map(String::as_str).collect();
            parts.push(format!("Available PDFs: {}", names.join(", ")));
        }

        if let Some(topic) = &self.current_topic {
            parts.push(format!("Current topic: {}", topic));
        }

        if !self.messages.is_empty() {
            parts.push("Recent conversation:".to_string());
            let skip = self.messages.len().saturating_sub(SUMMARY_RECENT_MESSAGES);
            for msg in self.messages.iter().skip(skip) {
                parts.push(format!("{}: {}", msg.role, preview(&msg.content)));
            }
        }

        if parts.is_empty() {
            "No conversation history".to_string()
        } else {
            parts.join("\n")
        }
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > SUMMARY_PREVIEW_CHARS {
        let head: String = content.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

/// Read-only copy of the memory for prompting and serialization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub summary: String,
    pub message_count: usize,
    pub available_pdfs: Vec<String>,
    pub current_topic: Option<String>,
    pub state: ConversationState,
}

/// Lock-guarded conversation memory for one session
#[derive(Debug, Default)]
pub struct ConversationMemory {
    state: RwLock<ConversationState>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, dropping the oldest beyond capacity.
    pub async fn add_message(
        &self,
        role: Role,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) {
        let mut state = self.state.write().await;
        state.messages.push_back(Message {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        });
        while state.messages.len() > MAX_MESSAGES {
            state.messages.pop_front();
        }
    }

    /// Register a document as the most recent context; no-op if already present.
    pub async fn add_document_context(&self, name: &str) {
        let mut state = self.state.write().await;
        if state.pdf_context.iter().any(|n| n == name) {
            return;
        }
        state.pdf_context.push_back(name.to_string());
        while state.pdf_context.len() > MAX_PDF_CONTEXT {
            if let Some(dropped) = state.pdf_context.pop_front() {
                debug!(document = %dropped, "Dropped from conversation context");
            }
        }
    }

    /// Forget a document that is no longer resident.
    pub async fn remove_document_context(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.pdf_context.len();
        state.pdf_context.retain(|n| n != name);
        state.pdf_context.len() != before
    }

    /// Empty the message history; document context and topic survive.
    pub async fn clear_messages(&self) {
        self.state.write().await.messages.clear();
    }

    pub async fn set_topic(&self, label: impl Into<String>) {
        self.state.write().await.current_topic = Some(label.into());
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        let state = self.state.read().await.clone();
        MemorySnapshot {
            summary: state.summary(),
            message_count: state.messages.len(),
            available_pdfs: state.pdf_context.iter().cloned().collect(),
            current_topic: state.current_topic.clone(),
            state,
        }
    }

    /// Document names in context, oldest first.
    pub async fn document_context(&self) -> Vec<String> {
        self.state.read().await.pdf_context.iter().cloned().collect()
    }

    /// Context summary string only.
    pub async fn summary(&self) -> String {
        self.state.read().await.summary()
    }
}

/// Metadata map with a single `task_type` entry.
pub fn task_metadata(task_type: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("task_type".to_string(), Value::String(task_type.to_string()));
    map
}
