//! # Document Assistant
//!
//! Backend for a conversational PDF assistant: users upload PDFs and ask
//! questions that are routed to summarization, comparison or
//! retrieval-grounded Q&A.
//!
//! ## Components
//!
//! - **Document cache**: at most two resident documents, deduplicated by
//!   name and content hash, FIFO eviction, atomic on-disk persistence
//! - **Conversation memory**: last ten messages, last two documents, topic
//! - **Intent router**: greeting, then scope keywords, then the language model
//! - **Task dispatcher**: runs the matching handler and never fails
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum) → handlers → IntentRouter → TaskDispatcher
//!                   ↓                          ↓
//!            DocumentCache  ←──────────  Indexer / LanguageModel
//!                   ↓
//!            DATA_DIR (manifest, indices, uploads)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use doc_assistant::{AppState, Config};
//! use doc_assistant::index::LocalIndexer;
//! use doc_assistant::llm::OfflineModel;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let bind = config.server.bind.clone();
//!     let state = Arc::new(AppState::new(
//!         config,
//!         Arc::new(LocalIndexer::new()),
//!         Arc::new(OfflineModel::new()),
//!     ));
//!     doc_assistant::server::handle_startup(&state).await?;
//!     doc_assistant::server::run(state, &bind).await
//! }
//! ```

/// Bounded document cache with atomic persistence.
pub mod cache;
/// Command-line interface definitions.
pub mod cli;
/// Collaborator interfaces (indexer, language model).
pub mod collaborators;
/// Configuration management.
pub mod config;
/// Task dispatch for classified queries.
pub mod dispatch;
/// Error types and result aliases.
pub mod error;
/// Local PDF retrieval index.
pub mod index;
/// Language-model clients.
pub mod llm;
/// Fixed-capacity conversation memory.
pub mod memory;
/// Prompt templates.
pub mod prompts;
/// Cascading intent router.
pub mod router;
/// Service handlers and HTTP surface.
pub mod server;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, SharedState};
