//! Language-model collaborators.
//!
//! - [`LlmClient`]: HTTP completion endpoint with timeout and retries
//! - [`OfflineModel`]: deterministic fallback when no endpoint is configured

mod client;
mod offline;
mod types;

pub use client::{extract_comparison_output, parse_completion, LlmClient};
pub use offline::OfflineModel;
pub use types::{category, CompletionRequest, CompletionResponse, ContentBlock};
