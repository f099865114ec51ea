use serde::{Deserialize, Serialize};

/// Request body for the completion endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    #[serde(rename = "Prompt")]
    pub prompt: String,
    #[serde(rename = "responseMaxTokens")]
    pub max_tokens: u32,
    #[serde(rename = "intelligizeAIAccountType")]
    pub account_type: u32,
    #[serde(rename = "endpointSecretKey")]
    pub secret_key: String,
    #[serde(rename = "Source")]
    pub source: String,
    /// Task label the endpoint uses for accounting (e.g. "Summarization")
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "AppKey")]
    pub app_key: String,
    #[serde(rename = "LLMMetadata")]
    pub metadata: bool,
}

/// Response body from the completion endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// One block of generated content
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub text: Option<String>,
}

impl CompletionResponse {
    /// Text of the first content block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(|b| b.text.as_deref())
    }
}

/// Task labels sent in the `Category` field
pub mod category {
    pub const ROUTING: &str = "Agentic Routing";
    pub const SUMMARIZATION: &str = "Summarization";
    pub const COMPARISON: &str = "Text Comparison";
    pub const QUESTION_ANSWERING: &str = "Document Q&A";
}
