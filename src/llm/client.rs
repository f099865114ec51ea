use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{category, CompletionRequest, CompletionResponse};
use crate::collaborators::{ComparisonMode, LanguageModel, Passage, SummaryStyle};
use crate::config::{LlmConfig, RequestConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::prompts;

/// Client for the HTTP completion endpoint
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint_url: String,
    config: LlmConfig,
    request_config: RequestConfig,
}

impl LlmClient {
    /// Create a new client; fails when no endpoint is configured.
    pub fn new(config: &LlmConfig, request_config: RequestConfig) -> ServiceResult<Self> {
        let endpoint_url = config
            .endpoint_url
            .clone()
            .ok_or_else(|| ServiceError::Unavailable {
                message: "LLM_ENDPOINT_URL is not configured".to_string(),
                retries: 0,
            })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ServiceError::Http)?;

        Ok(Self {
            client,
            endpoint_url,
            config: config.clone(),
            request_config,
        })
    }

    /// Send one prompt and return the generated text
    pub async fn complete(&self, prompt: &str, task: &str) -> ServiceResult<String> {
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            max_tokens: self.config.max_tokens,
            account_type: self.config.account_type,
            secret_key: self.config.api_key.clone(),
            source: self.config.source.clone(),
            category: task.to_string(),
            app_key: self.config.app_key.clone(),
            metadata: true,
        };

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    task = %task,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying completion request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&request).await {
                Ok(text) => {
                    info!(
                        task = %task,
                        latency_ms = start.elapsed().as_millis(),
                        "Completion succeeded"
                    );
                    return Ok(text);
                }
                // A malformed reply will not improve on retry
                Err(e @ ServiceError::InvalidResponse { .. }) => {
                    error!(task = %task, error = %e, "Completion returned an unusable body");
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        task = %task,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Completion request failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        match last_error {
            Some(e) if self.request_config.max_retries == 0 => Err(e),
            last => Err(ServiceError::Unavailable {
                message: last
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Unknown error".to_string()),
                retries: retries.saturating_sub(1),
            }),
        }
    }

    /// Execute a single request (internal)
    async fn execute_request(&self, request: &CompletionRequest) -> ServiceResult<String> {
        debug!(
            task = %request.category,
            prompt_len = request.prompt.len(),
            "Calling completion endpoint"
        );

        let response = self
            .client
            .post(&self.endpoint_url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    ServiceError::Http(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(ServiceError::Http)?;

        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        parse_completion(&body)
    }

    /// Endpoint this client posts to
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

/// Pull the generated text out of a raw response body.
pub fn parse_completion(body: &str) -> ServiceResult<String> {
    if body.trim().is_empty() {
        return Err(ServiceError::InvalidResponse {
            message: "Empty response from AI API".to_string(),
        });
    }

    let parsed: CompletionResponse =
        serde_json::from_str(body).map_err(|_| ServiceError::InvalidResponse {
            message: format!(
                "Non-JSON response: {}",
                body.chars().take(200).collect::<String>()
            ),
        })?;

    parsed
        .first_text()
        .map(str::to_string)
        .ok_or_else(|| ServiceError::InvalidResponse {
            message: "Response has no content[0].text".to_string(),
        })
}

/// Unwrap a comparison the model returned as a JSON object with a `content` field.
pub fn extract_comparison_output(text: &str) -> String {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(serde_json::Value::Object(map)) =
                serde_json::from_str::<serde_json::Value>(&text[start..=end])
            {
                if let Some(serde_json::Value::String(content)) = map.get("content") {
                    return content.clone();
                }
            }
        }
    }
    text.to_string()
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn summarize(&self, text: &str, style: SummaryStyle) -> ServiceResult<String> {
        info!(style = %style, text_len = text.len(), "Starting summarization");
        let prompt = prompts::summary_prompt(text, style);
        self.complete(&prompt, category::SUMMARIZATION).await
    }

    async fn compare(
        &self,
        text_a: &str,
        text_b: &str,
        mode: ComparisonMode,
    ) -> ServiceResult<String> {
        info!(mode = %mode, "Starting text comparison");
        let prompt = prompts::comparison_prompt(text_a, text_b, mode);
        let raw = self.complete(&prompt, category::COMPARISON).await?;
        Ok(extract_comparison_output(&raw))
    }

    async fn classify(&self, prompt: &str) -> ServiceResult<String> {
        self.complete(prompt, category::ROUTING).await
    }

    async fn answer(&self, question: &str, passages: &[Passage]) -> ServiceResult<String> {
        let prompt = prompts::answer_prompt(question, passages);
        self.complete(&prompt, category::QUESTION_ANSWERING).await
    }
}
