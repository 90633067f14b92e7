//! Anthropic Claude API client implementation
//!
//! Implements the LlmClient trait for Anthropic's Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, MessageContent, Role,
    StopReason, TokenUsage, ToolCall,
};
use crate::config::LlmConfig;

/// Attempts after the first one for transient failures
const MAX_RETRIES: u32 = 3;

/// Sent after a trailing assistant turn so the conversation ends on the user
const CONTINUE_PROMPT: &str = "Continue.";

/// Messages API version header value
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(?config, "AnthropicClient::from_config: called");
        let api_key = config.get_api_key().map_err(|e| LlmError::MissingApiKey(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "AnthropicClient::build_request_body: called");
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": self.convert_messages(&request.messages),
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_anthropic_schema())
                    .collect::<Vec<_>>()
            );
        }

        body
    }

    /// Convert internal Message types to Anthropic API format
    ///
    /// The API requires strictly alternating roles that end on a user turn:
    /// consecutive same-role messages are merged into one block list and a
    /// trailing assistant turn gets a continuation prompt.
    fn convert_messages(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        debug!(message_count = %messages.len(), "AnthropicClient::convert_messages: called");
        let mut merged: Vec<(Role, Vec<serde_json::Value>)> = Vec::new();

        for msg in messages {
            let blocks: Vec<serde_json::Value> = match &msg.content {
                MessageContent::Text(text) => vec![serde_json::json!({"type": "text", "text": text})],
                MessageContent::Blocks(blocks) => blocks.iter().map(|b| self.convert_content_block(b)).collect(),
            };
            match merged.last_mut() {
                Some((role, existing)) if *role == msg.role => {
                    debug!("AnthropicClient::convert_messages: merging consecutive same-role message");
                    existing.extend(blocks);
                }
                _ => merged.push((msg.role, blocks)),
            }
        }

        if matches!(merged.last(), Some((Role::Assistant, _))) {
            merged.push((
                Role::User,
                vec![serde_json::json!({"type": "text", "text": CONTINUE_PROMPT})],
            ));
        }

        merged
            .into_iter()
            .map(|(role, content)| serde_json::json!({"role": role, "content": content}))
            .collect()
    }

    /// Convert a ContentBlock to Anthropic API format
    fn convert_content_block(&self, block: &ContentBlock) -> serde_json::Value {
        match block {
            ContentBlock::Text { text } => serde_json::json!({
                "type": "text",
                "text": text,
            }),
            ContentBlock::ToolUse { id, name, input } => serde_json::json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }),
        }
    }

    /// Parse the Anthropic API response
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "AnthropicClient::parse_response: called");
        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in api_response.content {
            match block {
                AnthropicContentBlock::Text { text } => texts.push(text),
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    debug!(%id, %name, "AnthropicClient::parse_response: ToolUse block");
                    tool_calls.push(ToolCall { id, name, input });
                }
                AnthropicContentBlock::Other => {
                    debug!("AnthropicClient::parse_response: skipping unknown block");
                }
            }
        }

        CompletionResponse {
            content: if texts.is_empty() { None } else { Some(texts.join("\n")) },
            tool_calls,
            stop_reason: StopReason::from_anthropic(api_response.stop_reason.as_deref().unwrap_or("end_turn")),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
                cache_read_tokens: api_response.usage.cache_read_input_tokens.unwrap_or(0),
                cache_creation_tokens: api_response.usage.cache_creation_input_tokens.unwrap_or(0),
            },
        }
    }
}

impl AnthropicClient {
    /// One HTTP round trip, with the status mapped onto [`LlmError`]
    async fn send_once(&self, url: &str, body: &serde_json::Value) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let api_response: AnthropicResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "AnthropicClient::complete: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let mut attempt = 0;
        loop {
            match self.send_once(&url, &body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let wait = e.backoff(attempt);
                    warn!(attempt, wait_ms = wait.as_millis() as u64, error = %e, "Retrying LLM request after transient error");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    warn!(attempts = attempt + 1, error = %e, "LLM request failed");
                    return Err(e);
                }
            }
        }
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
    cache_read_input_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
}
