//! OpenAI-compatible provider
//!
//! Executes prompts via the Chat Completions API. The same wire format is
//! served by OpenAI and Groq, so one client covers both; only the base URL,
//! model and key differ.

use std::time::Duration;

use super::{Capabilities, PromptRequest, PromptResponse, Provider, ResponseFormat, TokenUsage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default endpoint base (OpenAI)
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Groq's OpenAI-compatible endpoint base
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Provider speaking the OpenAI Chat Completions protocol
pub struct OpenAIProvider {
    /// HTTP client
    client: reqwest::Client,
    /// API key
    api_key: String,
    /// Reported provider name ("openai", "groq")
    name: String,
    /// Endpoint base, without the `/chat/completions` suffix
    base_url: String,
    /// Model used when the request leaves it empty
    model: String,
}

impl OpenAIProvider {
    /// Create with a specific API key, targeting OpenAI with gpt-4o
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            name: "openai".to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
        }
    }

    /// Set the reported provider name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the endpoint base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound every request by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Single user turn carrying the prompt
    fn build_messages(&self, request: &PromptRequest) -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        }]
    }

    fn build_payload(&self, request: &PromptRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: if request.model.is_empty() {
                self.model.clone()
            } else {
                request.model.clone()
            },
            messages: self.build_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: match request.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(ResponseFormatPayload {
                    kind: "json_object",
                }),
            },
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        if self.name == "groq" {
            Capabilities::groq()
        } else {
            Capabilities::openai()
        }
    }

    async fn execute(&self, request: PromptRequest) -> Result<PromptResponse> {
        let payload = self.build_payload(&request);

        tracing::debug!(
            provider = %self.name,
            model = %payload.model,
            json_mode = payload.response_format.is_some(),
            messages_count = payload.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.name))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.name,
                status = %status,
                error = %error_text,
                "Chat completion API error"
            );
            return Ok(PromptResponse::failure(format!(
                "{} API error ({}): {}",
                self.name, status, error_text
            )));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} API response", self.name))?;

        let choice = api_response.choices.into_iter().next();
        let stop_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let usage = match api_response.usage {
            Some(u) => TokenUsage::new(u.prompt_tokens, u.completion_tokens),
            None => TokenUsage::estimate(request.prompt.len(), content.len()),
        };

        tracing::debug!(
            provider = %self.name,
            tokens = usage.total_tokens,
            "Chat completion received"
        );

        let mut response = PromptResponse::success(content).with_usage(usage);
        if stop_reason.is_some() {
            response.stop_reason = stop_reason;
        }
        Ok(response)
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatPayload>,
}

#[derive(Debug, Serialize)]
struct ResponseFormatPayload {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ============================================================================
// TESTS
// ============================================================================
