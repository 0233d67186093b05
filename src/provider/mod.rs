//! # Provider Abstraction Layer
//!
//! Trait and implementations for text-generation services.
//!
//! ## Overview
//!
//! - [`Provider`] - Core trait for executing prompts
//! - [`OpenAIProvider`] - OpenAI-compatible Chat Completions (Groq, OpenAI)
//! - [`MockProvider`] - Test provider with configurable responses
//!
//! ## Provider Trait
//!
//! ```rust,ignore
//! #[async_trait]
//! pub trait Provider: Send + Sync {
//!     fn name(&self) -> &str;
//!     fn capabilities(&self) -> Capabilities;
//!     async fn execute(&self, request: PromptRequest) -> Result<PromptResponse>;
//! }
//! ```
//!
//! ## Creating Providers
//!
//! [`create_provider`] builds the configured provider. A network provider
//! without an API key yields `None`: callers treat the service as absent
//! instead of failing.
//!
//! ```rust
//! use pddgen::config::{ProviderConfig, ProviderKind};
//! use pddgen::provider::create_provider;
//!
//! let mock = ProviderConfig { kind: ProviderKind::Mock, ..Default::default() };
//! assert!(create_provider(&mock).unwrap().is_some());
//!
//! let none = ProviderConfig { kind: ProviderKind::None, ..Default::default() };
//! assert!(create_provider(&none).unwrap().is_none());
//! ```

mod mock;
mod openai;

pub use mock::MockProvider;
pub use openai::{OpenAIProvider, GROQ_BASE_URL, OPENAI_BASE_URL};

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::PddError;

/// Average characters per token for mixed content (prose + code)
const CHARS_PER_TOKEN_MIXED: f32 = 3.0;

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Capabilities that a provider may support
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Supports JSON object response format
    pub json_mode: bool,
}

impl Capabilities {
    /// Groq-hosted Llama 3.3 capabilities
    pub fn groq() -> Self {
        Self { json_mode: true }
    }

    /// OpenAI GPT-4o capabilities
    pub fn openai() -> Self {
        Self { json_mode: true }
    }

    /// Mock provider capabilities (everything enabled)
    pub fn mock() -> Self {
        Self { json_mode: true }
    }
}

// ============================================================================
// PROVIDER TRAIT (ASYNC)
// ============================================================================

/// Core trait that all text-generation providers implement
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider name (e.g., "groq", "openai", "mock")
    fn name(&self) -> &str;

    /// Returns the provider's capabilities
    fn capabilities(&self) -> Capabilities;

    /// Execute a prompt and return the response
    ///
    /// Transport failures are `Err`; the service answering with an error
    /// status is `Ok` with `success == false`.
    async fn execute(&self, request: PromptRequest) -> Result<PromptResponse>;

    /// Check if this provider is available (e.g., API key set)
    fn is_available(&self) -> bool {
        true
    }
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

/// Shape the service is asked to produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free-form text (default)
    #[default]
    Text,
    /// A single JSON object
    JsonObject,
}

/// Request to execute a prompt
#[derive(Debug, Clone)]
pub struct PromptRequest {
    /// The main prompt/instruction to execute
    pub prompt: String,

    /// Model to use; empty means the provider default
    pub model: String,

    /// Requested response shape
    pub response_format: ResponseFormat,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl PromptRequest {
    /// Create a new request with minimal required fields
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            response_format: ResponseFormat::Text,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Apply optional generation limits; `None` keeps the service default
    pub fn with_sampling(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Ask for a single JSON object
    pub fn json_object(mut self) -> Self {
        self.response_format = ResponseFormat::JsonObject;
        self
    }
}

/// Response from a prompt execution
#[derive(Debug, Clone)]
pub struct PromptResponse {
    /// The generated content (or error text when `success` is false)
    pub content: String,

    /// Whether the execution was successful
    pub success: bool,

    /// Token usage statistics
    pub usage: TokenUsage,

    /// Stop reason (e.g., "stop", "length", "error")
    pub stop_reason: Option<String>,
}

impl PromptResponse {
    /// Create a successful response
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: true,
            usage: TokenUsage::default(),
            stop_reason: Some("stop".to_string()),
        }
    }

    /// Create a failed response
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            content: error.into(),
            success: false,
            usage: TokenUsage::default(),
            stop_reason: Some("error".to_string()),
        }
    }

    /// Set token usage
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    /// Estimate usage when the service reports no counts
    pub fn estimate(prompt_len: usize, response_len: usize) -> Self {
        let prompt_tokens = (prompt_len as f32 / CHARS_PER_TOKEN_MIXED).ceil() as u32;
        let completion_tokens = (response_len as f32 / CHARS_PER_TOKEN_MIXED).ceil() as u32;
        Self::new(prompt_tokens, completion_tokens)
    }
}

// ============================================================================
// PROVIDER FACTORY
// ============================================================================

/// Create the configured provider
///
/// | Kind | Description | Requires |
/// |------|-------------|----------|
/// | `groq` | Groq (OpenAI-compatible) | `GROQ_API_KEY` |
/// | `openai` | OpenAI API | `OPENAI_API_KEY` |
/// | `mock` | Testing | Nothing |
/// | `none` | AI disabled | Nothing |
///
/// Returns `Ok(None)` when the service is disabled or has no API key.
pub fn create_provider(config: &ProviderConfig) -> crate::error::Result<Option<Box<dyn Provider>>> {
    match config.kind {
        ProviderKind::None => Ok(None),
        ProviderKind::Mock => Ok(Some(Box::new(MockProvider::new()))),
        ProviderKind::Groq | ProviderKind::OpenAI => {
            let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
                tracing::warn!(
                    provider = %config.kind,
                    env = config.kind.api_key_env().unwrap_or_default(),
                    "API key not set, AI generation disabled"
                );
                return Ok(None);
            };

            let mut provider = OpenAIProvider::with_api_key(api_key)
                .with_name(config.kind.as_str())
                .with_base_url(config.effective_base_url())
                .with_model(config.effective_model());

            if let Some(secs) = config.timeout_secs {
                provider = provider
                    .with_timeout(Duration::from_secs(secs))
                    .map_err(|e| PddError::ConfigInvalid {
                        field: "provider.timeout_secs".to_string(),
                        reason: format!("{e:#}"),
                    })?;
            }

            Ok(Some(Box::new(provider)))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
