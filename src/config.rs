//! pddgen Configuration
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`GROQ_API_KEY`, `OPENAI_API_KEY`, `PDDGEN_MODEL`)
//! 2. Config file (`--config`, else `./pddgen.toml`, else
//!    `~/.config/pddgen/config.toml`)
//! 3. Defaults
//!
//! ```toml
//! [provider]
//! kind = "groq"
//! model = "llama-3.3-70b-versatile"
//!
//! [render]
//! size_inches = 7.0
//! dpi = 300
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PddError, Result};
use crate::provider::{GROQ_BASE_URL, OPENAI_BASE_URL};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "pddgen.toml";

/// Default narrative budget sent to the service
pub const DEFAULT_MAX_NARRATIVE_CHARS: usize = 4000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PddConfig {
    pub provider: ProviderConfig,
    pub extract: ExtractConfig,
    pub render: RenderConfig,
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Which text-generation service to call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Groq,
    #[serde(rename = "openai")]
    OpenAI,
    Mock,
    None,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Mock => "mock",
            ProviderKind::None => "none",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAI),
            "mock" => Ok(ProviderKind::Mock),
            "none" => Ok(ProviderKind::None),
            _ => Err(PddError::UnknownProvider {
                kind: raw.to_string(),
            }),
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Groq => Some("GROQ_API_KEY"),
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Mock | ProviderKind::None => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::OpenAI => "gpt-4o",
            ProviderKind::Mock | ProviderKind::None => "",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => OPENAI_BASE_URL,
            _ => GROQ_BASE_URL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// Model override (default depends on `kind`)
    pub model: Option<String>,

    /// Endpoint base override
    pub base_url: Option<String>,

    /// API key; prefer the environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Client-side request timeout. None means no timeout.
    pub timeout_secs: Option<u64>,

    /// Completion token cap sent with every request
    pub max_tokens: Option<u32>,

    /// Sampling temperature sent with every request
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.kind.default_model().to_string())
    }

    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.kind.default_base_url().to_string())
    }
}

// ============================================================================
// EXTRACT / RENDER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractConfig {
    /// Narrative is cut to this many characters before the service call
    pub max_narrative_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_narrative_chars: DEFAULT_MAX_NARRATIVE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Graphviz layout program
    pub dot_program: String,

    /// Side of the square drawing area, in inches
    pub size_inches: f32,

    pub dpi: u32,

    pub timeout_secs: u64,

    /// Where `generate` writes diagrams and drafts
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dot_program: "dot".to_string(),
            size_inches: 7.0,
            dpi: 300,
            timeout_secs: 30,
            output_dir: PathBuf::from("."),
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

impl PddConfig {
    /// Get the user config file path
    ///
    /// Returns `~/.config/pddgen/config.toml` on Unix
    pub fn user_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pddgen")
            .join("config.toml")
    }

    /// Load from an explicit path, or the first existing default location,
    /// then apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = PathBuf::from(LOCAL_CONFIG_FILE);
                let user = Self::user_config_path();
                if local.exists() {
                    Self::from_file(&local)?
                } else if user.exists() {
                    Self::from_file(&user)?
                } else {
                    Self::default()
                }
            }
        };

        let config = config.with_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PddError::ConfigRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| PddError::ConfigParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), provider = %config.provider.kind, "Loaded config");
        Ok(config)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Environment merge with an injectable lookup
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(env) = self.provider.kind.api_key_env() {
            if let Some(key) = lookup(env).filter(|k| !k.is_empty()) {
                self.provider.api_key = Some(key);
            }
        }

        if let Some(model) = lookup("PDDGEN_MODEL").filter(|m| !m.is_empty()) {
            self.provider.model = Some(model);
        }

        self
    }

    /// Reject values that would only fail later
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.provider.base_url {
            let parsed = url::Url::parse(base_url).map_err(|e| PddError::ConfigInvalid {
                field: "provider.base_url".to_string(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PddError::ConfigInvalid {
                    field: "provider.base_url".to_string(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
        }

        if let Some(t) = self.provider.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(PddError::ConfigInvalid {
                    field: "provider.temperature".to_string(),
                    reason: format!("{t} is outside 0.0..=2.0"),
                });
            }
        }

        if self.provider.max_tokens == Some(0) {
            return Err(PddError::ConfigInvalid {
                field: "provider.max_tokens".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.extract.max_narrative_chars == 0 {
            return Err(PddError::ConfigInvalid {
                field: "extract.max_narrative_chars".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !(self.render.size_inches.is_finite() && self.render.size_inches > 0.0) {
            return Err(PddError::ConfigInvalid {
                field: "render.size_inches".to_string(),
                reason: "must be a positive number".to_string(),
            });
        }

        if self.render.dpi == 0 {
            return Err(PddError::ConfigInvalid {
                field: "render.dpi".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.render.dot_program.trim().is_empty() {
            return Err(PddError::ConfigInvalid {
                field: "render.dot_program".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
