//! Error types with fix suggestions
//!
//! Error code ranges:
//! - PDD-001-009: Configuration errors
//! - PDD-010-019: Input errors
//! - PDD-030-039: Extraction errors (always collapsed to the fallback graph)
//! - PDD-050-059: Rendering errors (surfaced to the caller)

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PddError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

// ═══════════════════════════════════════════
// EXTRACTION ERRORS (030-039)
// ═══════════════════════════════════════════

/// Why a flow graph could not be extracted from the service response.
///
/// Never reaches callers of `FlowExtractor::extract`; exposed through
/// `try_extract` for diagnostics and tests.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("[PDD-030] No text-generation provider configured")]
    NoProvider,

    #[error("[PDD-031] Provider '{provider}' request failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("[PDD-032] Provider '{provider}' returned an error response: {details}")]
    ProviderResponse { provider: String, details: String },

    #[error("[PDD-033] Invalid JSON in flow response: {details}")]
    InvalidJson { details: String },

    #[error("[PDD-034] Flow response does not match the graph shape: {details}")]
    SchemaMismatch { details: String },

    #[error("[PDD-035] Duplicate node id '{id}' in flow response")]
    DuplicateNode { id: String },

    #[error("[PDD-036] Provider '{provider}' stopped at the token limit after {completion_tokens} tokens")]
    Truncated {
        provider: String,
        completion_tokens: u32,
    },
}

impl FixSuggestion for ExtractError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ExtractError::NoProvider => Some("Set GROQ_API_KEY or OPENAI_API_KEY, or configure [provider] in pddgen.toml"),
            ExtractError::Provider { .. } => Some("Check network access and the provider base_url"),
            ExtractError::ProviderResponse { .. } => Some("Check the API key and model name"),
            ExtractError::InvalidJson { .. } => Some("Use a model that supports JSON object responses"),
            ExtractError::SchemaMismatch { .. } => Some("Expected {\"nodes\": [...], \"edges\": [...]}"),
            ExtractError::DuplicateNode { .. } => Some("Node ids must be unique within a graph"),
            ExtractError::Truncated { .. } => Some("Raise or remove provider.max_tokens in pddgen.toml"),
        }
    }
}

// ═══════════════════════════════════════════
// RENDER ERRORS (050-059)
// ═══════════════════════════════════════════

/// Diagram rendering failure. Callers are expected to substitute a
/// placeholder rather than abort.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("[PDD-050] Edge '{from}' -> '{to}' references unknown node '{missing}'")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },

    #[error("[PDD-051] Duplicate node id '{id}'")]
    DuplicateNode { id: String },

    #[error("[PDD-052] Graphviz '{program}' is not available: {reason}")]
    LayoutEngineUnavailable { program: String, reason: String },

    #[error("[PDD-053] Graphviz '{program}' failed ({status}): {stderr}")]
    LayoutEngineFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("[PDD-054] Graphviz '{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("[PDD-055] Failed to write diagram '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FixSuggestion for RenderError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            RenderError::DanglingEdge { .. } => Some("Every edge must connect two declared node ids"),
            RenderError::DuplicateNode { .. } => Some("Node ids must be unique within a graph"),
            RenderError::LayoutEngineUnavailable { .. } => {
                Some("Install Graphviz (https://graphviz.org) or set render.dot_program")
            }
            RenderError::LayoutEngineFailed { .. } => Some("Inspect the DOT output with `pddgen dot`"),
            RenderError::Timeout { .. } => Some("Increase render.timeout_secs for large graphs"),
            RenderError::Io { .. } => Some("Check the output directory exists and is writable"),
        }
    }
}

// ═══════════════════════════════════════════
// TOP-LEVEL ERRORS
// ═══════════════════════════════════════════

#[derive(Error, Debug)]
pub enum PddError {
    #[error("[PDD-001] Failed to read config '{path}': {reason}")]
    ConfigRead { path: String, reason: String },

    #[error("[PDD-002] Failed to parse config '{path}': {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("[PDD-003] Invalid config value '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    #[error("[PDD-004] Unknown provider kind '{kind}'")]
    UnknownProvider { kind: String },

    #[error("[PDD-010] Please provide process details.")]
    EmptyNarrative,

    #[error("[PDD-011] Unsupported input file '{path}' (expected .txt, .md or .docx)")]
    UnsupportedInput { path: String },

    #[error("[PDD-012] Input file '{path}' is not valid UTF-8")]
    InvalidEncoding { path: String },

    #[error("[PDD-013] Cannot read Word document '{path}': {reason}")]
    InvalidDocument { path: String, reason: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixSuggestion for PddError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            PddError::ConfigRead { .. } => Some("Check the config file path and permissions"),
            PddError::ConfigParse { .. } => Some("Check TOML syntax in pddgen.toml"),
            PddError::ConfigInvalid { .. } => Some("Fix the value in pddgen.toml"),
            PddError::UnknownProvider { .. } => Some("Use one of: groq, openai, mock, none"),
            PddError::EmptyNarrative => Some("Pass --input FILE or --text \"...\""),
            PddError::UnsupportedInput { .. } => Some("Save the narrative as .txt, .md or .docx"),
            PddError::InvalidEncoding { .. } => Some("Save the file as UTF-8"),
            PddError::InvalidDocument { .. } => Some("Re-save the file as .docx from Word, or export it as .txt"),
            PddError::Extract(e) => e.fix_suggestion(),
            PddError::Render(e) => e.fix_suggestion(),
            PddError::Json(_) => Some("Check the graph file matches {\"nodes\": [...], \"edges\": [...]}"),
            PddError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
