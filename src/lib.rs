//! pddgen - Process Design Document generator
//!
//! Narrative text → AI-extracted flow graph → Graphviz flowchart, plus the
//! AI-written narrative sections of the document.

pub mod config;
pub mod diagram;
pub mod error;
pub mod extract;
pub mod graph;
pub mod narrative;
pub mod pipeline;
pub mod provider;
pub mod sections;

pub use config::PddConfig;
pub use diagram::GraphvizRenderer;
pub use error::{ExtractError, PddError, RenderError};
pub use extract::FlowExtractor;
pub use graph::{Edge, Node, NodeKind, ProcessGraph};
pub use narrative::Narrative;
pub use pipeline::{DocumentDraft, DocumentPipeline, FlowchartOutcome};
pub use provider::{Provider, PromptRequest, PromptResponse};
