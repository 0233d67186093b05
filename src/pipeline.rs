//! Document-generation pipeline
//!
//! One request: narrative → sections + flow graph → flowchart image. The
//! result is a [`DocumentDraft`] for the document assembler; a failed render
//! becomes a textual placeholder rather than an error.

use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::config::{PddConfig, DEFAULT_MAX_NARRATIVE_CHARS};
use crate::diagram::GraphvizRenderer;
use crate::error::{RenderError, Result};
use crate::extract::FlowExtractor;
use crate::graph::ProcessGraph;
use crate::narrative::Narrative;
use crate::provider::{create_provider, Provider};
use crate::sections::{SectionText, SectionWriter};

/// Prefix of the text inserted when no diagram could be produced
pub const PLACEHOLDER_PREFIX: &str = "Could not generate flowchart: ";

/// What the assembler should put in the process-flow section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowchartOutcome {
    Image { path: PathBuf },
    Placeholder { message: String },
}

impl FlowchartOutcome {
    pub fn placeholder(cause: impl std::fmt::Display) -> Self {
        FlowchartOutcome::Placeholder {
            message: format!("{PLACEHOLDER_PREFIX}{cause}"),
        }
    }

    pub fn from_render(result: std::result::Result<PathBuf, RenderError>) -> Self {
        match result {
            Ok(path) => FlowchartOutcome::Image { path },
            Err(e) => {
                tracing::warn!(error = %e, "Flowchart rendering failed, using placeholder");
                Self::placeholder(e)
            }
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        match self {
            FlowchartOutcome::Image { path } => Some(path),
            FlowchartOutcome::Placeholder { .. } => None,
        }
    }
}

/// Everything generated for one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDraft {
    pub request_id: String,
    pub title: String,
    pub sections: Vec<SectionText>,
    pub graph: ProcessGraph,
    pub flowchart: FlowchartOutcome,
}

impl DocumentDraft {
    /// Write the draft as `draft-<request_id>.json` in `dir`
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("draft-{}.json", self.request_id));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

pub struct DocumentPipeline {
    provider: Option<Box<dyn Provider>>,
    extractor: FlowExtractor,
    sections: SectionWriter,
    renderer: GraphvizRenderer,
    max_narrative_chars: usize,
    output_dir: PathBuf,
}

impl DocumentPipeline {
    pub fn new(provider: Option<Box<dyn Provider>>, renderer: GraphvizRenderer) -> Self {
        Self {
            provider,
            extractor: FlowExtractor::default(),
            sections: SectionWriter::default(),
            renderer,
            max_narrative_chars: DEFAULT_MAX_NARRATIVE_CHARS,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn from_config(config: &PddConfig) -> Result<Self> {
        let provider = create_provider(&config.provider)?;
        let model = config.provider.effective_model();
        Ok(Self::new(provider, GraphvizRenderer::from(&config.render))
            .with_model(model)
            .with_sampling(config.provider.max_tokens, config.provider.temperature)
            .with_max_narrative_chars(config.extract.max_narrative_chars)
            .with_output_dir(config.render.output_dir.clone()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.extractor = self.extractor.with_model(model.clone());
        self.sections = self.sections.with_model(model);
        self
    }

    /// Token cap and temperature for every request of the run
    pub fn with_sampling(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.extractor = self.extractor.with_sampling(max_tokens, temperature);
        self.sections = self.sections.with_sampling(max_tokens, temperature);
        self
    }

    pub fn with_max_narrative_chars(mut self, max: usize) -> Self {
        self.max_narrative_chars = max;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn renderer(&self) -> &GraphvizRenderer {
        &self.renderer
    }

    /// Flow graph for a narrative; never fails
    pub async fn extract_graph(&self, narrative: &Narrative) -> ProcessGraph {
        let text = narrative.truncated(self.max_narrative_chars);
        self.extractor.extract(text, self.provider.as_deref()).await
    }

    /// Render on the blocking pool; failures become a placeholder
    pub async fn render_flowchart(&self, graph: &ProcessGraph, base: &Path) -> FlowchartOutcome {
        let renderer = self.renderer.clone();
        let graph = graph.clone();
        let base = base.to_path_buf();

        match tokio::task::spawn_blocking(move || renderer.render(&graph, &base)).await {
            Ok(result) => FlowchartOutcome::from_render(result),
            Err(e) => {
                tracing::error!(error = %e, "Render task panicked");
                FlowchartOutcome::placeholder(format!("render task failed: {e}"))
            }
        }
    }

    /// Run one document-generation request
    ///
    /// Only fails if the output directory cannot be created.
    pub async fn run(&self, narrative: &Narrative) -> Result<DocumentDraft> {
        let request_id = Uuid::new_v4().to_string();
        std::fs::create_dir_all(&self.output_dir)?;

        tracing::info!(
            request_id = %request_id,
            title = %narrative.title,
            provider = self.provider.as_ref().map(|p| p.name()).unwrap_or("none"),
            "Generating document"
        );

        let text = narrative.truncated(self.max_narrative_chars);
        let sections = self
            .sections
            .write_all(text, &narrative.title, self.provider.as_deref())
            .await;

        let graph = self.extract_graph(narrative).await;

        // Unique per request so parallel requests never share an image
        let base = self.output_dir.join(format!("flowchart-{request_id}"));
        let flowchart = self.render_flowchart(&graph, &base).await;

        Ok(DocumentDraft {
            request_id,
            title: narrative.title.clone(),
            sections,
            graph,
            flowchart,
        })
    }
}
