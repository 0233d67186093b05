//! Narrative document sections
//!
//! Short AI-written summaries for the fixed sections of a process design
//! document. Like flow extraction, this never fails: the section body
//! carries a bracketed marker instead.

use serde::Serialize;

use crate::provider::{PromptRequest, Provider};

/// Body used when no provider is configured
pub const API_KEY_MISSING: &str = "[API Key Missing]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Section {
    Introduction,
    Audience,
    Purpose,
    Scope,
}

impl Section {
    /// Document order
    pub const ALL: [Section; 4] = [
        Section::Introduction,
        Section::Audience,
        Section::Purpose,
        Section::Scope,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            Section::Introduction => "INTRODUCTION",
            Section::Audience => "AUDIENCE",
            Section::Purpose => "PURPOSE",
            Section::Scope => "SCOPE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionText {
    pub section: Section,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct SectionWriter {
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl SectionWriter {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_sampling(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn build_prompt(section: Section, narrative: &str, title: &str) -> String {
        format!(
            "Context: {narrative}. Project: {title}. \
             Write a 2-3 sentence technical summary for the '{}' section. \
             Keep it concise, professional, and no fluff.",
            section.heading()
        )
    }

    /// Body text for one section
    pub async fn write(
        &self,
        section: Section,
        narrative: &str,
        title: &str,
        client: Option<&dyn Provider>,
    ) -> String {
        let Some(provider) = client.filter(|p| p.is_available()) else {
            return API_KEY_MISSING.to_string();
        };

        let request = PromptRequest::new(
            Self::build_prompt(section, narrative, title),
            self.model.clone(),
        )
        .with_sampling(self.max_tokens, self.temperature);

        match provider.execute(request).await {
            Ok(response) if response.success => {
                tracing::debug!(
                    section = section.heading(),
                    total_tokens = response.usage.total_tokens,
                    stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
                    "Section written"
                );
                response.content.trim().to_string()
            }
            Ok(response) => {
                tracing::warn!(section = section.heading(), error = %response.content, "Section generation failed");
                format!("[AI Error: {}]", response.content)
            }
            Err(e) => {
                tracing::warn!(section = section.heading(), error = %e, "Section generation failed");
                format!("[AI Error: {e:#}]")
            }
        }
    }

    /// All sections in document order, one request each
    pub async fn write_all(
        &self,
        narrative: &str,
        title: &str,
        client: Option<&dyn Provider>,
    ) -> Vec<SectionText> {
        let mut out = Vec::with_capacity(Section::ALL.len());
        for section in Section::ALL {
            let body = self.write(section, narrative, title, client).await;
            out.push(SectionText { section, body });
        }
        out
    }
}
