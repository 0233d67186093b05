//! Flow extraction - narrative text to [`ProcessGraph`]
//!
//! One call to the text-generation service, strict JSON parsing, schema
//! check. [`FlowExtractor::extract`] is the only place where failures are
//! swallowed: every [`ExtractError`] becomes [`ProcessGraph::fallback`].
//! No retries.

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::error::ExtractError;
use crate::graph::ProcessGraph;
use crate::provider::{PromptRequest, Provider};

/// Shape the service response must have before it is converted.
/// Ids may be strings or integers; labels and types may be null.
static FLOW_SCHEMA: Lazy<jsonschema::Validator> = Lazy::new(|| {
    let id = json!({ "type": ["string", "integer"] });
    let text = json!({ "type": ["string", "null"] });
    let schema = json!({
        "type": "object",
        "required": ["nodes"],
        "properties": {
            "nodes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": { "id": id, "label": text, "type": text }
                }
            },
            "edges": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["from", "to"],
                    "properties": { "from": id, "to": id, "label": text }
                }
            }
        }
    });
    jsonschema::validator_for(&schema).expect("flow schema is valid")
});

/// Turns process narrative into a typed flow graph
#[derive(Debug, Clone, Default)]
pub struct FlowExtractor {
    /// Model passed to the provider; empty means provider default
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl FlowExtractor {
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

    /// Fixed instruction prompt wrapping the narrative
    pub fn build_prompt(narrative: &str) -> String {
        format!(
            "Analyze this process: {narrative}. \
             Break it into a structured flowchart with actions and decisions. \
             Use type \"start\" for the first step, \"end\" for final steps, \
             \"decision\" for yes/no branch points and \"action\" for everything else. \
             Return ONLY a JSON object with this structure: \
             {{\"nodes\": [ {{\"id\": \"1\", \"label\": \"Step Name\", \"type\": \"start/end/action/decision\"}} ], \
             \"edges\": [ {{\"from\": \"1\", \"to\": \"2\", \"label\": \"Yes/No (optional)\"}} ] }}"
        )
    }

    fn build_request(&self, narrative: &str, provider: &dyn Provider) -> PromptRequest {
        let request = PromptRequest::new(Self::build_prompt(narrative), self.model.clone())
            .with_sampling(self.max_tokens, self.temperature);
        if provider.capabilities().json_mode {
            request.json_object()
        } else {
            request
        }
    }

    /// Extract a graph, reporting why it failed
    ///
    /// An empty `nodes` array is not an error: it degrades to the fallback.
    pub async fn try_extract(
        &self,
        narrative: &str,
        client: Option<&dyn Provider>,
    ) -> Result<ProcessGraph, ExtractError> {
        let provider = client
            .filter(|p| p.is_available())
            .ok_or(ExtractError::NoProvider)?;
        let request = self.build_request(narrative, provider);

        tracing::debug!(
            provider = provider.name(),
            narrative_chars = narrative.chars().count(),
            "Requesting flow graph"
        );

        let response = provider
            .execute(request)
            .await
            .map_err(|e| ExtractError::Provider {
                provider: provider.name().to_string(),
                reason: format!("{e:#}"),
            })?;

        if !response.success {
            return Err(ExtractError::ProviderResponse {
                provider: provider.name().to_string(),
                details: response.content,
            });
        }

        tracing::debug!(
            provider = provider.name(),
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            total_tokens = response.usage.total_tokens,
            stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
            "Flow response received"
        );

        // A cut-off answer is never a complete graph
        if response.stop_reason.as_deref() == Some("length") {
            return Err(ExtractError::Truncated {
                provider: provider.name().to_string(),
                completion_tokens: response.usage.completion_tokens,
            });
        }

        let graph = parse_flow_response(&response.content)?;
        if graph.is_empty() {
            tracing::info!("Flow response has no nodes, using fallback graph");
        }
        Ok(graph.or_fallback())
    }

    /// Extract a graph; never fails
    ///
    /// Missing provider, transport errors, error responses, malformed JSON
    /// and schema mismatches all yield [`ProcessGraph::fallback`].
    pub async fn extract(&self, narrative: &str, client: Option<&dyn Provider>) -> ProcessGraph {
        match self.try_extract(narrative, client).await {
            Ok(graph) => {
                tracing::info!(
                    nodes = graph.nodes.len(),
                    edges = graph.edges.len(),
                    "Extracted flow graph"
                );
                graph
            }
            Err(e) => {
                tracing::warn!(error = %e, "Flow extraction failed, using fallback graph");
                ProcessGraph::fallback()
            }
        }
    }
}

/// Parse a raw service response into a graph (may be empty)
pub fn parse_flow_response(raw: &str) -> Result<ProcessGraph, ExtractError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| ExtractError::InvalidJson {
        details: e.to_string(),
    })?;

    let errors: Vec<String> = FLOW_SCHEMA.iter_errors(&value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ExtractError::SchemaMismatch {
            details: errors.join("; "),
        });
    }

    let graph: ProcessGraph =
        serde_json::from_value(value).map_err(|e| ExtractError::SchemaMismatch {
            details: e.to_string(),
        })?;

    if let Some(id) = graph.duplicate_node_id() {
        return Err(ExtractError::DuplicateNode { id: id.to_string() });
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeKind};
    use crate::provider::{MockProvider, ResponseFormat};
    use pretty_assertions::assert_eq;

    const INVOICE_FLOW: &str = r#"{
        "nodes": [
            {"id": "1", "label": "Receive Invoice", "type": "start"},
            {"id": "2", "label": "Is invoice valid?", "type": "decision"},
            {"id": "3", "label": "Post to ledger", "type": "action"},
            {"id": "4", "label": "Reject", "type": "Action"},
            {"id": "5", "label": "Done", "type": "end"}
        ],
        "edges": [
            {"from": "1", "to": "2"},
            {"from": "2", "to": "3", "label": "Yes"},
            {"from": "2", "to": "4", "label": "No"},
            {"from": "3", "to": "5", "label": ""},
            {"from": "4", "to": "5"}
        ]
    }"#;

    #[test]
    fn test_prompt_mandates_json_shape() {
        let prompt = FlowExtractor::build_prompt("Clerk checks invoice");
        assert!(prompt.starts_with("Analyze this process: Clerk checks invoice."));
        assert!(prompt.contains("Return ONLY a JSON object"));
        assert!(prompt.contains(r#""nodes""#));
        assert!(prompt.contains(r#""edges""#));
        assert!(prompt.contains(r#""from""#));
    }

    #[test]
    fn test_parse_valid_response() {
        let graph = parse_flow_response(INVOICE_FLOW).unwrap();

        assert_eq!(graph.nodes.len(), 5);
        assert_eq!(graph.nodes[1], Node::new("2", "Is invoice valid?", NodeKind::Decision));
        assert_eq!(graph.nodes[3].kind, NodeKind::Action);
        assert_eq!(graph.edges[1], Edge::labeled("2", "3", "Yes"));
        assert_eq!(graph.edges[3].label, "");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_flow_response("Sure! Here is your flowchart:").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidJson { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        for raw in [
            r#"[1, 2, 3]"#,
            r#"{"steps": []}"#,
            r#"{"nodes": "1 -> 2"}"#,
            r#"{"nodes": [{"label": "no id"}]}"#,
            r#"{"nodes": [{"id": "1"}], "edges": [{"from": "1"}]}"#,
            r#"{"nodes": [{"id": true}]}"#,
        ] {
            let err = parse_flow_response(raw).unwrap_err();
            assert!(
                matches!(err, ExtractError::SchemaMismatch { .. }),
                "expected schema mismatch for {raw}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_duplicate_ids() {
        let raw = r#"{"nodes": [{"id": "1"}, {"id": 1}], "edges": []}"#;
        let err = parse_flow_response(raw).unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateNode { ref id } if id == "1"));
    }

    #[test]
    fn test_parse_tolerates_missing_edges() {
        let graph = parse_flow_response(r#"{"nodes": [{"id": "a", "label": "Only"}]}"#).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_extract_success() {
        let provider = MockProvider::new().with_default(INVOICE_FLOW);
        let extractor = FlowExtractor::new("llama-3.3-70b-versatile");

        let graph = extractor.extract("invoice process", Some(&provider)).await;

        assert_eq!(graph.nodes.len(), 5);
        assert_eq!(graph.edges.len(), 5);

        let request = provider.last_request().unwrap();
        assert_eq!(request.response_format, ResponseFormat::JsonObject);
        assert_eq!(request.model, "llama-3.3-70b-versatile");
        assert!(request.prompt.contains("invoice process"));
    }

    #[tokio::test]
    async fn test_extract_without_provider_is_fallback() {
        let extractor = FlowExtractor::default();

        let err = extractor.try_extract("anything", None).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoProvider));

        let graph = extractor.extract("anything", None).await;
        assert_eq!(graph, ProcessGraph::fallback());
    }

    #[tokio::test]
    async fn test_extract_sends_sampling_settings() {
        let provider = MockProvider::new().with_default(INVOICE_FLOW);
        FlowExtractor::new("m")
            .with_sampling(Some(1500), Some(0.0))
            .extract("invoice process", Some(&provider))
            .await;

        let request = provider.last_request().unwrap();
        assert_eq!(request.max_tokens, Some(1500));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_not_called() {
        // An empty key makes the HTTP provider unavailable
        let provider = crate::provider::OpenAIProvider::with_api_key("")
            .with_base_url("http://127.0.0.1:9");

        let err = FlowExtractor::default()
            .try_extract("anything", Some(&provider))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoProvider));
    }

    #[tokio::test]
    async fn test_extract_non_json_is_fallback() {
        let provider = MockProvider::new().with_default("I cannot help with that.");
        let graph = FlowExtractor::default()
            .extract("anything", Some(&provider))
            .await;

        assert_eq!(graph, ProcessGraph::fallback());
    }

    #[tokio::test]
    async fn test_extract_transport_error_is_fallback() {
        let provider = MockProvider::failing("connection reset by peer");
        let extractor = FlowExtractor::default();

        let err = extractor
            .try_extract("anything", Some(&provider))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset by peer"));

        let graph = extractor.extract("anything", Some(&provider)).await;
        assert_eq!(graph, ProcessGraph::fallback());
    }

    #[tokio::test]
    async fn test_extract_empty_nodes_is_fallback() {
        let provider = MockProvider::new().with_default(r#"{"nodes": [], "edges": []}"#);
        let graph = FlowExtractor::default()
            .try_extract("anything", Some(&provider))
            .await
            .unwrap();

        assert!(graph.is_fallback());
    }

    #[tokio::test]
    async fn test_extract_single_attempt() {
        let provider = MockProvider::with_responses(vec!["not json".to_string(), INVOICE_FLOW.to_string()]);
        let graph = FlowExtractor::default().extract("x", Some(&provider)).await;

        assert!(graph.is_fallback());
        assert_eq!(provider.get_requests().len(), 1);
    }
}
