//! Flow extraction against a fake Chat Completions server
//!
//! The real `OpenAIProvider` talks to a wiremock server, so request shape,
//! HTTP failures and malformed model output are all exercised end to end.

use pddgen::extract::FlowExtractor;
use pddgen::graph::{NodeKind, ProcessGraph};
use pddgen::provider::{OpenAIProvider, Provider};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// HELPERS
// =============================================================================

fn provider_for(server: &MockServer, name: &str) -> OpenAIProvider {
    OpenAIProvider::with_api_key("test-key")
        .with_name(name)
        .with_base_url(server.uri())
        .with_model("test-model")
}

/// Chat Completions body whose assistant message is `content`
fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200 }
    })
}

const INVOICE_FLOW: &str = r#"{
    "nodes": [
        {"id": "1", "label": "Receive Invoice", "type": "start"},
        {"id": "2", "label": "Amount over limit?", "type": "decision"},
        {"id": "3", "label": "Manager Approval", "type": "action"},
        {"id": "4", "label": "Post to Ledger", "type": "end"}
    ],
    "edges": [
        {"from": "1", "to": "2"},
        {"from": "2", "to": "3", "label": "Yes"},
        {"from": "2", "to": "4", "label": "No"},
        {"from": "3", "to": "4"}
    ]
}"#;

// =============================================================================
// SUCCESS
// =============================================================================

#[tokio::test]
async fn test_extract_parses_graph_from_service() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(INVOICE_FLOW)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    let graph = FlowExtractor::new("test-model")
        .extract("Invoices arrive by mail.", Some(&provider as &dyn Provider))
        .await;

    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.edges.len(), 4);
    assert_eq!(graph.node("2").map(|n| n.kind), Some(NodeKind::Decision));
    assert_eq!(graph.edges[1].display_label(), Some("Yes"));
    assert!(graph.dangling_edges().is_empty());
}

#[tokio::test]
async fn test_request_asks_for_json_object() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(INVOICE_FLOW)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, "openai");
    let result = FlowExtractor::new("test-model")
        .try_extract("Invoices arrive by mail.", Some(&provider as &dyn Provider))
        .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
}

#[tokio::test]
async fn test_prompt_carries_narrative() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(INVOICE_FLOW)))
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    FlowExtractor::new("test-model")
        .extract("Clerk scans the receipt", Some(&provider as &dyn Provider))
        .await;

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let user_message = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();
    assert!(user_message.starts_with("Analyze this process: Clerk scans the receipt."));
}

#[tokio::test]
async fn test_numeric_ids_are_accepted() {
    let server = MockServer::start().await;

    let content = r#"{"nodes": [{"id": 1, "label": "Start", "type": "start"},
                                {"id": 2, "label": "Done", "type": "end"}],
                      "edges": [{"from": 1, "to": 2}]}"#;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    let graph = FlowExtractor::new("test-model")
        .try_extract("x", Some(&provider as &dyn Provider))
        .await
        .unwrap();

    assert_eq!(graph.nodes[0].id, "1");
    assert_eq!(graph.edges[0].from_id, "1");
    assert_eq!(graph.edges[0].to_id, "2");
}

// =============================================================================
// FAILURES DEGRADE TO THE FALLBACK GRAPH
// =============================================================================

/// Server that rejects exactly one request with 401
async fn unauthorized_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Invalid API Key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_unauthorized_reports_cause() {
    let server = unauthorized_server().await;
    let provider = provider_for(&server, "groq");

    let err = FlowExtractor::new("test-model")
        .try_extract("x", Some(&provider as &dyn Provider))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("PDD-032"), "got: {err}");
    assert!(err.to_string().contains("401"), "got: {err}");
}

#[tokio::test]
async fn test_unauthorized_falls_back() {
    let server = unauthorized_server().await;
    let provider = provider_for(&server, "groq");

    let graph = FlowExtractor::new("test-model")
        .extract("x", Some(&provider as &dyn Provider))
        .await;

    assert_eq!(graph, ProcessGraph::fallback());
}

#[tokio::test]
async fn test_prose_response_falls_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("Sure! Here is your flowchart.")),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    let graph = FlowExtractor::new("test-model")
        .extract("x", Some(&provider as &dyn Provider))
        .await;

    assert!(graph.is_fallback());
}

#[tokio::test]
async fn test_missing_nodes_key_falls_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion(r#"{"steps": ["a", "b"]}"#)),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    let err = FlowExtractor::new("test-model")
        .try_extract("x", Some(&provider as &dyn Provider))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("PDD-034"), "got: {err}");
}

#[tokio::test]
async fn test_single_attempt_on_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    let graph = FlowExtractor::new("test-model")
        .extract("x", Some(&provider as &dyn Provider))
        .await;

    assert!(graph.is_fallback());
    // `expect(1)` is verified when the server drops
}

#[tokio::test]
async fn test_unreachable_service_falls_back() {
    // Nothing listens on port 9 (discard) in the test environment
    let provider = OpenAIProvider::with_api_key("k").with_base_url("http://127.0.0.1:9");

    let graph = FlowExtractor::new("m")
        .extract("x", Some(&provider as &dyn Provider))
        .await;

    assert!(graph.is_fallback());
}

#[tokio::test]
async fn test_length_stop_is_reported_and_falls_back() {
    let server = MockServer::start().await;

    let mut body = completion(r#"{"nodes": [{"id": "1", "label": "Rec"#);
    body["choices"][0]["finish_reason"] = json!("length");
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    let extractor = FlowExtractor::new("test-model");

    let err = extractor
        .try_extract("x", Some(&provider as &dyn Provider))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("PDD-036"), "got: {err}");
    assert!(err.to_string().contains("80 tokens"), "got: {err}");

    let graph = extractor.extract("x", Some(&provider as &dyn Provider)).await;
    assert!(graph.is_fallback());
}

#[tokio::test]
async fn test_sampling_settings_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "max_tokens": 1024, "temperature": 0.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(INVOICE_FLOW)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, "groq");
    let result = FlowExtractor::new("test-model")
        .with_sampling(Some(1024), Some(0.0))
        .try_extract("x", Some(&provider as &dyn Provider))
        .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
}

#[tokio::test]
async fn test_provider_without_key_is_never_called() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(INVOICE_FLOW)))
        .expect(0)
        .mount(&server)
        .await;

    let provider = OpenAIProvider::with_api_key("").with_base_url(server.uri());
    let graph = FlowExtractor::new("test-model")
        .extract("x", Some(&provider as &dyn Provider))
        .await;

    assert!(graph.is_fallback());
}
