//! Process graph extracted from narrative text
//!
//! The serde representation is the wire contract with the text-generation
//! service:
//!
//! ```json
//! { "nodes": [ { "id": "1", "label": "Receive invoice", "type": "start" } ],
//!   "edges": [ { "from": "1", "to": "2", "label": "Yes" } ] }
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Id of the single node in the fallback graph
pub const FALLBACK_NODE_ID: &str = "1";

/// Label of the single node in the fallback graph
pub const FALLBACK_NODE_LABEL: &str = "Start";

// ============================================================================
// NODE KIND
// ============================================================================

/// Semantic category of a flowchart step, driving its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeKind {
    Start,
    End,
    Decision,
    #[default]
    Action,
}

impl NodeKind {
    /// Normalize a free-text kind. Case and surrounding whitespace are
    /// ignored; anything unrecognized is an action.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start" => NodeKind::Start,
            "end" => NodeKind::End,
            "decision" => NodeKind::Decision,
            _ => NodeKind::Action,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Decision => "decision",
            NodeKind::Action => "action",
        }
    }

    /// Start and end share the terminal encoding
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::End)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(NodeKind::parse).unwrap_or_default())
    }
}

// ============================================================================
// NODES & EDGES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,

    #[serde(default, deserialize_with = "string_or_null")]
    pub label: String,

    #[serde(rename = "type", default)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "from", deserialize_with = "opaque_id")]
    pub from_id: String,

    #[serde(rename = "to", deserialize_with = "opaque_id")]
    pub to_id: String,

    /// Empty means no label
    #[serde(
        default,
        deserialize_with = "string_or_null",
        skip_serializing_if = "String::is_empty"
    )]
    pub label: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_id: from.into(),
            to_id: to.into(),
            label: String::new(),
        }
    }

    pub fn labeled(from: impl Into<String>, to: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::new(from, to)
        }
    }

    /// Label text with whitespace trimmed, `None` when there is nothing to show
    pub fn display_label(&self) -> Option<&str> {
        let trimmed = self.label.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// An edge endpoint that names no declared node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge<'a> {
    pub edge: &'a Edge,
    pub missing: &'a str,
}

// ============================================================================
// PROCESS GRAPH
// ============================================================================

/// Typed flow graph: nodes in declaration order, then edges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl ProcessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The minimal graph substituted whenever extraction fails:
    /// one `Start` action node, no edges.
    pub fn fallback() -> Self {
        Self {
            nodes: vec![Node::new(
                FALLBACK_NODE_ID,
                FALLBACK_NODE_LABEL,
                NodeKind::Action,
            )],
            edges: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Empty graphs never travel downstream
    pub fn or_fallback(self) -> Self {
        if self.is_empty() {
            Self::fallback()
        } else {
            self
        }
    }

    /// Builder-style node append
    pub fn with_node(mut self, id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        self.nodes.push(Node::new(id, label, kind));
        self
    }

    /// Builder-style edge append; an empty label means unlabeled
    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>, label: impl Into<String>) -> Self {
        self.edges.push(Edge::labeled(from, to, label));
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// First node id declared more than once, if any
    pub fn duplicate_node_id(&self) -> Option<&str> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    /// Edges whose `from_id` or `to_id` names no node, in edge order.
    /// A missing source is reported before a missing target.
    pub fn dangling_edges(&self) -> Vec<DanglingEdge<'_>> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .filter_map(|edge| {
                [edge.from_id.as_str(), edge.to_id.as_str()]
                    .into_iter()
                    .find(|id| !ids.contains(id))
                    .map(|missing| DanglingEdge { edge, missing })
            })
            .collect()
    }
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

/// Ids are opaque strings; numeric ids (`1`) become their decimal text
fn opaque_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match WireId::deserialize(deserializer)? {
        WireId::Text(s) => s,
        WireId::Number(n) => n.to_string(),
    })
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(NodeKind::parse("Decision"), NodeKind::Decision);
        assert_eq!(NodeKind::parse("  START "), NodeKind::Start);
        assert_eq!(NodeKind::parse("end"), NodeKind::End);
        assert_eq!(NodeKind::parse("action"), NodeKind::Action);
    }

    #[test]
    fn test_kind_parse_unknown_is_action() {
        assert_eq!(NodeKind::parse("foo"), NodeKind::Action);
        assert_eq!(NodeKind::parse(""), NodeKind::Action);
        assert_eq!(NodeKind::parse("action/decision"), NodeKind::Action);
    }

    #[test]
    fn test_fallback_shape() {
        let graph = ProcessGraph::fallback();
        assert_eq!(graph.nodes, vec![Node::new("1", "Start", NodeKind::Action)]);
        assert!(graph.edges.is_empty());
        assert!(graph.is_fallback());
    }

    #[test]
    fn test_empty_graph_degrades_to_fallback() {
        assert!(ProcessGraph::new().or_fallback().is_fallback());

        let graph = ProcessGraph::new().with_node("a", "A", NodeKind::Start);
        assert_eq!(graph.clone().or_fallback(), graph);
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let json = r#"{
            "nodes": [
                {"id": "1", "label": "Receive", "type": "start"},
                {"id": 2, "label": "Valid?", "type": "DECISION"},
                {"id": "3", "type": "foo"},
                {"id": "4", "label": null}
            ],
            "edges": [
                {"from": "1", "to": 2},
                {"from": "2", "to": "3", "label": "Yes"},
                {"from": "2", "to": "4", "label": null}
            ]
        }"#;

        let graph: ProcessGraph = serde_json::from_str(json).unwrap();

        assert_eq!(
            graph.nodes,
            vec![
                Node::new("1", "Receive", NodeKind::Start),
                Node::new("2", "Valid?", NodeKind::Decision),
                Node::new("3", "", NodeKind::Action),
                Node::new("4", "", NodeKind::Action),
            ]
        );
        assert_eq!(
            graph.edges,
            vec![
                Edge::new("1", "2"),
                Edge::labeled("2", "3", "Yes"),
                Edge::new("2", "4"),
            ]
        );
    }

    #[test]
    fn test_serialize_uses_wire_field_names() {
        let graph = ProcessGraph::new()
            .with_node("1", "Check", NodeKind::Decision)
            .with_node("2", "Done", NodeKind::End)
            .with_edge("1", "2", "Yes")
            .with_edge("2", "1", "");

        let value = serde_json::to_value(&graph).unwrap();

        assert_eq!(value["nodes"][0]["type"], "decision");
        assert_eq!(value["edges"][0]["from"], "1");
        assert_eq!(value["edges"][0]["to"], "2");
        assert_eq!(value["edges"][0]["label"], "Yes");
        assert!(value["edges"][1].get("label").is_none());
    }

    #[test]
    fn test_ids_are_opaque_strings() {
        let graph = ProcessGraph::new()
            .with_node("01", "A", NodeKind::Action)
            .with_node("1", "B", NodeKind::Action);

        assert!(graph.duplicate_node_id().is_none());
        assert_eq!(graph.node("01").map(|n| n.label.as_str()), Some("A"));
    }

    #[test]
    fn test_duplicate_node_id() {
        let graph = ProcessGraph::new()
            .with_node("1", "A", NodeKind::Action)
            .with_node("2", "B", NodeKind::Action)
            .with_node("1", "C", NodeKind::Action);

        assert_eq!(graph.duplicate_node_id(), Some("1"));
    }

    #[test]
    fn test_dangling_edges() {
        let graph = ProcessGraph::new()
            .with_node("1", "A", NodeKind::Start)
            .with_node("2", "B", NodeKind::End)
            .with_edge("1", "2", "")
            .with_edge("1", "9", "No")
            .with_edge("7", "8", "");

        let dangling = graph.dangling_edges();

        assert_eq!(dangling.len(), 2);
        assert_eq!(dangling[0].missing, "9");
        assert_eq!(dangling[0].edge.label, "No");
        assert_eq!(dangling[1].missing, "7");
    }

    #[test]
    fn test_display_label_trims() {
        assert_eq!(Edge::labeled("a", "b", "  Yes ").display_label(), Some("Yes"));
        assert_eq!(Edge::labeled("a", "b", "   ").display_label(), None);
        assert_eq!(Edge::new("a", "b").display_label(), None);
    }
}
