//! Visual encoding keyed on node kind and edge label
//!
//! All shape/color decisions live here so the DOT writer only serializes.

use crate::graph::{Edge, NodeKind};

/// Labels longer than this (in characters) get one line break
pub const WRAP_THRESHOLD: usize = 15;

pub const FONT_NAME: &str = "Arial";
pub const NODE_FONT_SIZE: u32 = 10;
pub const EDGE_FONT_SIZE: u32 = 9;

pub const TERMINAL_FILL: &str = "#4285F4";
pub const ACTION_FILL: &str = "#E3F2FD";
pub const OUTLINE: &str = "#000000";
pub const EDGE_LABEL_COLOR: &str = "#2c3e50";

/// Insert a single line break at the first space of a long label.
///
/// Labels of at most [`WRAP_THRESHOLD`] characters, or without any space,
/// are returned unchanged. Never more than one break.
pub fn wrap_label(label: &str) -> String {
    if label.chars().count() > WRAP_THRESHOLD {
        label.replacen(' ', "\n", 1)
    } else {
        label.to_string()
    }
}

// ============================================================================
// NODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    /// Pill-shaped terminal
    Capsule,
    Diamond,
    RoundedRect,
}

impl NodeShape {
    /// Graphviz shape name. Graphviz has no capsule; `oval` is the
    /// closest built-in outline.
    pub fn dot_shape(&self) -> &'static str {
        match self {
            NodeShape::Capsule => "oval",
            NodeShape::Diamond => "diamond",
            NodeShape::RoundedRect => "box",
        }
    }

    pub fn dot_style(&self) -> &'static str {
        match self {
            NodeShape::RoundedRect => "filled,rounded",
            NodeShape::Capsule | NodeShape::Diamond => "filled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    pub shape: NodeShape,
    pub fill_color: &'static str,
    pub font_color: &'static str,
    pub outline_color: &'static str,
    /// Minimum size in inches
    pub width: f32,
    pub height: f32,
    pub pen_width: f32,
}

impl NodeStyle {
    pub fn for_kind(kind: NodeKind) -> Self {
        if kind.is_terminal() {
            return Self {
                shape: NodeShape::Capsule,
                fill_color: TERMINAL_FILL,
                font_color: "white",
                ..Self::action()
            };
        }

        match kind {
            NodeKind::Decision => Self {
                shape: NodeShape::Diamond,
                fill_color: TERMINAL_FILL,
                font_color: "white",
                width: 1.4,
                height: 0.9,
                ..Self::action()
            },
            _ => Self::action(),
        }
    }

    /// Default step encoding
    pub fn action() -> Self {
        Self {
            shape: NodeShape::RoundedRect,
            fill_color: ACTION_FILL,
            font_color: "black",
            outline_color: OUTLINE,
            width: 2.0,
            height: 0.6,
            pen_width: 1.2,
        }
    }
}

// ============================================================================
// EDGES
// ============================================================================

/// Label drawn beside the tail of an edge instead of on the line
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetLabel {
    /// Padded label text
    pub text: String,
    /// Degrees from the edge direction
    pub angle: f32,
    /// Multiple of the font size away from the tail
    pub distance: f32,
    pub font_size: u32,
    pub font_color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EdgeStyle {
    Plain { pen_width: f32 },
    Labeled(OffsetLabel),
}

impl EdgeStyle {
    pub fn for_edge(edge: &Edge) -> Self {
        match edge.display_label() {
            Some(text) => EdgeStyle::Labeled(OffsetLabel {
                text: format!(" {text} "),
                angle: -45.0,
                distance: 2.5,
                font_size: EDGE_FONT_SIZE,
                font_color: EDGE_LABEL_COLOR,
            }),
            None => EdgeStyle::Plain { pen_width: 1.0 },
        }
    }
}
