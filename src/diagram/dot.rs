//! Graphviz DOT serialization
//!
//! Output is a pure function of the graph and [`LayoutOptions`]: nodes and
//! edges are written in declaration order, so identical input yields
//! byte-identical DOT.

use std::fmt::Write;

use super::style::{wrap_label, EdgeStyle, NodeStyle, FONT_NAME, NODE_FONT_SIZE};
use crate::graph::ProcessGraph;

/// Canvas parameters handed to Graphviz
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    /// Side of the square drawing area, in inches
    pub size_inches: f32,
    pub dpi: u32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            size_inches: 7.0,
            dpi: 300,
        }
    }
}

/// Quote a string as a DOT escString
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Serialize a graph as a top-to-bottom flowchart
pub fn to_dot(graph: &ProcessGraph, options: &LayoutOptions) -> String {
    let mut out = String::new();
    let size = options.size_inches;

    // Writing to a String is infallible
    let _ = writeln!(out, "// Process Flow");
    let _ = writeln!(out, "digraph {{");
    let _ = writeln!(out, "\tgraph [dpi={}]", options.dpi);
    let _ = writeln!(out, "\tgraph [rankdir=TB ratio=fill size=\"{size},{size}!\"]");
    let _ = writeln!(out, "\tgraph [nodesep=0.5 ranksep=0.4 splines=polyline]");

    let action = NodeStyle::action();
    let _ = writeln!(
        out,
        "\tnode [color={} fillcolor={} fontname={} fontsize={} height={} penwidth={} shape={} style={} width={}]",
        quote(action.outline_color),
        quote(action.fill_color),
        quote(FONT_NAME),
        NODE_FONT_SIZE,
        action.height,
        action.pen_width,
        action.shape.dot_shape(),
        quote(action.shape.dot_style()),
        action.width,
    );

    for node in &graph.nodes {
        let style = NodeStyle::for_kind(node.kind);
        let _ = writeln!(
            out,
            "\t{} [label={} shape={} style={} fillcolor={} fontcolor={} color={} width={} height={}]",
            quote(&node.id),
            quote(&wrap_label(&node.label)),
            style.shape.dot_shape(),
            quote(style.shape.dot_style()),
            quote(style.fill_color),
            quote(style.font_color),
            quote(style.outline_color),
            style.width,
            style.height,
        );
    }

    for edge in &graph.edges {
        let attrs = match EdgeStyle::for_edge(edge) {
            EdgeStyle::Plain { pen_width } => format!("penwidth={pen_width}"),
            EdgeStyle::Labeled(label) => format!(
                "taillabel={} labelangle={} labeldistance={} fontname={} fontsize={} fontcolor={}",
                quote(&label.text),
                label.angle,
                label.distance,
                quote(FONT_NAME),
                label.font_size,
                quote(label.font_color),
            ),
        };
        let _ = writeln!(
            out,
            "\t{} -> {} [{}]",
            quote(&edge.from_id),
            quote(&edge.to_id),
            attrs
        );
    }

    out.push_str("}\n");
    out
}
