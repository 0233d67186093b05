//! Diagram layout engine
//!
//! - [`style`] - shape/color/label rules per node kind and edge
//! - [`dot`] - deterministic DOT serialization
//! - [`render`] - Graphviz subprocess producing the PNG
//!
//! Geometry (layering, ordering, edge routing) is left to Graphviz `dot`.
//! Failures are returned as [`RenderError`](crate::error::RenderError) for
//! the caller to turn into a placeholder.

pub mod dot;
pub mod render;
pub mod style;

pub use dot::{to_dot, LayoutOptions};
pub use render::{check_graph, png_path, GraphvizRenderer};
pub use style::{wrap_label, EdgeStyle, NodeShape, NodeStyle};
