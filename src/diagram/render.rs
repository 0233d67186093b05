//! Graphviz rasterization
//!
//! Runs `dot -Tpng` as a subprocess with a timeout. The image is written to
//! a sibling `.tmp` file and renamed into place, so a failed render never
//! leaves a partial PNG at the requested path.

use std::ffi::OsString;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use super::dot::{to_dot, LayoutOptions};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::graph::ProcessGraph;

/// Default timeout for one Graphviz run
const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for `dot -V`
const CLI_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Characters of Graphviz stderr kept in the error
const STDERR_LIMIT: usize = 2000;

/// `<base>.png`, unless `base` already ends in `.png`
pub fn png_path(base: &Path) -> PathBuf {
    let is_png = base
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if is_png {
        base.to_path_buf()
    } else {
        let mut name: OsString = base.as_os_str().to_owned();
        name.push(".png");
        PathBuf::from(name)
    }
}

/// Reject graphs Graphviz would silently "fix" (it invents nodes for
/// unknown edge endpoints).
pub fn check_graph(graph: &ProcessGraph) -> Result<(), RenderError> {
    if let Some(id) = graph.duplicate_node_id() {
        return Err(RenderError::DuplicateNode { id: id.to_string() });
    }
    if let Some(dangling) = graph.dangling_edges().first() {
        return Err(RenderError::DanglingEdge {
            from: dangling.edge.from_id.clone(),
            to: dangling.edge.to_id.clone(),
            missing: dangling.missing.to_string(),
        });
    }
    Ok(())
}

/// Lays out and rasterizes process graphs with Graphviz
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    /// Layout program (`dot`)
    program: String,
    options: LayoutOptions,
    timeout: Duration,
}

impl GraphvizRenderer {
    pub fn new() -> Self {
        Self {
            program: "dot".to_string(),
            options: LayoutOptions::default(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    /// Set a custom program path
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_options(mut self, options: LayoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// DOT text this renderer would hand to Graphviz
    pub fn dot_source(&self, graph: &ProcessGraph) -> String {
        to_dot(graph, &self.options)
    }

    /// Check if the layout program is installed (with 5s timeout)
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .and_then(|mut child| match child.wait_timeout(CLI_CHECK_TIMEOUT)? {
                Some(status) => Ok(status.success()),
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    Ok(false)
                }
            })
            .unwrap_or(false)
    }

    /// Render `graph` to `<base>.png` and return that path
    ///
    /// Blocking. Overwrites an existing file. An empty graph is drawn as the
    /// fallback graph.
    pub fn render(&self, graph: &ProcessGraph, base: &Path) -> Result<PathBuf, RenderError> {
        let fallback;
        let graph = if graph.is_empty() {
            tracing::debug!("Empty graph, rendering fallback");
            fallback = ProcessGraph::fallback();
            &fallback
        } else {
            graph
        };

        check_graph(graph)?;

        let target = png_path(base);
        let mut tmp_name: OsString = target.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let source = self.dot_source(graph);

        tracing::debug!(
            program = %self.program,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            path = %target.display(),
            "Rendering flowchart"
        );

        if let Err(e) = self.run_graphviz(&source, &tmp) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        std::fs::rename(&tmp, &target).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            RenderError::Io {
                path: target.display().to_string(),
                source,
            }
        })?;

        tracing::info!(path = %target.display(), "Flowchart rendered");
        Ok(target)
    }

    fn run_graphviz(&self, source: &str, output: &Path) -> Result<(), RenderError> {
        let mut child = Command::new(&self.program)
            .arg("-Tpng")
            .arg("-o")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::LayoutEngineUnavailable {
                program: self.program.clone(),
                reason: if e.kind() == ErrorKind::NotFound {
                    "program not found".to_string()
                } else {
                    e.to_string()
                },
            })?;

        // Both pipes are pumped off-thread so a chatty or stalled child can
        // never block us past the timeout.
        let stdin = child.stdin.take();
        let source = source.to_owned();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A write failure means dot exited early; its status and
                // stderr carry the real cause.
                if let Err(e) = stdin.write_all(source.as_bytes()) {
                    tracing::debug!(error = %e, "Graphviz closed stdin early");
                }
            }
        });

        let stderr = child.stderr.take();
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf);
            }
            buf
        });

        let status = match child.wait_timeout(self.timeout) {
            Ok(status) => status,
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::Io {
                    path: output.display().to_string(),
                    source,
                });
            }
        };

        let Some(status) = status else {
            let _ = child.kill();
            let _ = child.wait(); // Reap the zombie
            return Err(RenderError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            });
        };

        let _ = writer.join();
        let stderr = reader.join().unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&stderr);
        Err(RenderError::LayoutEngineFailed {
            program: self.program.clone(),
            status: status.to_string(),
            stderr: stderr.trim().chars().take(STDERR_LIMIT).collect(),
        })
    }
}

impl Default for GraphvizRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&RenderConfig> for GraphvizRenderer {
    fn from(config: &RenderConfig) -> Self {
        Self::new()
            .with_program(config.dot_program.clone())
            .with_options(LayoutOptions {
                size_inches: config.size_inches,
                dpi: config.dpi,
            })
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }
}
