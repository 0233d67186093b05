//! pddgen CLI - process flowcharts and design-document drafts

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use pddgen::config::{PddConfig, ProviderKind};
use pddgen::error::{FixSuggestion, PddError, Result};
use pddgen::pipeline::{DocumentPipeline, FlowchartOutcome};
use pddgen::{GraphvizRenderer, Narrative, ProcessGraph};

#[derive(Parser)]
#[command(name = "pddgen")]
#[command(about = "Generate process flowcharts and design-document drafts from narrative text")]
#[command(version)]
struct Cli {
    /// Path to a pddgen.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the provider (groq, openai, mock, none)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Narrative file (.txt, .md or .docx)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Narrative text
    #[arg(short, long)]
    text: Option<String>,
}

impl InputArgs {
    fn load(&self) -> Result<Narrative> {
        match (&self.input, &self.text) {
            (Some(path), _) => Narrative::from_file(path),
            (None, Some(text)) => Narrative::from_text(text.clone()),
            (None, None) => Err(PddError::EmptyNarrative),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a flow graph (JSON) from a narrative
    Extract {
        #[command(flatten)]
        input: InputArgs,

        /// Write the graph to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the Graphviz DOT source for a graph file
    Dot {
        /// Graph JSON file
        graph: PathBuf,
    },

    /// Render a graph file to PNG
    Render {
        /// Graph JSON file
        graph: PathBuf,

        /// Output base path (".png" is appended)
        #[arg(short, long, default_value = "flowchart")]
        out: PathBuf,
    },

    /// Generate sections and flowchart for a document
    Generate {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory (overrides render.output_dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = PddConfig::load(cli.config.as_deref())?;
    if let Some(kind) = &cli.provider {
        config.provider.kind = ProviderKind::parse(kind)?;
        config = config.with_env();
    }

    match cli.command {
        Commands::Extract { input, out } => extract(&config, &input, out.as_deref()).await,
        Commands::Dot { graph } => dot(&config, &graph),
        Commands::Render { graph, out } => render(&config, &graph, &out),
        Commands::Generate { input, out_dir } => {
            if let Some(dir) = out_dir {
                config.render.output_dir = dir;
            }
            generate(&config, &input).await
        }
    }
}

fn read_graph(path: &Path) -> Result<ProcessGraph> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

async fn extract(config: &PddConfig, input: &InputArgs, out: Option<&Path>) -> Result<()> {
    let narrative = input.load()?;
    let pipeline = DocumentPipeline::from_config(config)?;

    let graph = pipeline.extract_graph(&narrative).await;
    let json = serde_json::to_string_pretty(&graph)?;

    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!(
                "{} Wrote {} nodes, {} edges to {}",
                "✓".green(),
                graph.nodes.len(),
                graph.edges.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    if graph.is_fallback() {
        eprintln!("{} Extraction fell back to the single-node graph", "!".yellow());
    }

    Ok(())
}

fn dot(config: &PddConfig, graph: &Path) -> Result<()> {
    let graph = read_graph(graph)?.or_fallback();
    print!("{}", GraphvizRenderer::from(&config.render).dot_source(&graph));
    Ok(())
}

fn render(config: &PddConfig, graph: &Path, out: &Path) -> Result<()> {
    let graph = read_graph(graph)?;
    let path = GraphvizRenderer::from(&config.render).render(&graph, out)?;
    println!("{}", path.display());
    Ok(())
}

async fn generate(config: &PddConfig, input: &InputArgs) -> Result<()> {
    let narrative = input.load()?;
    let pipeline = DocumentPipeline::from_config(config)?;

    println!(
        "{} Generating '{}' | provider: {}",
        "→".cyan(),
        narrative.title.cyan().bold(),
        config.provider.kind.as_str().cyan()
    );

    let draft = pipeline.run(&narrative).await?;

    for section in &draft.sections {
        println!("{}", section.section.heading().bold());
        println!("  {}", section.body);
    }

    match &draft.flowchart {
        FlowchartOutcome::Image { path } => {
            println!("{} Flowchart: {}", "✓".green(), path.display());
        }
        FlowchartOutcome::Placeholder { message } => {
            println!("{} {}", "!".yellow(), message);
        }
    }

    let manifest = draft.write_json(pipeline.output_dir())?;
    println!("{} Draft: {}", "✓".green(), manifest.display());

    Ok(())
}
