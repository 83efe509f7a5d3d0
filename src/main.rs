use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use blockplot::ast::ParseNode;
use blockplot::generator;
use blockplot::importer;
use blockplot::model::{BlockGraph, GraphDoc};
use blockplot::validate;

#[derive(Parser, Debug)]
#[command(author, version, about = "Block-graph editor core: generate, import and validate plotting scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate script text from a graph file (.json or binary .bpg)
    Generate {
        #[arg(value_name = "GRAPH_FILE")]
        graph: Utf8PathBuf,
    },
    /// Import a parse-forest JSON file into a block graph
    Import {
        #[arg(value_name = "FOREST_FILE")]
        forest: Utf8PathBuf,
        /// Print the generated script instead of the graph JSON
        #[arg(long)]
        code: bool,
    },
    /// Check a graph file's structural invariants
    Validate {
        #[arg(value_name = "GRAPH_FILE")]
        graph: Utf8PathBuf,
    },
}

fn main() -> Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate { graph } => {
            let graph = load_graph(&graph)?;
            print!("{}", generator::generate(&graph));
        }
        Command::Import { forest, code } => {
            let text = std::fs::read_to_string(&forest)
                .with_context(|| format!("Open {}", forest))?;
            let nodes: Vec<ParseNode> = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse forest {}", forest))?;
            let graph = importer::import(&nodes);
            if code {
                print!("{}", generator::generate(&graph));
            } else {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            }
        }
        Command::Validate { graph } => {
            let graph = load_graph(&graph)?;
            let issues = validate::validate(&graph);
            if issues.is_empty() {
                println!("ok: {} blocks, no issues", graph.blocks.len());
            } else {
                for issue in &issues {
                    println!("{}", issue);
                }
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

/// Load a graph from either the binary document format or plain JSON.
fn load_graph(path: &Utf8PathBuf) -> Result<BlockGraph> {
    if path.extension() == Some("bpg") {
        let doc = GraphDoc::load_from_binary(path.as_std_path())
            .with_context(|| format!("Failed to load {}", path))?;
        Ok(doc.graph)
    } else {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("Open {}", path))?;
        let graph: BlockGraph = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse graph {}", path))?;
        Ok(graph)
    }
}
