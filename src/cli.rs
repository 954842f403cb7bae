//! Command-line interface for semgraph.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::extract::registered_languages;
use crate::pipeline::Pipeline;
use crate::report;
use crate::semantic::{SemanticGraph, SymbolId};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 2;

/// Whole-project semantic linking for Python and TypeScript.
///
/// semgraph extracts the symbols, imports and calls of every source file,
/// then resolves each call to the declaration it invokes, producing a
/// dependency graph and a call graph.
#[derive(Parser)]
#[command(name = "semgraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a project and resolve its call graph
    Analyze(AnalyzeArgs),
    /// Find declarations by name in a saved graph
    Find(FindArgs),
    /// List the callers of a symbol in a saved graph
    Callers(EdgeArgs),
    /// List the callees of a symbol in a saved graph
    Callees(EdgeArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover in PATH)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Write the JSON graph to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of worker threads (default: one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// List unresolved call sites in pretty output
    #[arg(long)]
    pub show_unresolved: bool,
}

/// Arguments for the find command.
#[derive(Parser)]
pub struct FindArgs {
    /// Symbol name
    pub name: String,

    /// Graph JSON written by `semgraph analyze --output`
    #[arg(short, long)]
    pub graph: PathBuf,
}

/// Arguments for the callers and callees commands.
#[derive(Parser)]
pub struct EdgeArgs {
    /// Full symbol id (`/path/file.py::Class::method`)
    pub id: String,

    /// Graph JSON written by `semgraph analyze --output`
    #[arg(short, long)]
    pub graph: PathBuf,
}

fn load_config(args: &AnalyzeArgs) -> anyhow::Result<(Config, Option<PathBuf>)> {
    if let Some(path) = &args.config {
        let config = Config::parse_file(path)?;
        return Ok((config, Some(path.clone())));
    }
    let search_root = if args.path.is_file() {
        args.path.parent().unwrap_or(Path::new("."))
    } else {
        args.path.as_path()
    };
    Config::discover(search_root)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    if args.jobs == Some(0) {
        eprintln!("Error: --jobs must be at least 1");
        return Ok(EXIT_ERROR);
    }

    if !args.path.exists() {
        eprintln!("Error: cannot access path {:?}", args.path);
        return Ok(EXIT_ERROR);
    }

    let (config, config_path) = match load_config(args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error parsing config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if let Err(e) = config::validate(&config, &registered_languages()) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    let output = Pipeline::new(&args.path, config)?.jobs(args.jobs).run()?;

    if output.files_discovered == 0 {
        eprintln!("Warning: no source files found");
    }

    match args.format.as_str() {
        "json" => report::write_json(&output.graph, args.output.as_deref())?,
        _ => {
            let path_str = args.path.to_string_lossy().to_string();
            let config_str = config_path.map(|p| p.to_string_lossy().to_string());
            report::write_pretty(&path_str, config_str.as_deref(), &output, args.show_unresolved);
            if let Some(out) = &args.output {
                report::write_json(&output.graph, Some(out))?;
                println!("  Graph written to {}", out.display());
            }
        }
    }

    Ok(EXIT_SUCCESS)
}

fn load_graph(path: &Path) -> anyhow::Result<SemanticGraph> {
    SemanticGraph::read_json_file(path)
        .map_err(|e| anyhow::anyhow!("failed to load graph {}: {}", path.display(), e))
}

/// Run the find command.
pub fn run_find(args: &FindArgs) -> anyhow::Result<i32> {
    let graph = load_graph(&args.graph)?;
    let symbols = graph.find_symbol(&args.name);
    report::write_symbols(&args.name, &symbols);
    Ok(EXIT_SUCCESS)
}

/// Run the callers command.
pub fn run_callers(args: &EdgeArgs) -> anyhow::Result<i32> {
    let graph = load_graph(&args.graph)?;
    let id = SymbolId::from(args.id.as_str());
    let callers = graph.callers_of(&id);
    report::write_edges("Callers of", &args.id, &callers);
    Ok(EXIT_SUCCESS)
}

/// Run the callees command.
pub fn run_callees(args: &EdgeArgs) -> anyhow::Result<i32> {
    let graph = load_graph(&args.graph)?;
    let id = SymbolId::from(args.id.as_str());
    let callees: Vec<&SymbolId> = graph.callees_of(&id).iter().collect();
    report::write_edges("Callees of", &args.id, &callees);
    Ok(EXIT_SUCCESS)
}
