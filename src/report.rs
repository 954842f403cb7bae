//! Output formatting for semgraph results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal summary for human readability
//! - JSON: the full semantic graph for programmatic consumption

use colored::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::pipeline::PipelineOutput;
use crate::semantic::{CallSite, SemanticGraph, SemanticStats, Symbol, SymbolId};

/// At most this many unresolved calls are listed per file.
const MAX_UNRESOLVED_PER_FILE: usize = 20;

// =============================================================================
// JSON Format
// =============================================================================

/// Write the graph as pretty JSON to `output`, or stdout when `None`.
pub fn write_json(graph: &SemanticGraph, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            graph.write_json_file(path)?;
        }
        None => println!("{}", graph.to_json()?),
    }
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write a colored analysis summary.
pub fn write_pretty(path: &str, config_path: Option<&str>, output: &PipelineOutput, show_unresolved: bool) {
    let graph = &output.graph;

    // Header
    println!();
    print!("  ");
    print!("{}", "semgraph".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Analyzing: ".dimmed());
    println!("{}", path);
    print!("  {}", "Root:      ".dimmed());
    println!("{}", graph.project_root);
    if let Some(config_path) = config_path {
        print!("  {}", "Config:    ".dimmed());
        println!("{}", config_path);
    }
    println!();

    write_stats(&graph.statistics);
    println!();

    if !output.summary.by_tactic.is_empty() {
        write_tactics(&output.summary.by_tactic);
        println!();
    }

    if !output.failed_files.is_empty() {
        println!(
            "  {} ({}):",
            "Skipped files".yellow().bold(),
            output.failed_files.len()
        );
        for file in &output.failed_files {
            println!("    {}", file.display().to_string().dimmed());
        }
        println!();
    }

    let unresolved: Vec<&CallSite> = graph.unresolved_calls().collect();
    if show_unresolved && !unresolved.is_empty() {
        write_unresolved(&unresolved);
        println!();
    }

    if output.summary.cancelled {
        println!("  {}", "Resolution was cancelled".yellow());
        println!();
    }
}

fn write_stats(stats: &SemanticStats) {
    println!("  {}", "Summary".bold());
    println!("    {:<18}{}", "Files", stats.total_files);
    println!("    {:<18}{}", "Symbols", stats.total_symbols);
    println!("    {:<18}{}", "Dependencies", stats.total_dependencies);
    println!("    {:<18}{}", "Call sites", stats.total_call_sites);
    print!("    {:<18}", "Resolved");
    print!("{}", stats.resolved_calls.to_string().green());
    print!("  ");
    write_colored_rate(stats.resolution_rate());
    println!();
    print!("    {:<18}", "Unresolved");
    if stats.unresolved_calls == 0 {
        println!("{}", "0".green());
    } else {
        println!("{}", stats.unresolved_calls.to_string().yellow());
    }
    println!("    {:<18}{} ms", "Time", stats.analysis_time_ms);

    if !stats.symbols_by_kind.is_empty() {
        println!();
        println!("  {}", "Symbols by kind".bold());
        for (kind, count) in &stats.symbols_by_kind {
            println!("    {:<18}{}", kind.as_str().dimmed(), count);
        }
    }
}

fn write_colored_rate(rate: f64) {
    let text = format!("({:.1}%)", rate * 100.0);
    match rate {
        r if r >= 0.8 => print!("{}", text.green().bold()),
        r if r >= 0.5 => print!("{}", text.yellow()),
        _ => print!("{}", text.red()),
    }
}

fn write_tactics(by_tactic: &BTreeMap<String, usize>) {
    println!("  {}", "Resolved by".bold());
    for (tactic, count) in by_tactic {
        println!("    {:<18}{}", tactic.dimmed(), count);
    }
}

fn write_unresolved(calls: &[&CallSite]) {
    println!("  {} ({}):", "Unresolved calls".bold(), calls.len());
    println!();

    let mut by_file: BTreeMap<&str, Vec<&CallSite>> = BTreeMap::new();
    for call in calls {
        by_file
            .entry(call.location.file_path.as_str())
            .or_default()
            .push(call);
    }

    for (file, calls) in by_file {
        println!("    {}", file.blue());
        for call in calls.iter().take(MAX_UNRESOLVED_PER_FILE) {
            print!("      {}", format!("{:>5}", call.location.start_line).dimmed());
            println!("  {}", call.callee_name);
        }
        if calls.len() > MAX_UNRESOLVED_PER_FILE {
            println!(
                "      {}",
                format!("... and {} more", calls.len() - MAX_UNRESOLVED_PER_FILE).dimmed()
            );
        }
    }
}

// =============================================================================
// Query Output
// =============================================================================

/// List symbols found by name.
pub fn write_symbols(name: &str, symbols: &[&Symbol]) {
    if symbols.is_empty() {
        println!("  No symbol named {}", name.bold());
        return;
    }
    println!("  {} ({}):", name.bold(), symbols.len());
    for symbol in symbols {
        print!("    {:<10}", symbol.kind.as_str().dimmed());
        print!("{}", symbol.id.as_str().blue());
        println!("{}", format!(":{}", symbol.location.start_line).dimmed());
        if !symbol.signature.is_empty() {
            println!("              {}", symbol.signature);
        }
    }
}

/// List caller or callee ids of `id`.
pub fn write_edges(title: &str, id: &str, ids: &[&SymbolId]) {
    println!("  {} {}:", title.bold(), id.blue());
    if ids.is_empty() {
        println!("    {}", "(none)".dimmed());
        return;
    }
    for edge in ids {
        if edge.is_builtin() {
            println!("    {}", edge.as_str().dimmed());
        } else {
            println!("    {}", edge);
        }
    }
}
