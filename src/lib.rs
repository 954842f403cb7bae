//! semgraph - whole-project semantic linking.
//!
//! semgraph turns a source tree into a semantic graph: every declared
//! symbol, every import resolved to a file, and every call expression
//! resolved to the declaration it invokes.
//!
//! # Architecture
//!
//! Analysis runs in two passes:
//!
//! - `extract`: Pass 1 tree-sitter front ends producing one `FileAnalysis`
//!   per file (symbol table, imports, call sites)
//! - `semantic`: Pass 2 resolution (language strategies, resolver, graph)
//! - `pipeline`: discovery, parallel Pass 1, then Pass 2
//! - `config`: YAML project configuration
//! - `report`: Output formatting (text, JSON)
//!
//! # Adding a New Language
//!
//! Implement `FileExtractor` under `src/extract/` and `LanguageStrategy`
//! under `src/semantic/languages/`, then register both.

pub mod cli;
pub mod config;
pub mod extract;
pub mod pipeline;
pub mod report;
pub mod semantic;

pub use config::Config;
pub use extract::{get_extractor, FileExtractor, ParsedFile, PythonExtractor, TypeScriptExtractor};
pub use pipeline::{Pipeline, PipelineOutput};
pub use semantic::{
    CallSite, DependencyInfo, FileAnalysis, LanguageStrategy, Resolver, SemanticGraph,
    SemanticStats, StrategyRegistry, Symbol, SymbolId, SymbolKind, SymbolTable,
};
