//! Pass 1: per-file symbol, import and call extraction.
//!
//! Each front end parses one file with tree-sitter and produces a
//! [`FileAnalysis`] holding its symbol table, imports and call sites.
//! Scope labels come from the language's [`LanguageStrategy`], so the ids
//! minted here line up with the ones the resolver computes.
//!
//! # Adding a New Language
//!
//! 1. Add a module here implementing [`FileExtractor`]
//! 2. Add a matching strategy under `semantic::languages`
//! 3. Register both (`get_extractor`, `StrategyRegistry::with_defaults`)
//!
//! [`LanguageStrategy`]: crate::semantic::LanguageStrategy

mod python;
mod typescript;

pub use python::PythonExtractor;
pub use typescript::TypeScriptExtractor;

use std::path::Path;

use once_cell::sync::OnceCell;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::semantic::{CallSite, DependencyInfo, FileAnalysis, Symbol, TypeTracker};

/// Holds a parsed tree-sitter tree and associated metadata.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path symbols are keyed by.
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Text of the named field of `node`, if present.
    pub fn field_text(&self, node: Node, field: &str) -> Option<&str> {
        node.child_by_field_name(field).map(|n| self.node_text(n))
    }
}

/// Language-specific Pass 1 front end.
///
/// # Thread Safety
///
/// `tree_sitter::Parser` is not `Sync`, so implementations create a parser
/// per call.
pub trait FileExtractor: Send + Sync {
    /// Language tag written into the analysis (`python`, `typescript`).
    fn language_id(&self) -> &'static str;

    /// File extensions this extractor handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors still produce a tree with ERROR nodes.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile>;

    /// Extract symbols, imports and call sites.
    fn extract(&self, parsed: &ParsedFile) -> anyhow::Result<FileAnalysis>;
}

static PYTHON_EXTRACTOR: OnceCell<PythonExtractor> = OnceCell::new();
static TYPESCRIPT_EXTRACTOR: OnceCell<TypeScriptExtractor> = OnceCell::new();
static TSX_EXTRACTOR: OnceCell<TypeScriptExtractor> = OnceCell::new();
static JAVASCRIPT_EXTRACTOR: OnceCell<TypeScriptExtractor> = OnceCell::new();

/// Get an extractor for the given file extension.
pub fn get_extractor(ext: &str) -> Option<&'static dyn FileExtractor> {
    match ext {
        "py" => Some(PYTHON_EXTRACTOR.get_or_init(PythonExtractor::new) as &'static dyn FileExtractor),
        "ts" | "mts" | "cts" => Some(
            TYPESCRIPT_EXTRACTOR.get_or_init(TypeScriptExtractor::typescript)
                as &'static dyn FileExtractor,
        ),
        "tsx" => Some(TSX_EXTRACTOR.get_or_init(TypeScriptExtractor::tsx) as &'static dyn FileExtractor),
        "js" | "jsx" | "mjs" | "cjs" => Some(
            JAVASCRIPT_EXTRACTOR.get_or_init(TypeScriptExtractor::javascript)
                as &'static dyn FileExtractor,
        ),
        _ => None,
    }
}

/// All language tags with a front end.
pub fn registered_languages() -> Vec<&'static str> {
    vec!["javascript", "python", "typescript"]
}

/// Facts gathered while walking one file, before they are ordered into a
/// [`FileAnalysis`].
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub symbols: Vec<Symbol>,
    /// Members inferred from assignments (`self.repo = ...`); never replace
    /// a declared member.
    pub inferred_members: Vec<Symbol>,
    pub locals: Vec<Symbol>,
    pub dependencies: Vec<DependencyInfo>,
    pub calls: Vec<CallSite>,
    pub type_tracker: TypeTracker,
    pub default_export: Option<String>,
}

impl Collected {
    /// Add declarations in source order so the last one wins.
    pub fn into_analysis(mut self, parsed: &ParsedFile, language: &str) -> FileAnalysis {
        let mut analysis = FileAnalysis::new(&parsed.path, language);
        analysis.has_parse_errors = parsed.tree.root_node().has_error();

        self.symbols
            .sort_by_key(|s| (s.location.start_line, s.location.start_col));
        let table = &mut analysis.symbol_table;
        for symbol in self.symbols {
            if symbol.is_exported {
                table.add_export(symbol.name.clone());
            }
            table.add_symbol(symbol);
        }
        for member in self.inferred_members {
            table.add_member(member);
        }
        for local in self.locals {
            table.add_local(local);
        }
        table.type_tracker = self.type_tracker;
        if let Some(name) = self.default_export {
            table.add_export(name.clone());
            table.default_export = Some(name);
        }

        for dependency in self.dependencies {
            analysis.add_dependency(dependency);
        }
        analysis.call_sites = self.calls;
        analysis
    }
}

/// Visit every node of the tree in document order.
pub(crate) fn for_each_node<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Collapse whitespace in a piece of source text.
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run `query` over `node` and count every capture.
pub(crate) fn count_captures(query: &Query, node: Node, source: &[u8]) -> u32 {
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, node, source);
    let mut count = 0;
    while let Some(m) = matches.next() {
        count += m.captures.len() as u32;
    }
    count
}

/// Nearest ancestor of `node` whose kind is one of `kinds`.
pub(crate) fn nearest_ancestor<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if kinds.contains(&ancestor.kind()) {
            return Some(ancestor);
        }
        current = ancestor.parent();
    }
    None
}

/// Source text of the argument nodes of a call, shortened for display.
pub(crate) fn argument_texts(parsed: &ParsedFile, arguments: Option<Node>) -> Vec<String> {
    const MAX_ARGUMENT_LEN: usize = 80;
    let Some(arguments) = arguments else {
        return Vec::new();
    };
    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .map(|n| {
            let text = parsed.node_text(n);
            if text.chars().count() > MAX_ARGUMENT_LEN {
                let short: String = text.chars().take(MAX_ARGUMENT_LEN).collect();
                format!("{short}...")
            } else {
                text.to_string()
            }
        })
        .collect()
}

/// `FOO_BAR` style names.
pub(crate) fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Names starting with an uppercase letter are treated as class names.
pub(crate) fn looks_like_type(name: &str) -> bool {
    name.rsplit('.')
        .next()
        .and_then(|last| last.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}
