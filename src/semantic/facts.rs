//! Per-file facts handed from extraction to resolution.

use serde::{Deserialize, Serialize};

use super::symbol::{FileLocation, SymbolId};
use super::table::SymbolTable;

/// Imported name standing for a module's default export
/// (`import Svc from './svc'` records `("default", "Svc")` as an alias).
pub const DEFAULT_EXPORT: &str = "default";

/// How an import was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import os`, `import x from './x'`
    #[default]
    Import,
    /// `from m import a, b`, `import { a } from './m'`
    FromImport,
    /// `from m import *`, `import * as m from './m'`
    WildcardImport,
    /// `from .m import a`
    RelativeImport,
    /// `require('./m')`
    Require,
    /// `export { a } from './m'`
    Reexport,
}

/// One import statement of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub source_file: String,
    /// Module as written (`..a`, `./user-service`, `os.path`).
    pub target_module: String,
    /// Names imported from the module. Empty means the whole module,
    /// `["*"]` a wildcard.
    #[serde(default)]
    pub imported_symbols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_alias: Option<String>,
    /// `original → alias` for renamed symbol imports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbol_aliases: Vec<(String, String)>,
    #[serde(default)]
    pub import_kind: ImportKind,
    #[serde(default)]
    pub is_relative: bool,
    pub location: FileLocation,
}

impl DependencyInfo {
    pub fn is_wildcard(&self) -> bool {
        self.imported_symbols.iter().any(|s| s == "*")
    }
}

/// A call expression observed during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Enclosing function or method, or the file's `<module>` id.
    pub caller_id: SymbolId,
    /// Callee as written; may be qualified (`service.findUser`).
    pub callee_name: String,
    /// Empty until resolved.
    #[serde(default)]
    pub callee_id: SymbolId,
    pub location: FileLocation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub is_resolved: bool,
}

impl CallSite {
    pub fn new(caller_id: SymbolId, callee_name: impl Into<String>, location: FileLocation) -> Self {
        Self {
            caller_id,
            callee_name: callee_name.into(),
            callee_id: SymbolId::default(),
            location,
            arguments: Vec::new(),
            is_resolved: false,
        }
    }

    pub fn resolve(&mut self, callee_id: SymbolId) {
        self.callee_id = callee_id;
        self.is_resolved = true;
    }

    pub fn reset(&mut self) {
        self.callee_id = SymbolId::default();
        self.is_resolved = false;
    }
}

/// Everything Pass 1 learned about one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_path: String,
    pub language: String,
    pub symbol_table: SymbolTable,
    pub dependencies: Vec<DependencyInfo>,
    pub call_sites: Vec<CallSite>,
    /// Whether tree-sitter reported syntax errors.
    #[serde(default)]
    pub has_parse_errors: bool,
}

impl FileAnalysis {
    pub fn new(file_path: impl Into<String>, language: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let language = language.into();
        Self {
            symbol_table: SymbolTable::new(file_path.clone(), language.clone()),
            file_path,
            language,
            dependencies: Vec::new(),
            call_sites: Vec::new(),
            has_parse_errors: false,
        }
    }

    /// Record an import, keeping the raw module string on the table too.
    pub fn add_dependency(&mut self, dependency: DependencyInfo) {
        self.symbol_table
            .add_dependency(dependency.target_module.clone());
        self.dependencies.push(dependency);
    }
}
