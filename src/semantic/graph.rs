//! Project-wide semantic graph.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::SemanticError;
use super::facts::{CallSite, DependencyInfo, FileAnalysis};
use super::symbol::{Symbol, SymbolId, SymbolKind};
use super::table::SymbolTable;

/// Aggregate counts over a [`SemanticGraph`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticStats {
    pub total_files: usize,
    pub total_symbols: usize,
    pub symbols_by_kind: BTreeMap<SymbolKind, usize>,
    pub total_call_sites: usize,
    pub resolved_calls: usize,
    pub unresolved_calls: usize,
    pub total_dependencies: usize,
    #[serde(default)]
    pub analysis_time_ms: u64,
}

impl SemanticStats {
    /// Share of call sites that were resolved, 0.0 when there are none.
    pub fn resolution_rate(&self) -> f64 {
        if self.total_call_sites == 0 {
            0.0
        } else {
            self.resolved_calls as f64 / self.total_call_sites as f64
        }
    }

    fn count_table(&mut self, table: &SymbolTable, add: bool) {
        for symbol in table.declarations() {
            let count = self.symbols_by_kind.entry(symbol.kind).or_insert(0);
            if add {
                *count += 1;
                self.total_symbols += 1;
            } else {
                *count = count.saturating_sub(1);
                self.total_symbols = self.total_symbols.saturating_sub(1);
            }
        }
        self.symbols_by_kind.retain(|_, count| *count > 0);
    }
}

/// Symbol tables, dependency graph and call graph of a whole project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticGraph {
    pub project_root: String,
    pub file_symbol_tables: BTreeMap<String, SymbolTable>,
    pub call_sites: Vec<CallSite>,
    pub dependencies: Vec<DependencyInfo>,
    /// File → files it imports (resolved, absolute).
    pub dependency_graph: BTreeMap<String, Vec<String>>,
    /// Caller → callees, derived from resolved call sites only.
    pub call_graph: BTreeMap<SymbolId, Vec<SymbolId>>,
    pub statistics: SemanticStats,
}

impl SemanticGraph {
    pub fn new(project_root: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Graph holding the Pass 1 output of every file, unresolved.
    pub fn from_analyses(
        project_root: impl Into<String>,
        analyses: impl IntoIterator<Item = FileAnalysis>,
    ) -> Self {
        let mut graph = Self::new(project_root);
        for analysis in analyses {
            graph.add_file_analysis(analysis);
        }
        graph
    }

    pub fn add_file_analysis(&mut self, analysis: FileAnalysis) {
        self.add_symbol_table(analysis.symbol_table);
        for dependency in analysis.dependencies {
            self.add_dependency(dependency);
        }
        for call in analysis.call_sites {
            self.add_call_site(call);
        }
    }

    /// Insert or replace the table of `table.file_path`.
    pub fn add_symbol_table(&mut self, table: SymbolTable) {
        self.statistics.count_table(&table, true);
        if let Some(previous) = self
            .file_symbol_tables
            .insert(table.file_path.clone(), table)
        {
            self.statistics.count_table(&previous, false);
        }
        self.statistics.total_files = self.file_symbol_tables.len();
    }

    pub fn add_dependency(&mut self, dependency: DependencyInfo) {
        self.dependencies.push(dependency);
        self.statistics.total_dependencies = self.dependencies.len();
    }

    pub fn add_call_site(&mut self, call: CallSite) {
        if call.is_resolved {
            self.statistics.resolved_calls += 1;
            push_unique(
                self.call_graph.entry(call.caller_id.clone()).or_default(),
                &call.callee_id,
            );
        } else {
            self.statistics.unresolved_calls += 1;
        }
        self.call_sites.push(call);
        self.statistics.total_call_sites = self.call_sites.len();
    }

    pub fn symbol_table(&self, file_path: &str) -> Option<&SymbolTable> {
        self.file_symbol_tables.get(file_path)
    }

    /// Every declaration called `name`, ordered by file path.
    pub fn find_symbol(&self, name: &str) -> Vec<&Symbol> {
        self.file_symbol_tables
            .values()
            .flat_map(|table| table.declarations())
            .filter(|symbol| symbol.name == name)
            .collect()
    }

    pub fn symbols_of_kind(&self, kind: SymbolKind) -> Vec<&Symbol> {
        self.file_symbol_tables
            .values()
            .flat_map(|table| table.symbols_of_kind(kind))
            .collect()
    }

    /// Symbols with a call edge to `id`.
    pub fn callers_of(&self, id: &SymbolId) -> Vec<&SymbolId> {
        self.call_graph
            .iter()
            .filter(|(_, callees)| callees.contains(id))
            .map(|(caller, _)| caller)
            .collect()
    }

    /// Symbols `id` calls, in first-resolved order.
    pub fn callees_of(&self, id: &SymbolId) -> &[SymbolId] {
        self.call_graph
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn unresolved_calls(&self) -> impl Iterator<Item = &CallSite> {
        self.call_sites.iter().filter(|call| !call.is_resolved)
    }

    /// Derive the call graph from resolved call sites.
    pub fn rebuild_call_graph(&mut self) {
        let mut call_graph: BTreeMap<SymbolId, Vec<SymbolId>> = BTreeMap::new();
        for call in self.call_sites.iter().filter(|c| c.is_resolved) {
            push_unique(
                call_graph.entry(call.caller_id.clone()).or_default(),
                &call.callee_id,
            );
        }
        self.call_graph = call_graph;
    }

    /// Recount every statistic from the graph contents.
    pub fn recompute_statistics(&mut self) {
        let mut stats = SemanticStats {
            total_files: self.file_symbol_tables.len(),
            total_call_sites: self.call_sites.len(),
            total_dependencies: self.dependencies.len(),
            analysis_time_ms: self.statistics.analysis_time_ms,
            ..SemanticStats::default()
        };
        for table in self.file_symbol_tables.values() {
            stats.count_table(table, true);
        }
        stats.resolved_calls = self.call_sites.iter().filter(|c| c.is_resolved).count();
        stats.unresolved_calls = stats.total_call_sites - stats.resolved_calls;
        self.statistics = stats;
    }

    pub fn to_json(&self) -> Result<String, SemanticError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SemanticError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_json_file(&self, path: &Path) -> Result<(), SemanticError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_json_file(path: &Path) -> Result<Self, SemanticError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn push_unique(callees: &mut Vec<SymbolId>, callee: &SymbolId) {
    if !callees.contains(callee) {
        callees.push(callee.clone());
    }
}
