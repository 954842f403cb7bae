//! Per-file symbol table.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::symbol::{Symbol, SymbolId, SymbolKind, ID_SEPARATOR};

/// Types learned from assignments while extracting a file.
///
/// Keys are `scope::name` for locals and the bare name at module level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTracker {
    /// Variable → class it was constructed from (`x = Service()`).
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Variable → name of the callable whose result it holds (`x = make()`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub call_results: BTreeMap<String, String>,
}

impl TypeTracker {
    fn key(scope: &str, name: &str) -> String {
        if scope.is_empty() {
            name.to_string()
        } else {
            format!("{scope}{ID_SEPARATOR}{name}")
        }
    }

    pub fn record_type(&mut self, scope: &str, name: &str, type_name: &str) {
        self.variables
            .insert(Self::key(scope, name), type_name.to_string());
    }

    pub fn record_call_result(&mut self, scope: &str, name: &str, callee: &str) {
        self.call_results
            .insert(Self::key(scope, name), callee.to_string());
    }

    /// Recorded type of `name`, searching `scope` innermost first.
    pub fn type_of(&self, scope: Option<&str>, name: &str) -> Option<&str> {
        lookup_scoped(&self.variables, scope, name).map(String::as_str)
    }

    /// Callable whose result `name` holds, searching `scope` innermost first.
    pub fn call_result_of(&self, scope: Option<&str>, name: &str) -> Option<&str> {
        lookup_scoped(&self.call_results, scope, name).map(String::as_str)
    }
}

fn lookup_scoped<'m, V>(
    map: &'m BTreeMap<String, V>,
    scope: Option<&str>,
    name: &str,
) -> Option<&'m V> {
    for label in scope_chain(scope) {
        if let Some(value) = map.get(&format!("{label}{ID_SEPARATOR}{name}")) {
            return Some(value);
        }
    }
    map.get(name)
}

/// `A::b::c` → `["A::b::c", "A::b", "A"]`.
pub fn scope_chain(scope: Option<&str>) -> impl Iterator<Item = &str> {
    let mut next = scope.filter(|s| !s.is_empty());
    std::iter::from_fn(move || {
        let current = next?;
        next = current.rsplit_once(ID_SEPARATOR).map(|(parent, _)| parent);
        Some(current)
    })
}

/// All symbols declared in one file.
///
/// `symbols` is keyed by name with the last declaration winning. Members of
/// classes and namespaces are additionally kept per scope so that two classes
/// declaring the same method name do not shadow each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub file_path: String,
    pub language: String,
    #[serde(default)]
    pub symbols: BTreeMap<String, Symbol>,
    /// Classes, modules and namespaces by name.
    #[serde(default)]
    pub nested_scopes: BTreeMap<String, Symbol>,
    /// Scoped declarations: scope label → name → symbol.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub members: BTreeMap<String, BTreeMap<String, Symbol>>,
    /// Parameters and function locals: function scope label → name → symbol.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locals: BTreeMap<String, BTreeMap<String, Symbol>>,
    /// Raw import strings, in source order.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub exports: Vec<String>,
    /// Name of the declaration behind `export default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_export: Option<String>,
    #[serde(default)]
    pub type_tracker: TypeTracker,
}

impl SymbolTable {
    pub fn new(file_path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            language: language.into(),
            ..Self::default()
        }
    }

    /// Register a declaration. A later symbol with the same name replaces
    /// the earlier one in `symbols`.
    pub fn add_symbol(&mut self, symbol: Symbol) {
        if symbol.kind.opens_scope() {
            self.nested_scopes
                .insert(symbol.name.clone(), symbol.clone());
        }
        if !symbol.scope.is_empty() {
            self.members
                .entry(symbol.scope.clone())
                .or_default()
                .insert(symbol.name.clone(), symbol.clone());
        }
        self.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Register a scoped member without touching the name map. An existing
    /// member of the same scope and name is kept.
    pub fn add_member(&mut self, symbol: Symbol) {
        self.members
            .entry(symbol.scope.clone())
            .or_default()
            .entry(symbol.name.clone())
            .or_insert(symbol);
    }

    /// Register a parameter or local variable of the function whose scope
    /// label is `symbol.scope`.
    pub fn add_local(&mut self, symbol: Symbol) {
        self.locals
            .entry(symbol.scope.clone())
            .or_default()
            .insert(symbol.name.clone(), symbol);
    }

    pub fn add_dependency(&mut self, import: impl Into<String>) {
        self.dependencies.push(import.into());
    }

    pub fn add_export(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.exports.contains(&name) {
            self.exports.push(name);
        }
    }

    pub fn get_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Member `name` declared directly in `scope`.
    pub fn member(&self, scope: &str, name: &str) -> Option<&Symbol> {
        self.members.get(scope).and_then(|m| m.get(name))
    }

    /// Every declaration of the file: named symbols plus scoped members,
    /// each once, ordered by id.
    pub fn declarations(&self) -> Vec<&Symbol> {
        let mut seen = BTreeSet::new();
        let mut all: Vec<&Symbol> = self
            .symbols
            .values()
            .chain(self.members.values().flat_map(|m| m.values()))
            .filter(|s| seen.insert(&s.id))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Look a symbol up by id among declarations and locals.
    pub fn find_by_id(&self, id: &SymbolId) -> Option<&Symbol> {
        self.symbols
            .values()
            .chain(self.members.values().flat_map(|m| m.values()))
            .chain(self.locals.values().flat_map(|m| m.values()))
            .find(|s| &s.id == id)
    }

    /// Local or parameter visible from `scope`, innermost function first.
    pub fn local_symbol(&self, scope: Option<&str>, name: &str) -> Option<&Symbol> {
        scope_chain(scope).find_map(|label| self.locals.get(label).and_then(|m| m.get(name)))
    }

    /// A class, interface, enum or namespace declared in this file.
    pub fn type_symbol(&self, name: &str) -> Option<&Symbol> {
        self.nested_scopes
            .get(name)
            .or_else(|| self.symbols.get(name))
            .filter(|s| s.kind.is_container())
    }

    /// Module name derived from the file stem (`pkg/utils.py` → `utils`).
    pub fn module_name(&self) -> String {
        module_name_of(&self.file_path)
    }

    /// Pseudo-symbol standing for the whole file.
    pub fn module_symbol(&self) -> Symbol {
        Symbol::module(&self.file_path, &self.module_name(), &self.language)
    }

    pub fn symbols_of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &Symbol> {
        self.declarations().into_iter().filter(move |s| s.kind == kind)
    }
}

/// Last path component without extension. `index.d.ts` → `index`; a
/// package `pkg/__init__.py` is named after its directory.
pub fn module_name_of(file_path: &str) -> String {
    let path = Path::new(file_path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = match file_name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    };
    if stem == "__init__" {
        if let Some(package) = path.parent().and_then(Path::file_name) {
            return package.to_string_lossy().to_string();
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::symbol::FileLocation;

    fn loc(file: &str, line: usize) -> FileLocation {
        FileLocation {
            file_path: file.to_string(),
            start_line: line,
            end_line: line,
            start_col: 0,
            end_col: 10,
        }
    }

    #[test]
    fn test_last_declaration_wins() {
        let mut table = SymbolTable::new("/p/a.py", "python");
        table.add_symbol(Symbol::new("run", SymbolKind::Function, "", loc("/p/a.py", 1), "python"));
        table.add_symbol(Symbol::new("run", SymbolKind::Function, "", loc("/p/a.py", 9), "python"));

        assert_eq!(table.symbols.len(), 1);
        assert_eq!(table.get_symbol("run").unwrap().location.start_line, 9);
    }

    #[test]
    fn test_scoped_members_survive_name_collisions() {
        let mut table = SymbolTable::new("/p/a.py", "python");
        table.add_symbol(Symbol::new("A", SymbolKind::Class, "", loc("/p/a.py", 1), "python"));
        table.add_symbol(Symbol::new("save", SymbolKind::Method, "A", loc("/p/a.py", 2), "python"));
        table.add_symbol(Symbol::new("B", SymbolKind::Class, "", loc("/p/a.py", 5), "python"));
        table.add_symbol(Symbol::new("save", SymbolKind::Method, "B", loc("/p/a.py", 6), "python"));

        assert_eq!(table.get_symbol("save").unwrap().scope, "B");
        assert_eq!(table.member("A", "save").unwrap().id.as_str(), "/p/a.py::A::save");
        assert!(table.nested_scopes.contains_key("A"));
        assert_eq!(table.declarations().len(), 4);
    }

    #[test]
    fn test_local_lookup_walks_outward() {
        let mut table = SymbolTable::new("/p/a.py", "python");
        table.add_local(Symbol::new("x", SymbolKind::Parameter, "outer", loc("/p/a.py", 1), "python"));
        table.add_local(Symbol::new("y", SymbolKind::Variable, "outer::inner", loc("/p/a.py", 3), "python"));

        assert!(table.local_symbol(Some("outer::inner"), "x").is_some());
        assert!(table.local_symbol(Some("outer::inner"), "y").is_some());
        assert!(table.local_symbol(Some("outer"), "y").is_none());
        assert!(table.local_symbol(None, "x").is_none());
    }

    #[test]
    fn test_type_tracker_scoping() {
        let mut tracker = TypeTracker::default();
        tracker.record_type("", "svc", "Service");
        tracker.record_type("main", "svc", "Other");

        assert_eq!(tracker.type_of(Some("main"), "svc"), Some("Other"));
        assert_eq!(tracker.type_of(Some("helper"), "svc"), Some("Service"));
        assert_eq!(tracker.type_of(None, "missing"), None);
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name_of("/p/pkg/utils.py"), "utils");
        assert_eq!(module_name_of("/p/types/index.d.ts"), "index");
        assert_eq!(module_name_of("/p/Makefile"), "Makefile");
        assert_eq!(module_name_of("/p/pkg/__init__.py"), "pkg");
    }

    #[test]
    fn test_scope_chain() {
        let chain: Vec<_> = scope_chain(Some("a::b::c")).collect();
        assert_eq!(chain, vec!["a::b::c", "a::b", "a"]);
        assert_eq!(scope_chain(Some("")).count(), 0);
    }
}
