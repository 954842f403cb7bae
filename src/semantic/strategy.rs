//! Language strategy trait and the context it resolves against.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tree_sitter::Node;

use super::error::ResolveError;
use super::languages::{PythonStrategy, TypeScriptStrategy};
use super::symbol::{base_type_name, Symbol, SymbolId, ID_SEPARATOR};
use super::table::SymbolTable;

/// Base classes are followed at most this deep.
const MAX_INHERITANCE_DEPTH: usize = 8;

/// Per-language resolution policy.
///
/// Implementations are shared across resolver threads and must not hold
/// mutable state.
pub trait LanguageStrategy: Send + Sync {
    /// Language tag this strategy serves (`python`, `typescript`).
    fn language_id(&self) -> &'static str;

    /// Map an import string to the absolute, normalized path of a project file.
    fn resolve_import(
        &self,
        import_path: &str,
        current_file: &Path,
        project_root: &Path,
    ) -> Result<PathBuf, ResolveError>;

    /// Find `member` inside `container` using the declarations of `table`.
    fn resolve_member_access(
        &self,
        container: &Symbol,
        member: &str,
        table: &SymbolTable,
    ) -> Result<SymbolId, ResolveError>;

    /// Scope label (`Class::method`) enclosing `node`, empty at module level.
    fn determine_scope(&self, node: Node, source: &[u8]) -> String;

    /// Best-effort type of the symbol called `symbol_name` in `ctx`.
    fn infer_type(
        &self,
        symbol_name: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolveError>;

    /// Builtin names mapped to what they are (`function`, `type`, `object`).
    fn builtin_types(&self) -> &'static BTreeMap<&'static str, &'static str>;

    fn is_builtin_symbol(&self, name: &str) -> bool {
        self.builtin_types().contains_key(name)
    }

    fn builtin_symbol_id(&self, name: &str) -> Option<SymbolId> {
        self.is_builtin_symbol(name)
            .then(|| SymbolId::builtin(name))
    }
}

/// Strategies keyed by language tag.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn LanguageStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Python, TypeScript and JavaScript.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("python", Arc::new(PythonStrategy::new()));
        registry.register("typescript", Arc::new(TypeScriptStrategy::typescript()));
        registry.register("javascript", Arc::new(TypeScriptStrategy::javascript()));
        registry
    }

    /// Register `strategy` for `language`, replacing any previous one.
    pub fn register(&mut self, language: impl Into<String>, strategy: Arc<dyn LanguageStrategy>) {
        self.strategies.insert(language.into(), strategy);
    }

    pub fn get(&self, language: &str) -> Option<&Arc<dyn LanguageStrategy>> {
        self.strategies.get(language)
    }

    /// Keep only the listed languages.
    pub fn retain(&mut self, languages: &[String]) {
        self.strategies.retain(|tag, _| languages.contains(tag));
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("languages", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A symbol imported under another name (`from m import f as g`).
#[derive(Debug, Clone, Copy)]
pub struct AliasedSymbol<'a> {
    pub table: &'a SymbolTable,
    pub original: &'a str,
}

/// Tables reachable from one file through its imports.
#[derive(Debug, Default)]
pub struct ImportScope<'a> {
    /// Module key (file stem or import alias) → table.
    pub modules: BTreeMap<String, &'a SymbolTable>,
    /// Local alias → imported symbol.
    pub aliased_symbols: BTreeMap<String, AliasedSymbol<'a>>,
}

/// Everything a tactic may consult while resolving calls of one file.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub current_file: &'a str,
    /// Scope label of the calling function (`Class::method`).
    pub local_scope: Option<&'a str>,
    pub file_symbols: &'a SymbolTable,
    pub imported_symbols: &'a BTreeMap<String, &'a SymbolTable>,
    pub aliased_symbols: &'a BTreeMap<String, AliasedSymbol<'a>>,
    pub dependency_graph: &'a BTreeMap<String, Vec<String>>,
    pub all_symbol_tables: &'a BTreeMap<String, SymbolTable>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        file_symbols: &'a SymbolTable,
        imports: &'a ImportScope<'a>,
        dependency_graph: &'a BTreeMap<String, Vec<String>>,
        all_symbol_tables: &'a BTreeMap<String, SymbolTable>,
    ) -> Self {
        Self {
            current_file: &file_symbols.file_path,
            local_scope: None,
            file_symbols,
            imported_symbols: &imports.modules,
            aliased_symbols: &imports.aliased_symbols,
            dependency_graph,
            all_symbol_tables,
        }
    }

    /// The same context seen from inside the function labelled `scope`.
    pub fn within(self, scope: Option<&'a str>) -> Self {
        Self {
            local_scope: scope,
            ..self
        }
    }

    pub fn local_symbol(&self, name: &str) -> Option<&'a Symbol> {
        self.file_symbols.local_symbol(self.local_scope, name)
    }

    /// A symbol exported by one of the imported files, or imported under
    /// an alias.
    pub fn imported_symbol(&self, name: &str) -> Option<&'a Symbol> {
        self.imported_symbols
            .values()
            .find_map(|table| table.get_symbol(name))
            .or_else(|| {
                self.aliased_symbols
                    .get(name)
                    .and_then(|a| a.table.get_symbol(a.original))
            })
    }

    pub fn imported_module(&self, name: &str) -> Option<&'a SymbolTable> {
        self.imported_symbols.get(name).copied()
    }

    /// Local, then file-level, then imported symbol called `name`.
    pub fn visible_symbol(&self, name: &str) -> Option<&'a Symbol> {
        self.local_symbol(name)
            .or_else(|| self.file_symbols.get_symbol(name))
            .or_else(|| self.imported_symbol(name))
    }

    /// Declared or tracked type of the variable `name`.
    pub fn variable_type(&self, name: &str) -> Option<&'a str> {
        if let Some(local) = self.local_symbol(name) {
            if let Some(declared) = local.declared_type() {
                return Some(declared);
            }
        }
        if let Some(tracked) = self
            .file_symbols
            .type_tracker
            .type_of(self.local_scope, name)
        {
            return Some(tracked);
        }
        self.file_symbols
            .get_symbol(name)
            .and_then(Symbol::declared_type)
    }

    /// Return type of the callable whose result was assigned to `name`.
    pub fn call_result_type(&self, name: &str) -> Option<&'a str> {
        let callee = self
            .file_symbols
            .type_tracker
            .call_result_of(self.local_scope, name)?;
        let callable = match callee.split_once('.') {
            Some((container, member)) => {
                let owner = self.find_type_symbol(container)?;
                self.table_of(owner)?.member(&owner.member_scope(), member)?
            }
            None => self.visible_symbol(callee)?,
        };
        callable
            .metadata
            .return_type
            .as_deref()
            .filter(|t| !t.is_empty())
    }

    /// A class, interface, enum or namespace named like `type_name`,
    /// searched in this file, its imports, then the whole project.
    pub fn find_type_symbol(&self, type_name: &str) -> Option<&'a Symbol> {
        let name = base_type_name(type_name);
        if name.is_empty() {
            return None;
        }
        self.file_symbols
            .type_symbol(name)
            .or_else(|| {
                self.imported_symbols
                    .values()
                    .find_map(|table| table.type_symbol(name))
            })
            .or_else(|| {
                self.aliased_symbols
                    .get(name)
                    .and_then(|a| a.table.type_symbol(a.original))
            })
            .or_else(|| {
                self.all_symbol_tables
                    .values()
                    .find_map(|table| table.type_symbol(name))
            })
    }

    /// The table that declares `symbol`.
    pub fn table_of(&self, symbol: &Symbol) -> Option<&'a SymbolTable> {
        self.all_symbol_tables.get(&symbol.location.file_path)
    }
}

/// Build a scope label from the names of the scope-opening ancestors of
/// `node`, outermost first.
pub fn scope_label<F>(node: Node, source: &[u8], scope_name: F) -> String
where
    F: Fn(Node, &[u8]) -> Option<String>,
{
    let mut parts = Vec::new();
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(name) = scope_name(ancestor, source) {
            parts.push(name);
        }
        current = ancestor.parent();
    }
    parts.reverse();
    parts.join(ID_SEPARATOR)
}

/// Member `member` of `container` in `table`, following base classes
/// declared in the same table.
pub fn find_member(table: &SymbolTable, container: &Symbol, member: &str) -> Option<SymbolId> {
    let mut visited = BTreeSet::new();
    find_member_inner(table, container, member, &mut visited, 0)
}

fn find_member_inner(
    table: &SymbolTable,
    container: &Symbol,
    member: &str,
    visited: &mut BTreeSet<SymbolId>,
    depth: usize,
) -> Option<SymbolId> {
    if depth > MAX_INHERITANCE_DEPTH || !visited.insert(container.id.clone()) {
        return None;
    }
    let scope = container.member_scope();
    if let Some(found) = table.member(&scope, member) {
        return Some(found.id.clone());
    }
    container
        .metadata
        .extends
        .iter()
        .chain(container.metadata.implements.iter())
        .filter_map(|base| table.type_symbol(base_type_name(base)))
        .find_map(|base| find_member_inner(table, base, member, visited, depth + 1))
}

/// Module-level symbol `member` of `table`.
pub fn find_module_member(table: &SymbolTable, member: &str) -> Option<SymbolId> {
    table
        .get_symbol(member)
        .filter(|s| s.scope.is_empty())
        .map(|s| s.id.clone())
}

/// Remove `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// First candidate that is an existing file, normalized.
pub fn first_existing(import: &str, candidates: &[PathBuf]) -> Result<PathBuf, ResolveError> {
    candidates
        .iter()
        .map(|c| normalize_path(c))
        .find(|c| c.is_file())
        .ok_or_else(|| ResolveError::ImportNotFound {
            import: import.to_string(),
            tried: candidates
                .iter()
                .map(|c| normalize_path(c).display().to_string())
                .collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::symbol::{FileLocation, SymbolKind};

    fn loc(file: &str) -> FileLocation {
        FileLocation {
            file_path: file.to_string(),
            ..FileLocation::default()
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/p/pkg/sub/../a.py")),
            PathBuf::from("/p/pkg/a.py")
        );
        assert_eq!(normalize_path(Path::new("/p/./x/./y.ts")), PathBuf::from("/p/x/y.ts"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn test_registry_defaults() {
        let registry = StrategyRegistry::with_defaults();
        let languages: Vec<_> = registry.languages().collect();
        assert_eq!(languages, vec!["javascript", "python", "typescript"]);
        assert_eq!(registry.get("python").unwrap().language_id(), "python");
        assert!(registry.get("cobol").is_none());
    }

    #[test]
    fn test_find_member_follows_bases() {
        let file = "/p/models.py";
        let mut table = SymbolTable::new(file, "python");
        table.add_symbol(Symbol::new("Base", SymbolKind::Class, "", loc(file), "python"));
        table.add_symbol(Symbol::new("save", SymbolKind::Method, "Base", loc(file), "python"));
        let mut child = Symbol::new("Child", SymbolKind::Class, "", loc(file), "python");
        child.metadata.extends.push("Base".to_string());
        table.add_symbol(child.clone());

        assert_eq!(
            find_member(&table, &child, "save").unwrap().as_str(),
            "/p/models.py::Base::save"
        );
        assert!(find_member(&table, &child, "load").is_none());
    }

    #[test]
    fn test_find_member_survives_cycles() {
        let file = "/p/cycle.py";
        let mut table = SymbolTable::new(file, "python");
        let mut a = Symbol::new("A", SymbolKind::Class, "", loc(file), "python");
        a.metadata.extends.push("B".to_string());
        let mut b = Symbol::new("B", SymbolKind::Class, "", loc(file), "python");
        b.metadata.extends.push("A".to_string());
        table.add_symbol(a.clone());
        table.add_symbol(b);

        assert!(find_member(&table, &a, "missing").is_none());
    }

    #[test]
    fn test_context_variable_type() {
        let file = "/p/main.py";
        let mut table = SymbolTable::new(file, "python");
        table.type_tracker.record_type("", "svc", "Service");
        let mut param = Symbol::new("repo", SymbolKind::Parameter, "run", loc(file), "python");
        param.metadata.type_annotation = Some("Repository".to_string());
        table.add_local(param);

        let imports = ImportScope::default();
        let graph = BTreeMap::new();
        let tables = BTreeMap::new();
        let ctx = ResolutionContext::new(&table, &imports, &graph, &tables).within(Some("run"));

        assert_eq!(ctx.variable_type("repo"), Some("Repository"));
        assert_eq!(ctx.variable_type("svc"), Some("Service"));
        assert_eq!(ctx.variable_type("nothing"), None);
    }
}
