//! Python resolution policy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use tree_sitter::Node;

use crate::semantic::error::ResolveError;
use crate::semantic::strategy::{
    find_member, find_module_member, first_existing, scope_label, LanguageStrategy,
    ResolutionContext,
};
use crate::semantic::symbol::{Symbol, SymbolId, SymbolKind};
use crate::semantic::table::SymbolTable;

static PYTHON_BUILTINS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    let types = [
        "int", "str", "float", "bool", "list", "dict", "set", "tuple", "type", "range",
        "object", "bytes", "frozenset", "Exception", "ValueError", "TypeError", "KeyError",
        "RuntimeError", "NotImplementedError", "AttributeError", "IndexError",
    ];
    let functions = [
        "len", "print", "open", "input", "isinstance", "issubclass", "super", "enumerate",
        "zip", "map", "filter", "sorted", "reversed", "min", "max", "sum", "abs", "round",
        "repr", "hash", "id", "hasattr", "getattr", "setattr", "delattr", "iter", "next",
        "any", "all", "callable", "vars", "dir",
    ];
    types
        .into_iter()
        .map(|name| (name, "type"))
        .chain(functions.into_iter().map(|name| (name, "function")))
        .collect()
});

/// Resolution policy for Python sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonStrategy;

impl PythonStrategy {
    pub fn new() -> Self {
        Self
    }

    /// `..a.b` → (2, "a.b")
    fn split_relative(import_path: &str) -> (usize, &str) {
        let dots = import_path.chars().take_while(|c| *c == '.').count();
        (dots, &import_path[dots..])
    }

    fn module_candidates(base: &Path, dotted: &str) -> Vec<PathBuf> {
        let relative = dotted.replace('.', "/");
        vec![
            base.join(format!("{relative}.py")),
            base.join(&relative).join("__init__.py"),
        ]
    }

    /// Type of an imported symbol as seen from the importing file.
    fn imported_type(symbol: &Symbol, module: &str) -> String {
        match symbol.kind {
            SymbolKind::Class => format!("{module}.{}", symbol.name),
            _ => Self::declared_type(symbol),
        }
    }

    fn declared_type(symbol: &Symbol) -> String {
        match symbol.kind {
            SymbolKind::Class => symbol.name.clone(),
            SymbolKind::Function | SymbolKind::Method => symbol
                .metadata
                .return_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "function".to_string()),
            _ => symbol
                .declared_type()
                .map(str::to_string)
                .unwrap_or_else(|| "Any".to_string()),
        }
    }
}

impl LanguageStrategy for PythonStrategy {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn resolve_import(
        &self,
        import_path: &str,
        current_file: &Path,
        project_root: &Path,
    ) -> Result<PathBuf, ResolveError> {
        let current_dir = current_file.parent().unwrap_or(project_root);
        let (dots, module) = Self::split_relative(import_path.trim());

        if dots > 0 {
            let mut base = current_dir.to_path_buf();
            for _ in 1..dots {
                base.push("..");
            }
            let candidates = if module.is_empty() {
                vec![base.join("__init__.py")]
            } else {
                Self::module_candidates(&base, module)
            };
            return first_existing(import_path, &candidates);
        }

        if module.is_empty() {
            return Err(ResolveError::ImportNotFound {
                import: import_path.to_string(),
                tried: Vec::new(),
            });
        }

        let mut candidates = Self::module_candidates(current_dir, module);
        candidates.extend(Self::module_candidates(project_root, module));
        candidates.push(current_dir.join(format!("{module}.py")));
        first_existing(import_path, &candidates)
            .map_err(|_| ResolveError::ExternalModule(import_path.to_string()))
    }

    fn resolve_member_access(
        &self,
        container: &Symbol,
        member: &str,
        table: &SymbolTable,
    ) -> Result<SymbolId, ResolveError> {
        let found = match container.kind {
            SymbolKind::Class => find_member(table, container, member),
            SymbolKind::Module if container.id.is_module() => {
                if container.location.file_path == table.file_path {
                    find_module_member(table, member)
                } else {
                    None
                }
            }
            SymbolKind::Module => find_member(table, container, member),
            _ => None,
        };
        found.ok_or_else(|| ResolveError::MemberNotFound {
            member: member.to_string(),
            kind: container.kind.to_string(),
            container: container.name.clone(),
        })
    }

    fn determine_scope(&self, node: Node, source: &[u8]) -> String {
        scope_label(node, source, |ancestor, src| match ancestor.kind() {
            "function_definition" | "class_definition" => ancestor
                .child_by_field_name("name")
                .and_then(|name| name.utf8_text(src).ok())
                .map(str::to_string),
            _ => None,
        })
    }

    fn infer_type(
        &self,
        symbol_name: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolveError> {
        if let Some(declared) = ctx.variable_type(symbol_name) {
            return Ok(declared.to_string());
        }
        if let Some(returned) = ctx.call_result_type(symbol_name) {
            return Ok(returned.to_string());
        }
        if let Some(symbol) = ctx
            .local_symbol(symbol_name)
            .or_else(|| ctx.file_symbols.get_symbol(symbol_name))
        {
            return Ok(Self::declared_type(symbol));
        }
        for (module, table) in ctx.imported_symbols {
            if let Some(symbol) = table.get_symbol(symbol_name) {
                return Ok(Self::imported_type(symbol, module));
            }
        }
        if let Some(alias) = ctx.aliased_symbols.get(symbol_name) {
            if let Some(symbol) = alias.table.get_symbol(alias.original) {
                return Ok(Self::imported_type(symbol, &alias.table.module_name()));
            }
        }
        if ctx.imported_module(symbol_name).is_some() {
            return Ok("module".to_string());
        }
        Err(ResolveError::TypeUnknown(symbol_name.to_string()))
    }

    fn builtin_types(&self) -> &'static BTreeMap<&'static str, &'static str> {
        &PYTHON_BUILTINS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::semantic::strategy::{normalize_path, ImportScope};
    use crate::semantic::symbol::FileLocation;

    fn setup_package() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        fs::write(dir.path().join("pkg/__init__.py"), "").unwrap();
        fs::write(dir.path().join("pkg/a.py"), "def fa(): pass\n").unwrap();
        fs::write(dir.path().join("pkg/sub/__init__.py"), "").unwrap();
        fs::write(dir.path().join("pkg/sub/b.py"), "from ..a import fa\n").unwrap();
        fs::write(dir.path().join("pkg/sub/c.py"), "").unwrap();
        fs::write(dir.path().join("utils.py"), "").unwrap();
        dir
    }

    #[test]
    fn test_relative_parent_import() {
        let dir = setup_package();
        let root = dir.path();
        let resolved = PythonStrategy
            .resolve_import("..a", &root.join("pkg/sub/b.py"), root)
            .unwrap();
        assert_eq!(resolved, normalize_path(&root.join("pkg/a.py")));
    }

    #[test]
    fn test_relative_sibling_and_package_imports() {
        let dir = setup_package();
        let root = dir.path();
        let from = root.join("pkg/sub/b.py");

        assert_eq!(
            PythonStrategy.resolve_import(".c", &from, root).unwrap(),
            root.join("pkg/sub/c.py")
        );
        assert_eq!(
            PythonStrategy.resolve_import(".", &from, root).unwrap(),
            root.join("pkg/sub/__init__.py")
        );
        assert_eq!(
            PythonStrategy.resolve_import("..", &from, root).unwrap(),
            root.join("pkg/__init__.py")
        );
    }

    #[test]
    fn test_absolute_imports() {
        let dir = setup_package();
        let root = dir.path();
        let from = root.join("pkg/sub/b.py");

        assert_eq!(
            PythonStrategy.resolve_import("utils", &from, root).unwrap(),
            root.join("utils.py")
        );
        assert_eq!(
            PythonStrategy.resolve_import("pkg.a", &from, root).unwrap(),
            root.join("pkg/a.py")
        );
        assert_eq!(
            PythonStrategy.resolve_import("pkg", &from, root).unwrap(),
            root.join("pkg/__init__.py")
        );
        assert!(matches!(
            PythonStrategy.resolve_import("os", &from, root),
            Err(ResolveError::ExternalModule(_))
        ));
    }

    #[test]
    fn test_missing_relative_import_lists_candidates() {
        let dir = setup_package();
        let root = dir.path();
        let err = PythonStrategy
            .resolve_import(".missing", &root.join("pkg/a.py"), root)
            .unwrap_err();
        match err {
            ResolveError::ImportNotFound { tried, .. } => assert_eq!(tried.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn table_with_class() -> (SymbolTable, Symbol) {
        let file = "/p/service.py";
        let loc = FileLocation {
            file_path: file.to_string(),
            ..FileLocation::default()
        };
        let mut table = SymbolTable::new(file, "python");
        let class = Symbol::new("Service", SymbolKind::Class, "", loc.clone(), "python");
        table.add_symbol(class.clone());
        table.add_symbol(Symbol::new("find", SymbolKind::Method, "Service", loc.clone(), "python"));
        table.add_symbol(Symbol::new("helper", SymbolKind::Function, "", loc, "python"));
        (table, class)
    }

    #[test]
    fn test_member_access_on_class_and_module() {
        let (table, class) = table_with_class();

        assert_eq!(
            PythonStrategy
                .resolve_member_access(&class, "find", &table)
                .unwrap()
                .as_str(),
            "/p/service.py::Service::find"
        );
        assert!(PythonStrategy
            .resolve_member_access(&class, "helper", &table)
            .is_err());

        let module = table.module_symbol();
        assert_eq!(
            PythonStrategy
                .resolve_member_access(&module, "helper", &table)
                .unwrap()
                .as_str(),
            "/p/service.py::helper"
        );
        assert!(PythonStrategy
            .resolve_member_access(&module, "find", &table)
            .is_err());
    }

    #[test]
    fn test_member_access_on_other_file_module_is_rejected() {
        let (table, _) = table_with_class();
        let other = Symbol::module("/p/other.py", "other", "python");
        assert!(PythonStrategy
            .resolve_member_access(&other, "helper", &table)
            .is_err());
    }

    #[test]
    fn test_infer_type() {
        let (mut table, _) = table_with_class();
        table.type_tracker.record_type("", "svc", "Service");
        let mut typed = table.get_symbol("helper").unwrap().clone();
        typed.name = "make".to_string();
        typed.metadata.return_type = Some("Service".to_string());
        table.add_symbol(typed);

        let imports = ImportScope::default();
        let graph = BTreeMap::new();
        let tables = BTreeMap::new();
        let ctx = ResolutionContext::new(&table, &imports, &graph, &tables);

        assert_eq!(PythonStrategy.infer_type("svc", &ctx).unwrap(), "Service");
        assert_eq!(PythonStrategy.infer_type("Service", &ctx).unwrap(), "Service");
        assert_eq!(PythonStrategy.infer_type("helper", &ctx).unwrap(), "function");
        assert_eq!(PythonStrategy.infer_type("make", &ctx).unwrap(), "Service");
        assert!(matches!(
            PythonStrategy.infer_type("ghost", &ctx),
            Err(ResolveError::TypeUnknown(_))
        ));
    }

    #[test]
    fn test_infer_imported_class_type() {
        let (service, _) = table_with_class();
        let main = SymbolTable::new("/p/main.py", "python");
        let mut imports = ImportScope::default();
        imports.modules.insert("service".to_string(), &service);
        let graph = BTreeMap::new();
        let tables = BTreeMap::new();
        let ctx = ResolutionContext::new(&main, &imports, &graph, &tables);

        assert_eq!(
            PythonStrategy.infer_type("Service", &ctx).unwrap(),
            "service.Service"
        );
        assert_eq!(PythonStrategy.infer_type("service", &ctx).unwrap(), "module");
    }

    #[test]
    fn test_builtins() {
        assert!(PythonStrategy.is_builtin_symbol("print"));
        assert!(PythonStrategy.is_builtin_symbol("len"));
        assert!(!PythonStrategy.is_builtin_symbol("validate_email"));
        assert_eq!(
            PythonStrategy.builtin_symbol_id("range").unwrap().as_str(),
            "<builtin>::range"
        );
        assert!(PythonStrategy.builtin_symbol_id("custom").is_none());
    }

    #[test]
    fn test_determine_scope() {
        let source = b"class Service:\n    def find(self):\n        lookup()\n";
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        let call = find_kind(tree.root_node(), "call").unwrap();

        assert_eq!(PythonStrategy.determine_scope(call, source), "Service::find");
        let method = find_kind(tree.root_node(), "function_definition").unwrap();
        assert_eq!(PythonStrategy.determine_scope(method, source), "Service");
        assert_eq!(PythonStrategy.determine_scope(tree.root_node(), source), "");
    }

    fn find_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        children.into_iter().find_map(|child| find_kind(child, kind))
    }
}
