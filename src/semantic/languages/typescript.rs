//! TypeScript and JavaScript resolution policy.

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

/// Extensions tried, in order, for an extensionless specifier.
const MODULE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".d.ts"];

static TS_BUILTINS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut builtins = BTreeMap::new();
    for name in [
        "Array", "Object", "String", "Number", "Boolean", "Date", "RegExp", "Error", "Promise",
        "Map", "Set",
    ] {
        builtins.insert(name, "type");
    }
    for name in ["console", "JSON", "Math"] {
        builtins.insert(name, "object");
    }
    for name in [
        "parseInt", "parseFloat", "isNaN", "isFinite", "setTimeout", "setInterval",
        "clearTimeout", "clearInterval", "require",
    ] {
        builtins.insert(name, "function");
    }
    for name in ["any", "unknown", "never", "void", "undefined", "null"] {
        builtins.insert(name, "keyword");
    }
    builtins
});

/// Resolution policy shared by TypeScript and JavaScript sources.
#[derive(Debug, Clone, Copy)]
pub struct TypeScriptStrategy {
    language: &'static str,
}

impl TypeScriptStrategy {
    pub fn typescript() -> Self {
        Self {
            language: "typescript",
        }
    }

    pub fn javascript() -> Self {
        Self {
            language: "javascript",
        }
    }

    fn candidates(base: &Path) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        let raw = base.to_string_lossy();
        if MODULE_EXTENSIONS.iter().any(|ext| raw.ends_with(ext)) {
            candidates.push(base.to_path_buf());
            // ESM sources import `./x.js` while the file on disk is `x.ts`.
            if let Some(stem) = raw.strip_suffix(".js") {
                candidates.push(PathBuf::from(format!("{stem}.ts")));
                candidates.push(PathBuf::from(format!("{stem}.tsx")));
            }
        }
        candidates.extend(
            MODULE_EXTENSIONS
                .iter()
                .map(|ext| PathBuf::from(format!("{raw}{ext}"))),
        );
        candidates.extend(
            MODULE_EXTENSIONS
                .iter()
                .map(|ext| base.join(format!("index{ext}"))),
        );
        candidates
    }

    fn declared_type(symbol: &Symbol) -> Option<String> {
        match symbol.kind {
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum | SymbolKind::Type => {
                Some(symbol.name.clone())
            }
            SymbolKind::Function | SymbolKind::Method => Some(
                symbol
                    .metadata
                    .return_type
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Function".to_string()),
            ),
            SymbolKind::Namespace | SymbolKind::Module => Some("namespace".to_string()),
            _ => symbol.declared_type().map(str::to_string),
        }
    }
}

/// Name a function expression is bound to: `const f = () => {}` or a
/// class field `f = () => {}`.
pub(crate) fn bound_name(function: Node) -> Option<Node> {
    let parent = function.parent()?;
    let name = match parent.kind() {
        "variable_declarator" => parent.child_by_field_name("name"),
        "public_field_definition" => parent.child_by_field_name("name"),
        "field_definition" => parent.child_by_field_name("property"),
        _ => None,
    }?;
    matches!(name.kind(), "identifier" | "property_identifier").then_some(name)
}

impl Default for TypeScriptStrategy {
    fn default() -> Self {
        Self::typescript()
    }
}

impl LanguageStrategy for TypeScriptStrategy {
    fn language_id(&self) -> &'static str {
        self.language
    }

    fn resolve_import(
        &self,
        import_path: &str,
        current_file: &Path,
        project_root: &Path,
    ) -> Result<PathBuf, ResolveError> {
        let specifier = import_path.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`'));

        let base = if specifier.starts_with('.') {
            current_file
                .parent()
                .unwrap_or(project_root)
                .join(specifier)
        } else if let Some(rooted) = specifier.strip_prefix('/') {
            project_root.join(rooted)
        } else {
            return Err(ResolveError::ExternalModule(specifier.to_string()));
        };

        first_existing(specifier, &Self::candidates(&base))
    }

    fn resolve_member_access(
        &self,
        container: &Symbol,
        member: &str,
        table: &SymbolTable,
    ) -> Result<SymbolId, ResolveError> {
        let found = match container.kind {
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum => {
                find_member(table, container, member)
            }
            SymbolKind::Module if container.id.is_module() => {
                if container.location.file_path == table.file_path {
                    find_module_member(table, member)
                } else {
                    None
                }
            }
            SymbolKind::Namespace | SymbolKind::Module => find_member(table, container, member),
            _ => None,
        };
        found.ok_or_else(|| ResolveError::MemberNotFound {
            member: member.to_string(),
            kind: container.kind.to_string(),
            container: container.name.clone(),
        })
    }

    fn determine_scope(&self, node: Node, source: &[u8]) -> String {
        scope_label(node, source, |ancestor, src| {
            let named = match ancestor.kind() {
                "function_declaration"
                | "generator_function_declaration"
                | "method_definition"
                | "class_declaration"
                | "abstract_class_declaration"
                | "class"
                | "interface_declaration"
                | "enum_declaration"
                | "internal_module"
                | "module" => ancestor.child_by_field_name("name"),
                "arrow_function" | "function_expression" | "function" => bound_name(ancestor),
                _ => None,
            }?;
            named
                .utf8_text(src)
                .ok()
                .map(|text| text.trim_matches(|c| matches!(c, '"' | '\'')).to_string())
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
        ctx.visible_symbol(symbol_name)
            .and_then(Self::declared_type)
            .or_else(|| {
                ctx.imported_module(symbol_name)
                    .map(|_| "namespace".to_string())
            })
            .ok_or_else(|| ResolveError::TypeUnknown(symbol_name.to_string()))
    }

    fn builtin_types(&self) -> &'static BTreeMap<&'static str, &'static str> {
        &TS_BUILTINS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::semantic::strategy::ImportScope;
    use crate::semantic::symbol::FileLocation;

    fn setup_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/models")).unwrap();
        fs::create_dir_all(dir.path().join("src/lib")).unwrap();
        fs::write(dir.path().join("src/user-service.ts"), "").unwrap();
        fs::write(dir.path().join("src/main.ts"), "").unwrap();
        fs::write(dir.path().join("src/models/index.ts"), "").unwrap();
        fs::write(dir.path().join("src/lib/helpers.js"), "").unwrap();
        fs::write(dir.path().join("src/types.d.ts"), "").unwrap();
        dir
    }

    #[test]
    fn test_relative_imports() {
        let dir = setup_project();
        let root = dir.path();
        let from = root.join("src/main.ts");
        let ts = TypeScriptStrategy::typescript();

        assert_eq!(
            ts.resolve_import("'./user-service'", &from, root).unwrap(),
            root.join("src/user-service.ts")
        );
        assert_eq!(
            ts.resolve_import("\"./models\"", &from, root).unwrap(),
            root.join("src/models/index.ts")
        );
        assert_eq!(
            ts.resolve_import("./lib/helpers", &from, root).unwrap(),
            root.join("src/lib/helpers.js")
        );
        assert_eq!(
            ts.resolve_import("./types", &from, root).unwrap(),
            root.join("src/types.d.ts")
        );
        assert_eq!(
            ts.resolve_import("./user-service.js", &from, root).unwrap(),
            root.join("src/user-service.ts")
        );
        assert_eq!(
            ts.resolve_import("../main", &root.join("src/models/index.ts"), root)
                .unwrap(),
            root.join("src/main.ts")
        );
    }

    #[test]
    fn test_rooted_and_external_imports() {
        let dir = setup_project();
        let root = dir.path();
        let from = root.join("src/models/index.ts");
        let ts = TypeScriptStrategy::typescript();

        assert_eq!(
            ts.resolve_import("/src/main", &from, root).unwrap(),
            root.join("src/main.ts")
        );
        assert!(matches!(
            ts.resolve_import("'react'", &from, root),
            Err(ResolveError::ExternalModule(name)) if name == "react"
        ));
        assert!(matches!(
            ts.resolve_import("./missing", &from, root),
            Err(ResolveError::ImportNotFound { .. })
        ));
    }

    fn service_table() -> (SymbolTable, Symbol) {
        let file = "/p/user-service.ts";
        let loc = FileLocation {
            file_path: file.to_string(),
            ..FileLocation::default()
        };
        let mut table = SymbolTable::new(file, "typescript");
        let class = Symbol::new("UserService", SymbolKind::Class, "", loc.clone(), "typescript");
        table.add_symbol(class.clone());
        let mut find = Symbol::new("findUser", SymbolKind::Method, "UserService", loc.clone(), "typescript");
        find.metadata.return_type = Some("User".to_string());
        table.add_symbol(find);
        table.add_symbol(Symbol::new("Utils", SymbolKind::Namespace, "", loc.clone(), "typescript"));
        table.add_symbol(Symbol::new("format", SymbolKind::Function, "Utils", loc.clone(), "typescript"));
        table.add_symbol(Symbol::new("validateEmail", SymbolKind::Function, "", loc, "typescript"));
        (table, class)
    }

    #[test]
    fn test_member_access() {
        let (table, class) = service_table();
        let ts = TypeScriptStrategy::typescript();

        assert_eq!(
            ts.resolve_member_access(&class, "findUser", &table).unwrap().as_str(),
            "/p/user-service.ts::UserService::findUser"
        );

        let namespace = table.get_symbol("Utils").unwrap().clone();
        assert_eq!(
            ts.resolve_member_access(&namespace, "format", &table).unwrap().as_str(),
            "/p/user-service.ts::Utils::format"
        );

        let module = table.module_symbol();
        assert_eq!(
            ts.resolve_member_access(&module, "validateEmail", &table).unwrap().as_str(),
            "/p/user-service.ts::validateEmail"
        );

        let variable = Symbol::new(
            "service",
            SymbolKind::Variable,
            "",
            FileLocation::default(),
            "typescript",
        );
        assert!(matches!(
            ts.resolve_member_access(&variable, "findUser", &table),
            Err(ResolveError::MemberNotFound { .. })
        ));
    }

    #[test]
    fn test_infer_type_from_annotation_and_symbols() {
        let (mut table, _) = service_table();
        let loc = FileLocation {
            file_path: table.file_path.clone(),
            ..FileLocation::default()
        };
        let mut service = Symbol::new("service", SymbolKind::Variable, "", loc, "typescript");
        service.metadata.type_annotation = Some("UserService".to_string());
        table.add_symbol(service);

        let imports = ImportScope::default();
        let graph = BTreeMap::new();
        let tables = BTreeMap::new();
        let ctx = ResolutionContext::new(&table, &imports, &graph, &tables);
        let ts = TypeScriptStrategy::typescript();

        assert_eq!(ts.infer_type("service", &ctx).unwrap(), "UserService");
        assert_eq!(ts.infer_type("UserService", &ctx).unwrap(), "UserService");
        assert_eq!(ts.infer_type("validateEmail", &ctx).unwrap(), "Function");
        assert!(ts.infer_type("nobody", &ctx).is_err());
    }

    #[test]
    fn test_builtins() {
        let ts = TypeScriptStrategy::javascript();
        assert_eq!(ts.language_id(), "javascript");
        assert!(ts.is_builtin_symbol("console"));
        assert!(ts.is_builtin_symbol("Promise"));
        assert!(!ts.is_builtin_symbol("findUser"));
    }

    #[test]
    fn test_determine_scope() {
        let source = b"class UserService {\n  findUser(id: string) {\n    lookup(id);\n  }\n}\nconst handler = () => { run(); };\n";
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        let calls = collect_kind(tree.root_node(), "call_expression");
        let ts = TypeScriptStrategy::typescript();

        assert_eq!(calls.len(), 2);
        assert_eq!(ts.determine_scope(calls[0], source), "UserService::findUser");
        assert_eq!(ts.determine_scope(calls[1], source), "handler");
    }

    fn collect_kind<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
        let mut found = Vec::new();
        if node.kind() == kind {
            found.push(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children {
            found.extend(collect_kind(child, kind));
        }
        found
    }
}
