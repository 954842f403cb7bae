//! Python front end using tree-sitter.

use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use super::{
    argument_texts, count_captures, is_constant_name, looks_like_type, nearest_ancestor, squash,
    Collected, FileExtractor, ParsedFile,
};
use crate::semantic::{
    CallSite, DependencyInfo, FileAnalysis, FileLocation, ImportKind, LanguageStrategy,
    ParameterInfo, PythonStrategy, Symbol, SymbolId, SymbolKind, Visibility,
};

const DEFINITION_QUERY: &str = r#"
(function_definition
  name: (identifier) @func_name
) @function

(class_definition
  name: (identifier) @class_name
) @class
"#;

const ASSIGNMENT_QUERY: &str = r#"
; x = ..., x: T = ...
(assignment
  left: (identifier) @target
) @assignment

; self.x = ...
((assignment
  left: (attribute
    object: (identifier) @receiver
    attribute: (identifier) @attribute)
) @attribute_assignment
 (#eq? @receiver "self"))
"#;

const IMPORT_QUERY: &str = r#"
(import_statement) @import
(import_from_statement) @import_from
"#;

const CALL_QUERY: &str = r#"
(call
  function: (_) @callee
) @call
"#;

const BRANCH_QUERY: &str = r#"
(if_statement) @if
(elif_clause) @elif
(for_statement) @for
(while_statement) @while
(conditional_expression) @ternary
(boolean_operator) @bool
(except_clause) @except
(case_clause) @case
"#;

const SCOPE_KINDS: &[&str] = &["function_definition", "class_definition"];

pub struct PythonExtractor {
    language: Language,
    strategy: PythonStrategy,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
            strategy: PythonStrategy::new(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    fn location(parsed: &ParsedFile, node: Node) -> FileLocation {
        FileLocation::from_node(&parsed.path, node)
    }

    fn scope_of(&self, parsed: &ParsedFile, node: Node) -> String {
        self.strategy.determine_scope(node, &parsed.source)
    }

    fn extract_definitions(&self, parsed: &ParsedFile, out: &mut Collected) -> anyhow::Result<()> {
        let query = Query::new(&self.language, DEFINITION_QUERY)?;
        let branches = Query::new(&self.language, BRANCH_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        while let Some(m) = matches.next() {
            let mut name = None;
            let mut definition = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "func_name" | "class_name" => name = Some(parsed.node_text(capture.node)),
                    "function" | "class" => definition = Some(capture.node),
                    _ => {}
                }
            }

            let (Some(name), Some(node)) = (name, definition) else {
                continue;
            };
            let symbol = if node.kind() == "class_definition" {
                self.class_symbol(parsed, node, name)
            } else {
                self.function_symbol(parsed, node, name, &branches, out)
            };
            out.symbols.push(symbol);
        }
        Ok(())
    }

    fn function_symbol(
        &self,
        parsed: &ParsedFile,
        node: Node,
        name: &str,
        branches: &Query,
        out: &mut Collected,
    ) -> Symbol {
        let scope = self.scope_of(parsed, node);
        let in_class = nearest_ancestor(node, SCOPE_KINDS)
            .is_some_and(|n| n.kind() == "class_definition");
        let decorators = decorators_of(parsed, node);
        let has_decorator = |wanted: &str| {
            decorators
                .iter()
                .any(|d| d == wanted || d.ends_with(&format!(".{wanted}")))
        };

        let kind = match (in_class, has_decorator("property")) {
            (true, true) => SymbolKind::Property,
            (true, false) => SymbolKind::Method,
            (false, _) => SymbolKind::Function,
        };

        let mut symbol = Symbol::new(name, kind, scope.as_str(), Self::location(parsed, node), "python");
        symbol.visibility = Visibility::from_python_name(name);
        symbol.is_exported = scope.is_empty() && !name.starts_with('_');
        symbol.is_static = has_decorator("staticmethod");
        symbol.is_abstract = has_decorator("abstractmethod");
        symbol.signature = signature_of(parsed, node);
        symbol.metadata.return_type = parsed.field_text(node, "return_type").map(str::to_string);
        symbol.metadata.doc_string = docstring_of(parsed, node);
        symbol.metadata.complexity = 1 + node
            .child_by_field_name("body")
            .map(|body| count_captures(branches, body, &parsed.source))
            .unwrap_or(0);
        if has_decorator("classmethod") {
            symbol
                .metadata
                .custom_fields
                .insert("binding".to_string(), "classmethod".to_string());
        }
        symbol.metadata.decorators = decorators;

        let function_scope = symbol.member_scope();
        symbol.metadata.parameters = self.parameters(parsed, node, &function_scope, out);
        symbol
    }

    fn class_symbol(&self, parsed: &ParsedFile, node: Node, name: &str) -> Symbol {
        let scope = self.scope_of(parsed, node);
        let mut symbol = Symbol::new(name, SymbolKind::Class, scope.as_str(), Self::location(parsed, node), "python");
        symbol.visibility = Visibility::from_python_name(name);
        symbol.is_exported = scope.is_empty() && !name.starts_with('_');
        symbol.signature = signature_of(parsed, node);
        symbol.metadata.doc_string = docstring_of(parsed, node);
        symbol.metadata.decorators = decorators_of(parsed, node);

        if let Some(bases) = node.child_by_field_name("superclasses") {
            let mut cursor = bases.walk();
            for base in bases.named_children(&mut cursor) {
                match base.kind() {
                    "identifier" | "attribute" => {
                        symbol.metadata.extends.push(parsed.node_text(base).to_string())
                    }
                    "keyword_argument" => {
                        if parsed.node_text(base).contains("ABCMeta") {
                            symbol.is_abstract = true;
                        }
                    }
                    _ => {}
                }
            }
        }
        if symbol
            .metadata
            .extends
            .iter()
            .any(|b| b == "ABC" || b == "abc.ABC")
        {
            symbol.is_abstract = true;
        }
        symbol
    }

    /// Parameters of a function; each one is also recorded as a local of
    /// `function_scope`.
    fn parameters(
        &self,
        parsed: &ParsedFile,
        function: Node,
        function_scope: &str,
        out: &mut Collected,
    ) -> Vec<ParameterInfo> {
        let Some(params) = function.child_by_field_name("parameters") else {
            return Vec::new();
        };

        let mut infos = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let (name_node, type_name, default_value) = match param.kind() {
                "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    (Some(param), None, None)
                }
                "typed_parameter" => (
                    param.named_child(0),
                    parsed.field_text(param, "type"),
                    None,
                ),
                "default_parameter" => (
                    param.child_by_field_name("name"),
                    None,
                    parsed.field_text(param, "value"),
                ),
                "typed_default_parameter" => (
                    param.child_by_field_name("name"),
                    parsed.field_text(param, "type"),
                    parsed.field_text(param, "value"),
                ),
                _ => continue,
            };
            let Some((ident, is_variadic)) = name_node.and_then(parameter_identifier) else {
                continue;
            };

            let name = parsed.node_text(ident);
            let mut local = Symbol::new(
                name,
                SymbolKind::Parameter,
                function_scope,
                Self::location(parsed, param),
                "python",
            );
            local.metadata.type_annotation = type_name.map(str::to_string);
            out.locals.push(local);

            infos.push(ParameterInfo {
                name: name.to_string(),
                type_name: type_name.map(str::to_string),
                default_value: default_value.map(str::to_string),
                is_optional: default_value.is_some(),
                is_variadic,
            });
        }
        infos
    }

    fn extract_assignments(&self, parsed: &ParsedFile, out: &mut Collected) -> anyhow::Result<()> {
        let query = Query::new(&self.language, ASSIGNMENT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        while let Some(m) = matches.next() {
            let mut target = None;
            let mut attribute = None;
            let mut assignment = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "target" => target = Some(capture.node),
                    "attribute" => attribute = Some(capture.node),
                    "assignment" | "attribute_assignment" => assignment = Some(capture.node),
                    _ => {}
                }
            }

            match (target, attribute, assignment) {
                (Some(target), _, Some(assignment)) => {
                    self.record_assignment(parsed, target, assignment, out)
                }
                (None, Some(attribute), Some(assignment)) => {
                    self.record_instance_field(parsed, attribute, assignment, out)
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn record_assignment(&self, parsed: &ParsedFile, target: Node, assignment: Node, out: &mut Collected) {
        let name = parsed.node_text(target);
        let scope = self.scope_of(parsed, assignment);
        let annotation = parsed.field_text(assignment, "type").map(str::to_string);
        let right = assignment.child_by_field_name("right");
        let constructed = right.and_then(|r| constructed_type(parsed, r));

        match constructed.as_deref() {
            Some(class) => out.type_tracker.record_type(&scope, name, class),
            None => {
                if let Some(callee) = right.and_then(|r| called_name(parsed, r)) {
                    out.type_tracker.record_call_result(&scope, name, &callee);
                }
            }
        }

        let enclosing = nearest_ancestor(assignment, SCOPE_KINDS).map(|n| n.kind());
        let kind = match enclosing {
            None if is_constant_name(name) => SymbolKind::Constant,
            None => SymbolKind::Variable,
            Some("class_definition") => SymbolKind::Field,
            Some(_) => SymbolKind::Variable,
        };

        let mut symbol = Symbol::new(name, kind, scope.as_str(), Self::location(parsed, assignment), "python");
        symbol.visibility = Visibility::from_python_name(name);
        symbol.metadata.type_annotation = annotation.or(constructed);

        match enclosing {
            Some("function_definition") => out.locals.push(symbol),
            _ => {
                symbol.is_exported = scope.is_empty() && !name.starts_with('_');
                out.symbols.push(symbol);
            }
        }
    }

    /// `self.repo = Repository()` inside a method declares a field of the class.
    fn record_instance_field(&self, parsed: &ParsedFile, attribute: Node, assignment: Node, out: &mut Collected) {
        let Some(method) = nearest_ancestor(assignment, &["function_definition"]) else {
            return;
        };
        if !nearest_ancestor(method, SCOPE_KINDS).is_some_and(|n| n.kind() == "class_definition") {
            return;
        }
        let class_scope = self.scope_of(parsed, method);
        if class_scope.is_empty() {
            return;
        }

        let name = parsed.node_text(attribute);
        let annotation = parsed.field_text(assignment, "type").map(str::to_string);
        let constructed = assignment
            .child_by_field_name("right")
            .and_then(|r| constructed_type(parsed, r));

        let mut field = Symbol::new(name, SymbolKind::Field, class_scope, Self::location(parsed, assignment), "python");
        field.visibility = Visibility::from_python_name(name);
        field.metadata.type_annotation = annotation.or(constructed);
        out.inferred_members.push(field);
    }

    fn extract_imports(&self, parsed: &ParsedFile, out: &mut Collected) -> anyhow::Result<()> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "import" => self.plain_import(parsed, capture.node, out),
                    "import_from" => self.from_import(parsed, capture.node, out),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// `import a.b, c as d`
    fn plain_import(&self, parsed: &ParsedFile, node: Node, out: &mut Collected) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (module, alias) = match name.kind() {
                "aliased_import" => (
                    parsed.field_text(name, "name").unwrap_or_default(),
                    parsed.field_text(name, "alias").map(str::to_string),
                ),
                _ => (parsed.node_text(name), None),
            };
            if module.is_empty() {
                continue;
            }
            out.dependencies.push(DependencyInfo {
                source_file: parsed.path.clone(),
                target_module: module.to_string(),
                import_alias: alias,
                import_kind: ImportKind::Import,
                location: Self::location(parsed, node),
                ..DependencyInfo::default()
            });
        }
    }

    /// `from m import x, y as z`, `from . import x`, `from m import *`
    fn from_import(&self, parsed: &ParsedFile, node: Node, out: &mut Collected) {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };
        let is_relative = module.kind() == "relative_import";

        let mut dependency = DependencyInfo {
            source_file: parsed.path.clone(),
            target_module: parsed.node_text(module).to_string(),
            is_relative,
            location: Self::location(parsed, node),
            ..DependencyInfo::default()
        };

        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            match name.kind() {
                "aliased_import" => {
                    let original = parsed.field_text(name, "name").unwrap_or_default();
                    let alias = parsed.field_text(name, "alias").unwrap_or_default();
                    dependency.imported_symbols.push(original.to_string());
                    if !alias.is_empty() && alias != original {
                        dependency
                            .symbol_aliases
                            .push((original.to_string(), alias.to_string()));
                    }
                }
                _ => dependency
                    .imported_symbols
                    .push(parsed.node_text(name).to_string()),
            }
        }

        let mut cursor = node.walk();
        let wildcard = node
            .children(&mut cursor)
            .any(|child| child.kind() == "wildcard_import");
        if wildcard {
            dependency.imported_symbols = vec!["*".to_string()];
        }

        dependency.import_kind = if wildcard {
            ImportKind::WildcardImport
        } else if is_relative {
            ImportKind::RelativeImport
        } else {
            ImportKind::FromImport
        };
        out.dependencies.push(dependency);
    }

    fn extract_calls(&self, parsed: &ParsedFile, out: &mut Collected) -> anyhow::Result<()> {
        let query = Query::new(&self.language, CALL_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        while let Some(m) = matches.next() {
            let mut callee = None;
            let mut call = None;
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "callee" => callee = Some(capture.node),
                    "call" => call = Some(capture.node),
                    _ => {}
                }
            }
            let (Some(callee), Some(call)) = (callee, call) else {
                continue;
            };
            let Some(callee_name) = callee_text(parsed, callee) else {
                continue;
            };

            let mut site = CallSite::new(
                self.caller_id(parsed, call),
                callee_name,
                Self::location(parsed, call),
            );
            site.arguments = argument_texts(parsed, call.child_by_field_name("arguments"));
            out.calls.push(site);
        }
        Ok(())
    }

    /// Id of the function enclosing `node`, or the module id.
    fn caller_id(&self, parsed: &ParsedFile, node: Node) -> SymbolId {
        nearest_ancestor(node, &["function_definition"])
            .and_then(|function| {
                let name = parsed.field_text(function, "name")?;
                Some(SymbolId::new(&parsed.path, name, &self.scope_of(parsed, function)))
            })
            .unwrap_or_else(|| SymbolId::module(&parsed.path))
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FileExtractor for PythonExtractor {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Python source: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract(&self, parsed: &ParsedFile) -> anyhow::Result<FileAnalysis> {
        let mut collected = Collected::default();
        self.extract_definitions(parsed, &mut collected)?;
        self.extract_assignments(parsed, &mut collected)?;
        self.extract_imports(parsed, &mut collected)?;
        self.extract_calls(parsed, &mut collected)?;
        Ok(collected.into_analysis(parsed, self.language_id()))
    }
}

/// `x`, `*args`, `**kwargs` → the identifier and whether it is variadic.
fn parameter_identifier(node: Node) -> Option<(Node, bool)> {
    match node.kind() {
        "identifier" => Some((node, false)),
        "list_splat_pattern" | "dictionary_splat_pattern" => node
            .named_child(0)
            .filter(|n| n.kind() == "identifier")
            .map(|n| (n, true)),
        _ => None,
    }
}

/// Decorator names of a decorated definition, without `@` and arguments.
fn decorators_of(parsed: &ParsedFile, definition: Node) -> Vec<String> {
    let Some(parent) = definition.parent().filter(|p| p.kind() == "decorated_definition") else {
        return Vec::new();
    };
    let mut cursor = parent.walk();
    parent
        .children(&mut cursor)
        .filter(|child| child.kind() == "decorator")
        .map(|decorator| {
            let text = parsed.node_text(decorator).trim_start_matches('@').trim();
            text.split('(').next().unwrap_or(text).trim().to_string()
        })
        .collect()
}

/// Header of a definition up to its body: `def f(a: int) -> str`.
fn signature_of(parsed: &ParsedFile, definition: Node) -> String {
    let end = definition
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| definition.end_byte());
    let header = std::str::from_utf8(&parsed.source[definition.start_byte()..end]).unwrap_or("");
    squash(header.trim_end().trim_end_matches(':'))
}

/// First statement of the body when it is a string literal.
fn docstring_of(parsed: &ParsedFile, definition: Node) -> Option<String> {
    let body = definition.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0).filter(|n| n.kind() == "string")?;
    let text = parsed
        .node_text(literal)
        .trim_start_matches(|c| matches!(c, 'r' | 'R' | 'u' | 'U' | 'b' | 'B'))
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Whether `node` is a plain dotted name (`a`, `a.b.c`).
fn is_dotted_name(node: Node) -> bool {
    match node.kind() {
        "identifier" => true,
        "attribute" => node
            .child_by_field_name("object")
            .is_some_and(is_dotted_name),
        _ => false,
    }
}

/// Callee as written. Complex receivers (`f().g()`, `a[0].g()`) keep only
/// the attribute name.
fn callee_text(parsed: &ParsedFile, callee: Node) -> Option<String> {
    match callee.kind() {
        "identifier" => Some(parsed.node_text(callee).to_string()),
        "attribute" if is_dotted_name(callee) => {
            Some(parsed.node_text(callee).split_whitespace().collect())
        }
        "attribute" => parsed.field_text(callee, "attribute").map(str::to_string),
        _ => None,
    }
}

/// Callee name when `value` is a call to a plain dotted name.
fn called_name(parsed: &ParsedFile, value: Node) -> Option<String> {
    if value.kind() != "call" {
        return None;
    }
    let function = value.child_by_field_name("function")?;
    is_dotted_name(function).then(|| callee_text(parsed, function))?
}

/// `Service(...)` → `Service`.
fn constructed_type(parsed: &ParsedFile, value: Node) -> Option<String> {
    called_name(parsed, value).filter(|name| looks_like_type(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_python(source: &str) -> FileAnalysis {
        let extractor = PythonExtractor::new();
        let parsed = extractor
            .parse(Path::new("/project/app.py"), source.as_bytes())
            .unwrap();
        extractor.extract(&parsed).unwrap()
    }

    #[test]
    fn test_extract_definitions() {
        let source = r#"
MAX_RETRIES = 3

def helper(x, y=2, *args, **kwargs) -> int:
    """Add things."""
    return x + y

class Service(Base):
    timeout = 30

    def __init__(self, repo: Repository):
        self.repo = repo
        self.cache = Cache()

    @staticmethod
    def build():
        pass

    def _check(self):
        if True:
            return 1
        return 2
"#;
        let analysis = extract_python(source);
        let table = &analysis.symbol_table;

        let helper = table.get_symbol("helper").unwrap();
        assert_eq!(helper.kind, SymbolKind::Function);
        assert_eq!(helper.id.as_str(), "/project/app.py::helper");
        assert_eq!(helper.metadata.return_type.as_deref(), Some("int"));
        assert_eq!(helper.metadata.doc_string.as_deref(), Some("Add things."));
        assert_eq!(helper.metadata.parameters.len(), 4);
        assert!(helper.metadata.parameters[1].is_optional);
        assert!(helper.metadata.parameters[2].is_variadic);
        assert_eq!(helper.signature, "def helper(x, y=2, *args, **kwargs) -> int");
        assert!(helper.is_exported);

        let service = table.get_symbol("Service").unwrap();
        assert_eq!(service.kind, SymbolKind::Class);
        assert_eq!(service.metadata.extends, vec!["Base".to_string()]);
        assert!(table.nested_scopes.contains_key("Service"));

        let init = table.member("Service", "__init__").unwrap();
        assert_eq!(init.kind, SymbolKind::Method);
        assert_eq!(init.visibility, Visibility::Magic);
        assert_eq!(init.id.as_str(), "/project/app.py::Service::__init__");

        assert!(table.member("Service", "build").unwrap().is_static);
        let check = table.member("Service", "_check").unwrap();
        assert_eq!(check.visibility, Visibility::Protected);
        assert_eq!(check.metadata.complexity, 2);

        assert_eq!(table.get_symbol("MAX_RETRIES").unwrap().kind, SymbolKind::Constant);
        assert_eq!(table.member("Service", "timeout").unwrap().kind, SymbolKind::Field);
        assert_eq!(
            table
                .member("Service", "cache")
                .unwrap()
                .metadata
                .type_annotation
                .as_deref(),
            Some("Cache")
        );

        let repo = table.local_symbol(Some("Service::__init__"), "repo").unwrap();
        assert_eq!(repo.kind, SymbolKind::Parameter);
        assert_eq!(repo.metadata.type_annotation.as_deref(), Some("Repository"));
    }

    #[test]
    fn test_extract_imports() {
        let source = r#"
import os
import numpy as np
from collections import OrderedDict
from ..models import User, Order as O
from . import local_module
from helpers import *
"#;
        let analysis = extract_python(source);
        let deps = &analysis.dependencies;

        assert_eq!(deps.len(), 6);
        assert_eq!(deps[0].target_module, "os");
        assert_eq!(deps[0].import_kind, ImportKind::Import);
        assert_eq!(deps[1].import_alias.as_deref(), Some("np"));

        let relative = &deps[3];
        assert_eq!(relative.target_module, "..models");
        assert!(relative.is_relative);
        assert_eq!(relative.import_kind, ImportKind::RelativeImport);
        assert_eq!(relative.imported_symbols, vec!["User", "Order"]);
        assert_eq!(
            relative.symbol_aliases,
            vec![("Order".to_string(), "O".to_string())]
        );

        assert_eq!(deps[4].target_module, ".");
        assert!(deps[5].is_wildcard());
        assert_eq!(deps[5].import_kind, ImportKind::WildcardImport);
        assert_eq!(analysis.symbol_table.dependencies.len(), 6);
    }

    #[test]
    fn test_extract_calls_with_callers() {
        let source = r#"
from utils import validate_email

class Service:
    def find(self, user_id):
        self.check(user_id)
        return get_repo().load(user_id)

def main():
    svc = Service()
    svc.find(1)
    print(validate_email("a@b.c"))

main()
"#;
        let analysis = extract_python(source);
        let calls: Vec<(&str, &str)> = analysis
            .call_sites
            .iter()
            .map(|c| (c.caller_id.as_str(), c.callee_name.as_str()))
            .collect();

        assert!(calls.contains(&("/project/app.py::Service::find", "self.check")));
        assert!(calls.contains(&("/project/app.py::Service::find", "load")));
        assert!(calls.contains(&("/project/app.py::Service::find", "get_repo")));
        assert!(calls.contains(&("/project/app.py::main", "Service")));
        assert!(calls.contains(&("/project/app.py::main", "svc.find")));
        assert!(calls.contains(&("/project/app.py::main", "print")));
        assert!(calls.contains(&("/project/app.py::main", "validate_email")));
        assert!(calls.contains(&("/project/app.py::<module>", "main")));

        let print = analysis
            .call_sites
            .iter()
            .find(|c| c.callee_name == "print")
            .unwrap();
        assert_eq!(print.arguments, vec!["validate_email(\"a@b.c\")".to_string()]);
        assert!(analysis.call_sites.iter().all(|c| !c.is_resolved));

        let tracker = &analysis.symbol_table.type_tracker;
        assert_eq!(tracker.type_of(Some("main"), "svc"), Some("Service"));
    }

    #[test]
    fn test_nested_function_ids_match_callers() {
        let source = r#"
def outer():
    def inner(value):
        return transform(value)
    return inner(1)
"#;
        let analysis = extract_python(source);
        let inner = analysis.symbol_table.member("outer", "inner").unwrap();
        assert_eq!(inner.id.as_str(), "/project/app.py::outer::inner");

        let transform = analysis
            .call_sites
            .iter()
            .find(|c| c.callee_name == "transform")
            .unwrap();
        assert_eq!(transform.caller_id, inner.id);
        assert!(analysis
            .symbol_table
            .local_symbol(Some("outer::inner"), "value")
            .is_some());
    }

    #[test]
    fn test_parse_errors_are_flagged() {
        let analysis = extract_python("def broken(:\n    pass\n");
        assert!(analysis.has_parse_errors);
    }
}
