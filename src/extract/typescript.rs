//! TypeScript, TSX and JavaScript front end.
//!
//! The three grammars share most node kinds but differ in field names
//! (`public_field_definition` vs `field_definition`, typed parameters vs
//! plain patterns), so this front end walks the tree by hand instead of
//! compiling one query per grammar.

use std::path::Path;

use tree_sitter::{Language, Node, Parser};

use super::{
    argument_texts, for_each_node, is_constant_name, looks_like_type, nearest_ancestor, squash,
    Collected, FileExtractor, ParsedFile,
};
use crate::semantic::languages::typescript::bound_name;
use crate::semantic::{
    CallSite, DependencyInfo, FileAnalysis, FileLocation, ImportKind, LanguageStrategy, DEFAULT_EXPORT,
    ParameterInfo, Symbol, SymbolId, SymbolKind, TypeScriptStrategy, Visibility,
};

/// Nodes that own a body and can appear as a caller.
const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "method_definition",
    "arrow_function",
    "function_expression",
    "function",
];

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_case",
    "catch_clause",
    "ternary_expression",
];

pub struct TypeScriptExtractor {
    language: Language,
    language_id: &'static str,
    extensions: &'static [&'static str],
    strategy: TypeScriptStrategy,
}

impl TypeScriptExtractor {
    pub fn typescript() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            language_id: "typescript",
            extensions: &["ts", "mts", "cts"],
            strategy: TypeScriptStrategy::typescript(),
        }
    }

    pub fn tsx() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TSX.into(),
            language_id: "typescript",
            extensions: &["tsx"],
            strategy: TypeScriptStrategy::typescript(),
        }
    }

    pub fn javascript() -> Self {
        Self {
            language: tree_sitter_javascript::LANGUAGE.into(),
            language_id: "javascript",
            extensions: &["js", "jsx", "mjs", "cjs"],
            strategy: TypeScriptStrategy::javascript(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }
}

impl FileExtractor for TypeScriptExtractor {
    fn language_id(&self) -> &'static str {
        self.language_id
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser.parse(source, None).ok_or_else(|| {
            anyhow::anyhow!("failed to parse {} source: {}", self.language_id, path.display())
        })?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract(&self, parsed: &ParsedFile) -> anyhow::Result<FileAnalysis> {
        let mut walker = Walker {
            parsed,
            strategy: &self.strategy,
            language: self.language_id,
            out: Collected::default(),
            exported_names: Vec::new(),
        };
        for_each_node(parsed.tree.root_node(), |node| walker.visit(node));

        let Walker {
            mut out,
            exported_names,
            ..
        } = walker;
        for symbol in &mut out.symbols {
            if symbol.scope.is_empty() && exported_names.contains(&symbol.name) {
                symbol.is_exported = true;
            }
        }
        Ok(out.into_analysis(parsed, self.language_id))
    }
}

/// Single pass over one file.
struct Walker<'p> {
    parsed: &'p ParsedFile,
    strategy: &'p TypeScriptStrategy,
    language: &'static str,
    out: Collected,
    /// Names listed in `export { a, b }` without a source.
    exported_names: Vec<String>,
}

impl<'p> Walker<'p> {
    fn visit(&mut self, node: Node) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "function_signature" => {
                self.function(node)
            }
            "class_declaration" | "abstract_class_declaration" | "class" => self.class(node),
            "interface_declaration" => self.interface(node),
            "type_alias_declaration" => self.type_alias(node),
            "enum_declaration" => self.enumeration(node),
            "internal_module" | "module" => self.namespace(node),
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                self.method(node)
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                self.field(node)
            }
            "variable_declarator" => self.variable(node),
            "assignment_expression" => self.this_assignment(node),
            "import_statement" => self.import(node),
            "export_statement" => self.export(node),
            "call_expression" => self.call(node, "function"),
            "new_expression" => self.call(node, "constructor"),
            _ => {}
        }
    }

    fn text(&self, node: Node) -> &'p str {
        self.parsed.node_text(node)
    }

    fn field_text(&self, node: Node, field: &str) -> Option<&'p str> {
        node.child_by_field_name(field).map(|n| self.parsed.node_text(n))
    }

    fn location(&self, node: Node) -> FileLocation {
        FileLocation::from_node(&self.parsed.path, node)
    }

    fn scope_of(&self, node: Node) -> String {
        self.strategy.determine_scope(node, &self.parsed.source)
    }

    fn symbol(&self, name: &str, kind: SymbolKind, node: Node) -> Symbol {
        let mut symbol = Symbol::new(name, kind, self.scope_of(node), self.location(node), self.language);
        symbol.is_exported = is_exported(node);
        symbol.signature = signature_of(self.parsed, node);
        symbol
    }

    fn function(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let mut symbol = self.symbol(name, SymbolKind::Function, node);
        self.fill_callable(&mut symbol, node, None);
        self.out.symbols.push(symbol);
    }

    /// Parameters, return type and complexity of a function-like node.
    fn fill_callable(&mut self, symbol: &mut Symbol, function: Node, class_scope: Option<&str>) {
        symbol.metadata.return_type = self.field_text(function, "return_type").map(type_text);
        symbol.metadata.complexity = function
            .child_by_field_name("body")
            .map(|body| 1 + branch_count(self.parsed, body))
            .unwrap_or(1);
        if let Some(params) = function.child_by_field_name("parameters") {
            let function_scope = symbol.member_scope();
            let field_scope = class_scope.filter(|_| symbol.name == "constructor");
            symbol.metadata.parameters = self.parameters(params, &function_scope, field_scope);
        }
    }

    /// Each parameter is also a local of `function_scope`. Constructor
    /// parameter properties (`private repo: Repo`) become fields of
    /// `field_scope`.
    fn parameters(
        &mut self,
        params: Node,
        function_scope: &str,
        field_scope: Option<&str>,
    ) -> Vec<ParameterInfo> {
        let mut infos = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let (pattern, type_name, default_value, optional) = match param.kind() {
                "required_parameter" | "optional_parameter" => (
                    param.child_by_field_name("pattern"),
                    self.field_text(param, "type").map(type_text),
                    self.field_text(param, "value"),
                    param.kind() == "optional_parameter",
                ),
                "assignment_pattern" => (
                    param.child_by_field_name("left"),
                    None,
                    self.field_text(param, "right"),
                    false,
                ),
                "identifier" | "rest_pattern" => (Some(param), None, None, false),
                _ => continue,
            };
            let Some(pattern) = pattern else {
                continue;
            };
            let (name_node, is_variadic) = match pattern.kind() {
                "rest_pattern" => (pattern.named_child(0), true),
                "identifier" => (Some(pattern), false),
                _ => (None, false),
            };

            let name = name_node.map(|n| self.text(n)).unwrap_or_else(|| self.text(pattern));
            if name_node.is_some() {
                let mut local = Symbol::new(
                    name,
                    SymbolKind::Parameter,
                    function_scope,
                    self.location(param),
                    self.language,
                );
                local.metadata.type_annotation = type_name.clone();
                self.out.locals.push(local);
            }

            if let (Some(class_scope), Some(modifier)) = (field_scope, parameter_property(self.parsed, param)) {
                let mut field = Symbol::new(name, SymbolKind::Field, class_scope, self.location(param), self.language);
                field.visibility = modifier;
                field.metadata.type_annotation = type_name.clone();
                self.out.inferred_members.push(field);
            }

            infos.push(ParameterInfo {
                name: name.to_string(),
                type_name,
                default_value: default_value.map(str::to_string),
                is_optional: optional || default_value.is_some(),
                is_variadic,
            });
        }
        infos
    }

    fn class(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let mut symbol = self.symbol(name, SymbolKind::Class, node);
        symbol.is_abstract = node.kind() == "abstract_class_declaration";
        symbol.metadata.decorators = decorators_of(self.parsed, node);

        let mut cursor = node.walk();
        for heritage in node
            .children(&mut cursor)
            .filter(|c| c.kind() == "class_heritage")
        {
            let mut inner = heritage.walk();
            for clause in heritage.named_children(&mut inner) {
                match clause.kind() {
                    "extends_clause" => {
                        if let Some(value) = self.field_text(clause, "value") {
                            symbol.metadata.extends.push(value.to_string());
                        }
                    }
                    "implements_clause" => {
                        let mut types = clause.walk();
                        symbol.metadata.implements.extend(
                            clause
                                .named_children(&mut types)
                                .map(|t| self.text(t).to_string()),
                        );
                    }
                    // JavaScript: `class A extends B`
                    _ => symbol.metadata.extends.push(self.text(clause).to_string()),
                }
            }
        }
        self.out.symbols.push(symbol);
    }

    fn interface(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let mut symbol = self.symbol(name, SymbolKind::Interface, node);
        let mut cursor = node.walk();
        for clause in node
            .children(&mut cursor)
            .filter(|c| c.kind() == "extends_type_clause")
        {
            let mut types = clause.walk();
            symbol.metadata.extends.extend(
                clause
                    .named_children(&mut types)
                    .map(|t| self.text(t).to_string()),
            );
        }
        self.out.symbols.push(symbol);
    }

    fn type_alias(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let mut symbol = self.symbol(name, SymbolKind::Type, node);
        symbol.metadata.type_annotation = self.field_text(node, "value").map(squash);
        self.out.symbols.push(symbol);
    }

    fn enumeration(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let symbol = self.symbol(name, SymbolKind::Enum, node);
        let member_scope = symbol.member_scope();

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                let value_name = match member.kind() {
                    "property_identifier" | "string" => Some(self.text(member)),
                    "enum_assignment" => self.field_text(member, "name"),
                    _ => None,
                };
                if let Some(value_name) = value_name {
                    let value_name = value_name.trim_matches(|c| c == '"' || c == '\'');
                    let mut value = Symbol::new(
                        value_name,
                        SymbolKind::EnumValue,
                        member_scope.as_str(),
                        self.location(member),
                        self.language,
                    );
                    value.signature = squash(self.text(member));
                    self.out.symbols.push(value);
                }
            }
        }
        self.out.symbols.push(symbol);
    }

    /// `namespace A.B {}` and `declare module "x" {}`
    fn namespace(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let name = name.trim_matches(|c| c == '"' || c == '\'');
        let kind = if node.kind() == "internal_module" {
            SymbolKind::Namespace
        } else {
            SymbolKind::Module
        };
        let symbol = self.symbol(name, kind, node);
        self.out.symbols.push(symbol);
    }

    fn method(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let mut cursor = node.walk();
        let tokens: Vec<&str> = node.children(&mut cursor).map(|c| c.kind()).collect();
        let is_accessor = tokens.contains(&"get") || tokens.contains(&"set");

        let kind = if is_accessor {
            SymbolKind::Property
        } else {
            SymbolKind::Method
        };
        let mut symbol = self.symbol(name, kind, node);
        symbol.is_exported = false;
        symbol.is_static = tokens.contains(&"static");
        symbol.is_abstract = node.kind() == "abstract_method_signature" || tokens.contains(&"abstract");
        symbol.visibility = member_visibility(self.parsed, node, name_node);
        symbol.metadata.decorators = decorators_of(self.parsed, node);

        let class_scope = symbol.scope.clone();
        self.fill_callable(&mut symbol, node, Some(class_scope.as_str()));
        self.out.symbols.push(symbol);
    }

    fn field(&mut self, node: Node) {
        let name_node = node
            .child_by_field_name("name")
            .or_else(|| node.child_by_field_name("property"));
        let Some(name_node) = name_node else {
            return;
        };
        let name = self.text(name_node);
        let value = node.child_by_field_name("value");
        let function_value = value.filter(|v| is_function_node(*v));

        let kind = if function_value.is_some() {
            SymbolKind::Method
        } else if node.kind() == "property_signature" {
            SymbolKind::Property
        } else {
            SymbolKind::Field
        };
        let mut symbol = self.symbol(name, kind, node);
        symbol.is_exported = false;
        let mut cursor = node.walk();
        symbol.is_static = node.children(&mut cursor).any(|c| c.kind() == "static");
        symbol.visibility = member_visibility(self.parsed, node, name_node);
        symbol.metadata.type_annotation = self
            .field_text(node, "type")
            .map(type_text)
            .or_else(|| value.and_then(|v| constructed_type(self.parsed, v)));

        if let Some(function) = function_value {
            self.fill_callable(&mut symbol, function, None);
        }
        self.out.symbols.push(symbol);
    }

    fn variable(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let value = node.child_by_field_name("value");
        if name_node.kind() != "identifier" {
            // const { a, b } = require("./x")
            if let Some(call) = value.and_then(|v| require_call(self.parsed, v)) {
                let names = pattern_names(self.parsed, name_node);
                self.require(call, None, names);
            }
            return;
        }

        let name = self.text(name_node);
        let scope = self.scope_of(node);
        let function_value = value.filter(|v| is_function_node(*v));

        if let Some(call) = value.and_then(|v| require_call(self.parsed, v)) {
            self.require(call, Some(name.to_string()), Vec::new());
        }

        let constructed = value.and_then(|v| constructed_type(self.parsed, v));
        match constructed.as_deref() {
            Some(class) => self.out.type_tracker.record_type(&scope, name, class),
            None => {
                if let Some(callee) = value.and_then(|v| called_name(self.parsed, v)) {
                    self.out.type_tracker.record_call_result(&scope, name, &callee);
                }
            }
        }

        let declaration = node.parent();
        let is_const = declaration.is_some_and(|d| {
            d.kind() == "lexical_declaration" && d.child(0).is_some_and(|k| k.kind() == "const")
        });
        let kind = if function_value.is_some() {
            SymbolKind::Function
        } else if is_const && nearest_ancestor(node, FUNCTION_KINDS).is_none() {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };

        let mut symbol = self.symbol(name, kind, node);
        symbol.is_exported = declaration.is_some_and(is_exported);
        symbol.metadata.type_annotation = self
            .field_text(node, "type")
            .map(type_text)
            .or(constructed);
        if kind == SymbolKind::Constant && !is_constant_name(name) {
            symbol
                .metadata
                .custom_fields
                .insert("binding".to_string(), "const".to_string());
        }

        if let Some(function) = function_value {
            self.fill_callable(&mut symbol, function, None);
            self.out.symbols.push(symbol);
        } else if nearest_ancestor(node, FUNCTION_KINDS).is_some() {
            self.out.locals.push(symbol);
        } else {
            self.out.symbols.push(symbol);
        }
    }

    /// `this.repo = new Repo()` inside a class method declares a field.
    fn this_assignment(&mut self, node: Node) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "member_expression"
            || self.field_text(left, "object") != Some("this")
        {
            return;
        }
        let Some(property) = self.field_text(left, "property") else {
            return;
        };
        let Some(method) = nearest_ancestor(node, &["method_definition"]) else {
            return;
        };
        let class_scope = self.scope_of(method);
        if class_scope.is_empty() {
            return;
        }

        let mut field = Symbol::new(property, SymbolKind::Field, class_scope, self.location(node), self.language);
        if property.starts_with('#') {
            field.visibility = Visibility::Private;
        }
        field.metadata.type_annotation = node
            .child_by_field_name("right")
            .and_then(|v| constructed_type(self.parsed, v));
        self.out.inferred_members.push(field);
    }

    fn import(&mut self, node: Node) {
        let Some(source) = self.field_text(node, "source") else {
            return;
        };
        let target = unquote(source);
        let mut dependency = DependencyInfo {
            source_file: self.parsed.path.clone(),
            target_module: target.to_string(),
            is_relative: target.starts_with('.'),
            import_kind: ImportKind::Import,
            location: self.location(node),
            ..DependencyInfo::default()
        };

        let mut cursor = node.walk();
        for clause in node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "import_clause")
        {
            let mut parts = clause.walk();
            for part in clause.named_children(&mut parts) {
                match part.kind() {
                    "identifier" => {
                        let binding = self.text(part).to_string();
                        dependency
                            .symbol_aliases
                            .push((DEFAULT_EXPORT.to_string(), binding.clone()));
                        dependency.imported_symbols.push(binding);
                    }
                    "namespace_import" => {
                        dependency.import_alias = part.named_child(0).map(|n| self.text(n).to_string());
                        dependency.imported_symbols = vec!["*".to_string()];
                        dependency.import_kind = ImportKind::WildcardImport;
                    }
                    "named_imports" => self.specifiers(part, &mut dependency),
                    _ => {}
                }
            }
        }
        self.out.dependencies.push(dependency);
    }

    /// `{ a, b as c }` of an import or re-export.
    fn specifiers(&self, list: Node, dependency: &mut DependencyInfo) {
        let mut cursor = list.walk();
        for specifier in list.named_children(&mut cursor) {
            let Some(original) = self.field_text(specifier, "name") else {
                continue;
            };
            dependency.imported_symbols.push(original.to_string());
            if let Some(alias) = self.field_text(specifier, "alias") {
                if alias != original {
                    dependency
                        .symbol_aliases
                        .push((original.to_string(), alias.to_string()));
                }
            }
        }
    }

    /// Re-exports become dependencies; `export { a }` marks local names.
    fn export(&mut self, node: Node) {
        if let Some(name) = self.default_export_name(node) {
            self.out.default_export = Some(name.to_string());
        }
        let clause = {
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "export_clause");
            found
        };

        let Some(source) = self.field_text(node, "source") else {
            if let Some(clause) = clause {
                let mut cursor = clause.walk();
                for specifier in clause.named_children(&mut cursor) {
                    if let Some(name) = self.field_text(specifier, "name") {
                        self.exported_names.push(name.to_string());
                    }
                }
            }
            return;
        };

        let target = unquote(source);
        let mut dependency = DependencyInfo {
            source_file: self.parsed.path.clone(),
            target_module: target.to_string(),
            is_relative: target.starts_with('.'),
            import_kind: ImportKind::Reexport,
            location: self.location(node),
            ..DependencyInfo::default()
        };
        match clause {
            Some(clause) => self.specifiers(clause, &mut dependency),
            None => dependency.imported_symbols.push("*".to_string()),
        }
        self.out.dependencies.push(dependency);
    }

    /// `export default class A {}`, `export default function f() {}` or
    /// `export default A;`.
    fn default_export_name(&self, node: Node) -> Option<&'p str> {
        let mut cursor = node.walk();
        let is_default = node.children(&mut cursor).any(|c| c.kind() == "default");
        if !is_default {
            return None;
        }
        if let Some(declaration) = node.child_by_field_name("declaration") {
            return self.field_text(declaration, "name");
        }
        let value = node.child_by_field_name("value")?;
        match value.kind() {
            "identifier" => Some(self.text(value)),
            _ => self.field_text(value, "name"),
        }
    }

    /// `require("x")` bound to `alias` or destructured into `names`.
    fn require(&mut self, call: Node, alias: Option<String>, names: Vec<String>) {
        let Some(specifier) = call
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
            .filter(|arg| arg.kind() == "string")
        else {
            return;
        };
        let target = unquote(self.text(specifier));
        self.out.dependencies.push(DependencyInfo {
            source_file: self.parsed.path.clone(),
            target_module: target.to_string(),
            imported_symbols: names,
            import_alias: alias,
            import_kind: ImportKind::Require,
            is_relative: target.starts_with('.'),
            location: self.location(call),
            ..DependencyInfo::default()
        });
    }

    fn call(&mut self, node: Node, callee_field: &str) {
        let Some(callee) = node.child_by_field_name(callee_field) else {
            return;
        };
        let Some(callee_name) = callee_text(self.parsed, callee) else {
            return;
        };
        let mut site = CallSite::new(self.caller_id(node), callee_name, self.location(node));
        site.arguments = argument_texts(self.parsed, node.child_by_field_name("arguments"));
        self.out.calls.push(site);
    }

    /// Id of the nearest named function enclosing `node`. Anonymous
    /// callbacks are skipped; top-level code maps to the module id.
    fn caller_id(&self, node: Node) -> SymbolId {
        let mut current = node.parent();
        while let Some(ancestor) = current {
            let name = match ancestor.kind() {
                "function_declaration" | "generator_function_declaration" | "method_definition" => {
                    ancestor.child_by_field_name("name")
                }
                "arrow_function" | "function_expression" | "function" => bound_name(ancestor),
                _ => None,
            };
            if let Some(name) = name {
                return SymbolId::new(&self.parsed.path, self.text(name), &self.scope_of(ancestor));
            }
            current = ancestor.parent();
        }
        SymbolId::module(&self.parsed.path)
    }
}

fn is_function_node(node: Node) -> bool {
    matches!(node.kind(), "arrow_function" | "function_expression" | "function")
}

/// Declarations directly under `export` or `export default`.
fn is_exported(node: Node) -> bool {
    node.parent().is_some_and(|p| p.kind() == "export_statement")
}

/// `: Promise<User>` → `Promise<User>`
fn type_text(annotation: &str) -> String {
    squash(annotation.trim_start_matches(':').trim())
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`'))
}

/// Header of a declaration up to its body, or up to the initializer for
/// fields and variables.
fn signature_of(parsed: &ParsedFile, node: Node) -> String {
    let value = node.child_by_field_name("value");
    let end = node
        .child_by_field_name("body")
        .or_else(|| value.and_then(|v| v.child_by_field_name("body")))
        .map(|body| body.start_byte())
        .or_else(|| value.filter(|v| !is_function_node(*v)).map(|v| v.start_byte()))
        .unwrap_or_else(|| node.end_byte());
    let header = std::str::from_utf8(&parsed.source[node.start_byte()..end]).unwrap_or("");
    let header = squash(header);
    header
        .trim_end_matches(|c: char| c == '=' || c == '{' || c == ';' || c.is_whitespace())
        .trim_end_matches("=>")
        .trim_end()
        .to_string()
}

fn decorators_of(parsed: &ParsedFile, node: Node) -> Vec<String> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|d| {
            let text = parsed.node_text(d).trim_start_matches('@').trim();
            text.split('(').next().unwrap_or(text).trim().to_string()
        })
        .collect()
}

/// From `private`/`protected` modifiers or a `#name`.
fn member_visibility(parsed: &ParsedFile, node: Node, name: Node) -> Visibility {
    if name.kind() == "private_property_identifier" {
        return Visibility::Private;
    }
    let mut cursor = node.walk();
    let modifier = node
        .children(&mut cursor)
        .find(|c| c.kind() == "accessibility_modifier")
        .map(|m| parsed.node_text(m));
    match modifier {
        Some("private") => Visibility::Private,
        Some("protected") => Visibility::Protected,
        _ => Visibility::Public,
    }
}

/// Visibility of a constructor parameter property, if it is one.
fn parameter_property(parsed: &ParsedFile, param: Node) -> Option<Visibility> {
    let mut cursor = param.walk();
    let mut is_property = false;
    let mut visibility = Visibility::Public;
    for child in param.children(&mut cursor) {
        match child.kind() {
            "accessibility_modifier" => {
                is_property = true;
                visibility = match parsed.node_text(child) {
                    "private" => Visibility::Private,
                    "protected" => Visibility::Protected,
                    _ => Visibility::Public,
                };
            }
            "readonly" => is_property = true,
            _ => {}
        }
    }
    is_property.then_some(visibility)
}

/// Cyclomatic branches inside a body, nested functions included.
fn branch_count(parsed: &ParsedFile, body: Node) -> u32 {
    let mut count = 0;
    for_each_node(body, |node| {
        if BRANCH_KINDS.contains(&node.kind()) {
            count += 1;
        } else if node.kind() == "binary_expression" {
            if let Some(op) = node.child_by_field_name("operator") {
                if matches!(parsed.node_text(op), "&&" | "||" | "??") {
                    count += 1;
                }
            }
        }
    });
    count
}

/// Whether `node` is `a`, `this`, `a.b.c` or `this.a.b`.
fn is_member_chain(node: Node) -> bool {
    match node.kind() {
        "identifier" | "this" => true,
        "member_expression" => node
            .child_by_field_name("object")
            .is_some_and(is_member_chain),
        _ => false,
    }
}

/// Callee as written. Complex receivers (`a().b()`, `x[0].y()`) keep only
/// the property name.
fn callee_text(parsed: &ParsedFile, callee: Node) -> Option<String> {
    match callee.kind() {
        "identifier" => Some(parsed.node_text(callee).to_string()),
        "member_expression" if is_member_chain(callee) => Some(
            parsed
                .node_text(callee)
                .split_whitespace()
                .collect::<String>()
                .replace("?.", "."),
        ),
        "member_expression" => Some(
            parsed
                .node_text(callee.child_by_field_name("property")?)
                .to_string(),
        ),
        _ => None,
    }
}

fn unwrap_await(value: Node) -> Node {
    if value.kind() == "await_expression" {
        value.named_child(0).unwrap_or(value)
    } else {
        value
    }
}

/// Callee name when `value` is a (possibly awaited) call.
fn called_name(parsed: &ParsedFile, value: Node) -> Option<String> {
    let value = unwrap_await(value);
    if value.kind() != "call_expression" {
        return None;
    }
    let function = value.child_by_field_name("function")?;
    is_member_chain(function).then(|| callee_text(parsed, function))?
}

/// `new Service()` or `Service.create()`-free `Service()` → `Service`.
fn constructed_type(parsed: &ParsedFile, value: Node) -> Option<String> {
    let value = unwrap_await(value);
    match value.kind() {
        "new_expression" => value
            .child_by_field_name("constructor")
            .filter(|c| is_member_chain(*c))
            .map(|c| parsed.node_text(c).to_string()),
        _ => called_name(parsed, value).filter(|name| looks_like_type(name) && !name.contains('.')),
    }
}

/// `require("x")` call, if `value` is one.
fn require_call<'t>(parsed: &ParsedFile, value: Node<'t>) -> Option<Node<'t>> {
    let value = unwrap_await(value);
    if value.kind() != "call_expression" {
        return None;
    }
    value
        .child_by_field_name("function")
        .filter(|f| f.kind() == "identifier" && parsed.node_text(*f) == "require")
        .map(|_| value)
}

/// Names bound by `{ a, b: c }` or `[a, b]` patterns.
fn pattern_names(parsed: &ParsedFile, pattern: Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = pattern.walk();
    for child in pattern.named_children(&mut cursor) {
        match child.kind() {
            "shorthand_property_identifier_pattern" | "identifier" => {
                names.push(parsed.node_text(child).to_string())
            }
            "pair_pattern" => {
                if let Some(key) = child.child_by_field_name("key") {
                    names.push(parsed.node_text(key).to_string());
                }
            }
            _ => {}
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_with(extractor: TypeScriptExtractor, path: &str, source: &str) -> FileAnalysis {
        let parsed = extractor.parse(Path::new(path), source.as_bytes()).unwrap();
        extractor.extract(&parsed).unwrap()
    }

    fn extract_ts(source: &str) -> FileAnalysis {
        extract_with(TypeScriptExtractor::typescript(), "/project/src/app.ts", source)
    }

    #[test]
    fn test_extract_classes_and_members() {
        let source = r#"
export interface Repository extends Base {
  find(id: string): User;
  name: string;
}

export abstract class UserService implements Service {
  private static instances = 0;
  #secret = 1;

  constructor(private repo: Repository, readonly log: Logger, plain: number) {}

  async findUser(id: string, retries?: number): Promise<User> {
    if (id && retries) {
      return this.repo.find(id);
    }
    return this.repo.find("x");
  }

  get size(): number { return 1; }

  handle = (event: Event) => {
    this.findUser(event.id);
  };

  protected abstract validate(): boolean;
}

export enum Color { Red, Green = "g" }
type Id = string | number;
namespace Utils { export function helper() {} }
"#;
        let analysis = extract_ts(source);
        let table = &analysis.symbol_table;

        let repo = table.get_symbol("Repository").unwrap();
        assert_eq!(repo.kind, SymbolKind::Interface);
        assert_eq!(repo.metadata.extends, vec!["Base".to_string()]);
        assert!(repo.is_exported);
        assert_eq!(table.member("Repository", "find").unwrap().kind, SymbolKind::Method);
        assert_eq!(table.member("Repository", "name").unwrap().kind, SymbolKind::Property);

        let service = table.get_symbol("UserService").unwrap();
        assert!(service.is_abstract);
        assert_eq!(service.metadata.implements, vec!["Service".to_string()]);

        let find_user = table.member("UserService", "findUser").unwrap();
        assert_eq!(find_user.id.as_str(), "/project/src/app.ts::UserService::findUser");
        assert_eq!(find_user.metadata.return_type.as_deref(), Some("Promise<User>"));
        assert_eq!(find_user.metadata.parameters.len(), 2);
        assert!(find_user.metadata.parameters[1].is_optional);
        assert_eq!(find_user.metadata.complexity, 3);

        let instances = table.member("UserService", "instances").unwrap();
        assert!(instances.is_static);
        assert_eq!(instances.visibility, Visibility::Private);
        assert_eq!(table.member("UserService", "#secret").unwrap().visibility, Visibility::Private);
        assert_eq!(table.member("UserService", "size").unwrap().kind, SymbolKind::Property);
        assert_eq!(table.member("UserService", "handle").unwrap().kind, SymbolKind::Method);
        assert!(table.member("UserService", "validate").unwrap().is_abstract);

        let field = table.member("UserService", "repo").unwrap();
        assert_eq!(field.kind, SymbolKind::Field);
        assert_eq!(field.metadata.type_annotation.as_deref(), Some("Repository"));
        assert!(table.member("UserService", "log").is_some());
        assert!(table.member("UserService", "plain").is_none());
        assert!(table
            .local_symbol(Some("UserService::constructor"), "plain")
            .is_some());

        assert_eq!(table.get_symbol("Color").unwrap().kind, SymbolKind::Enum);
        assert_eq!(table.member("Color", "Green").unwrap().kind, SymbolKind::EnumValue);
        assert_eq!(table.get_symbol("Id").unwrap().kind, SymbolKind::Type);
        assert_eq!(table.get_symbol("Utils").unwrap().kind, SymbolKind::Namespace);
        assert!(table.member("Utils", "helper").is_some());
    }

    #[test]
    fn test_extract_imports_and_exports() {
        let source = r#"
import { UserService, Repo as Repository } from './user-service';
import * as models from "../models";
import Default from './default';
import fs from 'fs';
export { helper } from './helpers';
export * from './types';
const path = require('path');

function local() {}
export { local };
"#;
        let analysis = extract_ts(source);
        let deps = &analysis.dependencies;
        assert_eq!(deps.len(), 7);

        assert_eq!(deps[0].target_module, "./user-service");
        assert!(deps[0].is_relative);
        assert_eq!(deps[0].imported_symbols, vec!["UserService", "Repo"]);
        assert_eq!(
            deps[0].symbol_aliases,
            vec![("Repo".to_string(), "Repository".to_string())]
        );

        assert_eq!(deps[1].import_alias.as_deref(), Some("models"));
        assert_eq!(deps[1].import_kind, ImportKind::WildcardImport);
        assert_eq!(deps[2].imported_symbols, vec!["Default"]);
        assert!(!deps[3].is_relative);
        assert_eq!(deps[4].import_kind, ImportKind::Reexport);
        assert_eq!(deps[4].imported_symbols, vec!["helper"]);
        assert!(deps[5].is_wildcard());
        assert_eq!(deps[6].import_kind, ImportKind::Require);
        assert_eq!(deps[6].import_alias.as_deref(), Some("path"));

        assert!(analysis.symbol_table.get_symbol("local").unwrap().is_exported);
        assert!(analysis.symbol_table.exports.contains(&"local".to_string()));
    }

    #[test]
    fn test_default_import_and_export() {
        let importer = extract_ts("import Svc, { helper } from './svc';\n");
        assert_eq!(
            importer.dependencies[0].symbol_aliases,
            vec![("default".to_string(), "Svc".to_string())]
        );
        assert_eq!(importer.dependencies[0].imported_symbols, vec!["Svc", "helper"]);

        let class = extract_ts("export default class UserService {\n  find() {}\n}\n");
        assert_eq!(class.symbol_table.default_export.as_deref(), Some("UserService"));
        assert!(class.symbol_table.get_symbol("UserService").unwrap().is_exported);

        let named = extract_ts("function build() {}\nexport default build;\n");
        assert_eq!(named.symbol_table.default_export.as_deref(), Some("build"));
        assert!(named.symbol_table.exports.contains(&"build".to_string()));

        let none = extract_ts("export const x = 1;\n");
        assert_eq!(none.symbol_table.default_export, None);
    }

    #[test]
    fn test_extract_calls_and_callers() {
        let source = r#"
import { validateEmail } from './utils';

class UserService {
  findUser(id: string) {
    return this.repo.load(id);
  }
}

export const handler = async (email: string) => {
  const service = new UserService();
  const user = await service.findUser("1");
  [1, 2].forEach((n) => validateEmail(email));
  console.log(user);
};

handler("a@b.c");
"#;
        let analysis = extract_ts(source);
        let calls: Vec<(&str, &str)> = analysis
            .call_sites
            .iter()
            .map(|c| (c.caller_id.as_str(), c.callee_name.as_str()))
            .collect();

        assert!(calls.contains(&("/project/src/app.ts::UserService::findUser", "this.repo.load")));
        assert!(calls.contains(&("/project/src/app.ts::handler", "UserService")));
        assert!(calls.contains(&("/project/src/app.ts::handler", "service.findUser")));
        assert!(calls.contains(&("/project/src/app.ts::handler", "forEach")));
        assert!(calls.contains(&("/project/src/app.ts::handler", "validateEmail")));
        assert!(calls.contains(&("/project/src/app.ts::handler", "console.log")));
        assert!(calls.contains(&("/project/src/app.ts::<module>", "handler")));

        let table = &analysis.symbol_table;
        let handler = table.get_symbol("handler").unwrap();
        assert_eq!(handler.kind, SymbolKind::Function);
        assert!(handler.is_exported);
        assert_eq!(table.type_tracker.type_of(Some("handler"), "service"), Some("UserService"));
        assert_eq!(
            table.type_tracker.call_result_of(Some("handler"), "user"),
            Some("service.findUser")
        );
        assert!(table.local_symbol(Some("handler"), "email").is_some());
        assert!(table.local_symbol(Some("handler"), "service").is_some());
    }

    #[test]
    fn test_extract_javascript() {
        let source = r#"
const { readFile } = require('fs');
const helpers = require('./helpers');

class Cache extends Base {
  #store = new Map();

  get(key) {
    return helpers.lookup(this.#store, key);
  }
}

function build(size = 10, ...rest) {
  return new Cache();
}

module.exports = { build };
"#;
        let analysis = extract_with(TypeScriptExtractor::javascript(), "/project/lib/cache.js", source);
        assert_eq!(analysis.language, "javascript");

        let deps = &analysis.dependencies;
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].imported_symbols, vec!["readFile"]);
        assert_eq!(deps[1].import_alias.as_deref(), Some("helpers"));

        let table = &analysis.symbol_table;
        assert_eq!(table.get_symbol("Cache").unwrap().metadata.extends, vec!["Base".to_string()]);
        assert_eq!(table.member("Cache", "#store").unwrap().visibility, Visibility::Private);

        let build = table.get_symbol("build").unwrap();
        assert!(build.metadata.parameters[0].is_optional);
        assert!(build.metadata.parameters[1].is_variadic);

        assert!(analysis
            .call_sites
            .iter()
            .any(|c| c.caller_id.as_str() == "/project/lib/cache.js::Cache::get"
                && c.callee_name == "helpers.lookup"));
    }

    #[test]
    fn test_tsx_extractor() {
        let source = "export function App() { return <div onClick={() => track()} />; }\n";
        let analysis = extract_with(TypeScriptExtractor::tsx(), "/project/src/App.tsx", source);
        assert!(!analysis.has_parse_errors);
        assert!(analysis
            .call_sites
            .iter()
            .any(|c| c.caller_id.as_str() == "/project/src/App.tsx::App" && c.callee_name == "track"));
    }
}
