//! Symbol records shared by every pass.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the file, scope and name parts of a [`SymbolId`].
pub const ID_SEPARATOR: &str = "::";

/// Deterministic identifier of a declared symbol.
///
/// Built from file path, enclosing scope label and name, so analyzing the
/// same input twice yields identical ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    /// Name of the pseudo-symbol standing for a whole file.
    pub const MODULE: &'static str = "<module>";
    /// Prefix shared by all builtin ids.
    pub const BUILTIN: &'static str = "<builtin>";

    /// Build the id for `name` declared in `scope` of `file_path`.
    pub fn new(file_path: &str, name: &str, scope: &str) -> Self {
        if scope.is_empty() {
            Self(format!("{file_path}{ID_SEPARATOR}{name}"))
        } else {
            Self(format!("{file_path}{ID_SEPARATOR}{scope}{ID_SEPARATOR}{name}"))
        }
    }

    /// Id of the module-level pseudo-symbol of a file.
    ///
    /// Also used as the caller id of calls made outside any function.
    pub fn module(file_path: &str) -> Self {
        Self::new(file_path, Self::MODULE, "")
    }

    /// Synthetic id of a language builtin.
    pub fn builtin(name: &str) -> Self {
        Self(format!("{}{ID_SEPARATOR}{name}", Self::BUILTIN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_builtin(&self) -> bool {
        self.0
            .strip_prefix(Self::BUILTIN)
            .is_some_and(|rest| rest.starts_with(ID_SEPARATOR))
    }

    pub fn is_module(&self) -> bool {
        self.0.ends_with(&format!("{ID_SEPARATOR}{}", Self::MODULE))
    }

    /// The `scope::name` part of an id declared in `file_path`.
    ///
    /// Returns `None` for ids of other files and for module pseudo-symbols.
    pub fn scope_label(&self, file_path: &str) -> Option<&str> {
        let rest = self
            .0
            .strip_prefix(file_path)?
            .strip_prefix(ID_SEPARATOR)?;
        if rest.is_empty() || rest == Self::MODULE {
            None
        } else {
            Some(rest)
        }
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SymbolId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SymbolId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Variable,
    Parameter,
    Field,
    Property,
    Enum,
    EnumValue,
    Module,
    Namespace,
    Constant,
    Type,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Variable => "variable",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumValue => "enum_value",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Constant => "constant",
            SymbolKind::Type => "type",
        }
    }

    /// Functions and methods.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }

    /// Kinds that introduce a named scope tracked in `nested_scopes`.
    pub fn opens_scope(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Module | SymbolKind::Namespace
        )
    }

    /// Kinds whose members can be reached with `container.member`.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Interface
                | SymbolKind::Module
                | SymbolKind::Namespace
                | SymbolKind::Enum
        )
    }

    /// Kinds that hold a value of some other type.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            SymbolKind::Variable
                | SymbolKind::Parameter
                | SymbolKind::Field
                | SymbolKind::Property
                | SymbolKind::Constant
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared visibility of a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    /// Python dunder names such as `__init__`.
    Magic,
}

impl Visibility {
    /// Visibility implied by Python naming conventions.
    pub fn from_python_name(name: &str) -> Self {
        if name.starts_with("__") && name.ends_with("__") && name.len() > 4 {
            Visibility::Magic
        } else if name.starts_with("__") {
            Visibility::Private
        } else if name.starts_with('_') {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }
}

/// A location within a source file.
///
/// Lines are 1-indexed, columns 0-indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_col: usize,
    pub end_col: usize,
}

impl FileLocation {
    /// Create a location from a tree-sitter node.
    pub fn from_node(file_path: &str, node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            file_path: file_path.to_string(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            end_line: end.row + 1,
            start_col: start.column,
            end_col: end.column,
        }
    }

    /// Number of lines spanned.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.start_line, self.start_col)
    }
}

/// A function or method parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    /// `*args`, `**kwargs`, `...rest`
    #[serde(default)]
    pub is_variadic: bool,
}

/// Free-form metadata attached to a symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Declared type of a variable, field or parameter, or the class it
    /// was constructed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterInfo>,
    /// Python decorators, TypeScript decorators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    /// Base classes or extended interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<String>,
    #[serde(default)]
    pub line_count: usize,
    /// Branch count plus one.
    #[serde(default)]
    pub complexity: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, String>,
}

/// A single declared symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub location: FileLocation,
    /// Enclosing scope label; empty at module level.
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_exported: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub metadata: SymbolMeta,
}

impl Symbol {
    /// Create a symbol, deriving its id from location, scope and name.
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        scope: impl Into<String>,
        location: FileLocation,
        language: &str,
    ) -> Self {
        let name = name.into();
        let scope = scope.into();
        Self {
            id: SymbolId::new(&location.file_path, &name, &scope),
            metadata: SymbolMeta {
                line_count: location.line_count(),
                ..SymbolMeta::default()
            },
            name,
            kind,
            location,
            scope,
            signature: String::new(),
            visibility: Visibility::Public,
            is_exported: false,
            is_static: false,
            is_abstract: false,
            language: language.to_string(),
        }
    }

    /// The module pseudo-symbol for a whole file, named after the module.
    pub fn module(file_path: &str, module_name: &str, language: &str) -> Self {
        Self {
            id: SymbolId::module(file_path),
            ..Self::new(
                module_name,
                SymbolKind::Module,
                "",
                FileLocation {
                    file_path: file_path.to_string(),
                    ..FileLocation::default()
                },
                language,
            )
        }
    }

    /// Scope label of this symbol's own members (`scope::name`).
    pub fn member_scope(&self) -> String {
        if self.scope.is_empty() {
            self.name.clone()
        } else {
            format!("{}{ID_SEPARATOR}{}", self.scope, self.name)
        }
    }

    /// Best declared type for value symbols.
    pub fn declared_type(&self) -> Option<&str> {
        self.metadata
            .type_annotation
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}

/// Reduce a written type to the bare name of the type it refers to.
///
/// `Promise<User>` → `Promise`, `models.User` → `User`,
/// `User | null` → `User`, `Optional[User]` → `Optional`.
pub fn base_type_name(type_name: &str) -> &str {
    let trimmed = type_name.trim().trim_start_matches(':').trim();
    let end = trimmed
        .find(|c: char| matches!(c, '<' | '[' | '|' | '(' | ' ' | '&'))
        .unwrap_or(trimmed.len());
    let head = &trimmed[..end];
    head.rsplit('.').next().unwrap_or(head)
}
