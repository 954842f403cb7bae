//! Whole-project semantic linking.
//!
//! Pass 1 front ends (see [`crate::extract`]) produce one [`FileAnalysis`]
//! per file. The [`Resolver`] then links imports to files and call sites to
//! the declarations they invoke, producing a [`SemanticGraph`].

pub mod error;
pub mod facts;
pub mod graph;
pub mod languages;
pub mod resolver;
pub mod strategy;
pub mod symbol;
pub mod table;

pub use error::{ResolveError, SemanticError};
pub use facts::{CallSite, DependencyInfo, FileAnalysis, ImportKind, DEFAULT_EXPORT};
pub use graph::{SemanticGraph, SemanticStats};
pub use languages::{PythonStrategy, TypeScriptStrategy};
pub use resolver::{ResolutionSummary, Resolver, Tactic};
pub use strategy::{LanguageStrategy, ResolutionContext, StrategyRegistry};
pub use symbol::{FileLocation, ParameterInfo, Symbol, SymbolId, SymbolKind, SymbolMeta, Visibility};
pub use table::{SymbolTable, TypeTracker};
