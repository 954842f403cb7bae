//! Error types for the semantic core.

use std::path::PathBuf;

use thiserror::Error;

/// A single lookup that did not succeed. Always recovered by the resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("import not found: {import} (tried {})", .tried.join(", "))]
    ImportNotFound { import: String, tried: Vec<String> },

    #[error("external module: {0}")]
    ExternalModule(String),

    #[error("member {member} not found in {kind} {container}")]
    MemberNotFound {
        member: String,
        kind: String,
        container: String,
    },

    #[error("cannot infer type of {0}")]
    TypeUnknown(String),
}

/// Errors that abort an analysis.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("project root is not a directory: {}", .0.display())]
    InvalidProjectRoot(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}
