//! Built-in language strategies.

mod python;
pub(crate) mod typescript;

pub use python::PythonStrategy;
pub use typescript::TypeScriptStrategy;
