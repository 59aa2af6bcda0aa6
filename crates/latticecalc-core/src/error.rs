//! Error types for latticecalc-core.

use thiserror::Error;

/// Usage errors a caller can get back from a [`crate::Sheet`] operation.
/// Each leaves the sheet in its pre-call state.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum SheetError {
    #[error("invalid position")]
    InvalidPosition,

    #[error("formula syntax error: {0}")]
    FormulaSyntax(String),

    #[error("circular dependency detected")]
    CircularDependency,

    #[error("operation would grow the table past its maximum size")]
    TableTooBig,
}

pub type Result<T> = std::result::Result<T, SheetError>;
