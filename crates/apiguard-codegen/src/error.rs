//! Error types for code generation
//!
//! Malformed definitions (unresolved references, unknown parameter
//! locations) are logged and skipped rather than reported here.

use thiserror::Error;

/// Result type for codegen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling a definition document
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse the definition document
    #[error("failed to parse definition document: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Definition document does not exist
    #[error("definition document not found: {path}")]
    DocumentNotFound {
        /// Path that was searched
        path: String,
    },

    /// Requested operation is not in the compiled document
    #[error("unknown operation '{operation_id}'")]
    UnknownOperation {
        /// Operation id that was asked for
        operation_id: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
