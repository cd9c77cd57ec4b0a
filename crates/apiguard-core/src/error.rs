//! Error types for apiguard-core
//!
//! Validation outcomes are not errors; see [`crate::rules::Outcome`].

use thiserror::Error;

/// Result type alias for apiguard-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in apiguard-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// A wire payload could not be turned into the requested model
    #[error("cannot convert payload into '{model}': {source}")]
    Conversion {
        /// Name of the target model
        model: String,
        /// Underlying deserialization error
        source: serde_json::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
