//! Error types for the source catalog subsystem.

use thiserror::Error;

/// Errors that can occur in source catalog operations.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Source not found in the registry
    #[error("source not found: {source_id}")]
    NotFound {
        /// The source ID that was not found
        source_id: String,
    },

    /// Failed to read a catalog file
    #[error("failed to load source catalog from {path}: {source}")]
    Load {
        /// Path to the catalog file
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Failed to parse catalog TOML
    #[error("failed to parse source catalog TOML in {path}: {source}")]
    Parse {
        /// Path (or label) of the catalog
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// Invalid source descriptor (validation failed)
    #[error("invalid source descriptor for {source_id}: {reason}")]
    Validation {
        /// Source ID being validated
        source_id: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Invalid identifier or country code
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] cotiza_core::CotizaError),
}

/// Result type for source catalog operations.
pub type Result<T> = std::result::Result<T, SourceError>;
