//! Core error types for the Cotiza workspace.
//!
//! `CotizaError` covers the shared newtypes; configuration has its own
//! `ConfigError`. Each crate owns an error enum for its own failures.

use thiserror::Error;

/// Central error type for Cotiza operations.
#[derive(Error, Debug)]
pub enum CotizaError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid input (identifiers, country codes)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `CotizaError`.
pub type Result<T> = std::result::Result<T, CotizaError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
