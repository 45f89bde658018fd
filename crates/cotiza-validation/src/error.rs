//! Error types for product validation.

use thiserror::Error;

/// Errors raised by a product validator.
///
/// The search pipeline treats any of these as a collaborator failure and
/// keeps its heuristic confidence scores.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Validator backend failed
    #[error("validator error ({provider}): {message}")]
    Provider {
        /// Validator name
        provider: String,
        /// Error message
        message: String,
    },

    /// Validator answered with a different number of verdicts than requests
    #[error("validator returned {actual} verdicts for {expected} requests")]
    LengthMismatch {
        /// Number of requests sent
        expected: usize,
        /// Number of verdicts received
        actual: usize,
    },
}

/// Result type for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;
