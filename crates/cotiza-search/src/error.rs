//! Error types for the search pipeline.

use cotiza_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors surfaced by a search.
///
/// Source and validator failures never appear here; they degrade the
/// response instead.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Request is missing a product or carries malformed parameters
    #[error("invalid search request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request
        reason: String,
    },

    /// Pipeline could not be built from configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client construction failed
    #[error("scraper setup failed: {0}")]
    Scraper(#[from] cotiza_scraper::ScrapeError),
}

impl SearchError {
    /// Structured payload for an invalid request, `None` for other errors.
    #[must_use]
    pub fn invalid_request_payload(&self) -> Option<InvalidRequest> {
        match self {
            Self::InvalidRequest { reason } => Some(InvalidRequest::new(reason.clone())),
            Self::Config(_) | Self::Scraper(_) => None,
        }
    }
}

/// Payload returned to callers for a malformed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRequest {
    /// What is wrong
    pub error: String,
    /// Shape of a valid request
    pub expected: String,
    /// A valid request
    pub example: String,
}

impl InvalidRequest {
    /// Payload for `reason` with the standard request description.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error: reason.into(),
            expected: "product (required, non-empty); country (2-3 letter code) or \
                       countries (list of codes, or [\"ALL\"]); max_results (> 0); \
                       alternatives (bool); official_only (bool)"
                .to_string(),
            example: r#"{"product": "taladro bosch", "country": "PE"}"#.to_string(),
        }
    }
}

impl fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expected: {})", self.error, self.expected)
    }
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
