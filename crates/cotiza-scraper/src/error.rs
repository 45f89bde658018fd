//! Error types for listing fetches.

use cotiza_core::SourceId;
use thiserror::Error;

/// Errors raised while fetching or extracting listings from one source.
///
/// None of these abort a search: the fetcher converts them into an empty
/// (or synthetic) result for the affected source.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Source could not be reached or has no usable adapter
    #[error("source {source_id} unavailable: {reason}")]
    SourceUnavailable {
        /// Affected source
        source_id: SourceId,
        /// Why the source is unavailable
        reason: String,
    },

    /// Source did not answer within the allotted time
    #[error("source {source_id} timed out after {seconds}s")]
    Timeout {
        /// Affected source
        source_id: SourceId,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Source answered with a non-success HTTP status
    #[error("source {source_id} answered HTTP {status}")]
    UnexpectedStatus {
        /// Affected source
        source_id: SourceId,
        /// HTTP status code
        status: u16,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A result element was missing an expected field
    #[error("extraction failed for {source_id}: {reason}")]
    Extraction {
        /// Affected source
        source_id: SourceId,
        /// Missing or malformed field
        reason: String,
    },

    /// A configured CSS selector does not parse
    #[error("invalid selector for {source_id}: {selector}")]
    InvalidSelector {
        /// Affected source
        source_id: SourceId,
        /// Offending selector text
        selector: String,
    },
}

/// Result type for listing fetches.
pub type Result<T> = std::result::Result<T, ScrapeError>;
