//! Product validator contract and request/verdict types.

use crate::error::{Result, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for validators that judge whether a listing is the product searched for.
///
/// Implementations must be thread-safe (Send + Sync); the pipeline shares
/// one validator across concurrent searches.
#[async_trait]
pub trait ProductValidator: Send + Sync {
    /// Validate a batch of listings.
    ///
    /// Returns exactly one verdict per request, in request order.
    ///
    /// # Errors
    /// Returns error if the validator backend fails.
    async fn batch_validate(&self, requests: &[ValidationRequest]) -> Result<Vec<ValidationVerdict>>;

    /// Get the unique identifier for this validator.
    fn provider_id(&self) -> &str;

    /// Report whether the validator is active.
    fn status(&self) -> ValidatorStatus {
        ValidatorStatus {
            provider: self.provider_id().to_string(),
            enabled: true,
        }
    }
}

/// One listing to validate against the search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Product text as typed by the user
    pub search_query: String,
    /// Listing title
    pub product_name: String,
    /// Listing brand, when known
    pub brand: Option<String>,
    /// Listing price
    pub price: f64,
    /// Currency of `price`
    pub currency: String,
    /// Type of the source that produced the listing
    pub source_type: String,
}

/// Validator judgement for one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the listing is the exact product searched for
    pub is_exact_match: bool,
    /// Confidence in [0, 1]
    pub confidence_score: f64,
    /// Brand recognized by the validator
    pub extracted_brand: Option<String>,
    /// Model recognized by the validator
    pub extracted_model: Option<String>,
    /// Human-readable explanation
    pub reasoning: String,
    /// Validator that produced the verdict
    pub provider: String,
}

/// Active validator as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStatus {
    /// Validator identifier
    pub provider: String,
    /// Whether validation is switched on
    pub enabled: bool,
}

/// Check that a validator answered once per request.
///
/// # Errors
/// Returns [`ValidationError::LengthMismatch`] when the counts differ.
pub fn ensure_same_length(requests: &[ValidationRequest], verdicts: &[ValidationVerdict]) -> Result<()> {
    if requests.len() == verdicts.len() {
        Ok(())
    } else {
        Err(ValidationError::LengthMismatch {
            expected: requests.len(),
            actual: verdicts.len(),
        })
    }
}
