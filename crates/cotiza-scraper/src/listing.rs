//! Normalized listing model shared by every adapter.

use chrono::{DateTime, Utc};
use cotiza_core::SourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound of the confidence scale.
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Stock state of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Available to order
    InStock,
    /// Few units left
    Limited,
    /// Not currently available
    OutOfStock,
    /// Stock state not reported
    #[default]
    Unknown,
}

/// One quantity-based price tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPriceTier {
    /// Minimum units for this tier
    pub quantity: u32,
    /// Unit price at this tier
    pub price: f64,
    /// Currency of `price`
    pub currency: String,
}

/// Verdict attached by the product validator, kept for debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationNote {
    /// Whether the validator considered this the exact product
    pub is_exact_match: bool,
    /// Human-readable explanation
    pub reasoning: String,
    /// Validator that produced the verdict
    pub provider: String,
}

/// A normalized product offer from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Source that produced the listing
    pub source_id: SourceId,
    /// Display name of the source
    pub source_name: String,
    /// Product title as shown by the source
    pub product_name: String,
    /// Brand, when known
    pub brand: Option<String>,
    /// Model, when known
    pub model: Option<String>,
    /// Vendor SKU, when known
    pub sku: Option<String>,
    /// Unit price; 0 means the price could not be parsed
    pub price: f64,
    /// ISO-like currency code
    pub currency: String,
    /// Product page
    pub url: String,
    /// Product image
    pub image_url: Option<String>,
    /// Stock state
    pub availability: Availability,
    /// Whether an official source sells one of its official brands here
    pub is_official_source: bool,
    /// Match confidence on a 0-100 scale
    pub confidence_score: f64,
    /// Time the source took to answer
    pub response_time_ms: u64,
    /// When the listing was produced
    pub scraped_at: DateTime<Utc>,
    /// Generated placeholder rather than live data
    pub synthetic: bool,

    /// Structured technical specifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_specs: Option<BTreeMap<String, String>>,
    /// Datasheet download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasheet_url: Option<String>,
    /// CAD drawing download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cad_file_url: Option<String>,
    /// Quantity price tiers, ascending by quantity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bulk_pricing: Vec<BulkPriceTier>,
    /// Product certifications
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certifications: Vec<String>,
    /// Lead time description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_time: Option<String>,
    /// Minimum units per order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_order_quantity: Option<u32>,
    /// Warranty terms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty: Option<String>,

    /// Product validator verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationNote>,
}

impl Listing {
    /// Create a listing with the required fields; optional fields start empty.
    #[must_use]
    pub fn new(
        source_id: SourceId,
        source_name: impl Into<String>,
        product_name: impl Into<String>,
        price: f64,
        currency: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source_id,
            source_name: source_name.into(),
            product_name: product_name.into(),
            brand: None,
            model: None,
            sku: None,
            price,
            currency: currency.into(),
            url: url.into(),
            image_url: None,
            availability: Availability::Unknown,
            is_official_source: false,
            confidence_score: 0.0,
            response_time_ms: 0,
            scraped_at: Utc::now(),
            synthetic: false,
            technical_specs: None,
            datasheet_url: None,
            cad_file_url: None,
            bulk_pricing: Vec::new(),
            certifications: Vec::new(),
            lead_time: None,
            minimum_order_quantity: None,
            warranty: None,
            validation: None,
        }
    }

    /// Whether the listing has a name, a positive price and a URL.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.product_name.trim().is_empty() && self.price > 0.0 && !self.url.trim().is_empty()
    }
}

/// Clamp a confidence value into [0, 100]; NaN becomes 0.
#[must_use]
pub fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, MAX_CONFIDENCE)
    }
}
