//! Local validators that need no external service.

use crate::{
    error::Result,
    validator::{ProductValidator, ValidationRequest, ValidationVerdict},
};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Brands the heuristic validator recognizes, lowercase.
const KNOWN_BRANDS: [&str; 9] = [
    "bosch",
    "makita",
    "dewalt",
    "stanley",
    "3m",
    "caterpillar",
    "milwaukee",
    "fluke",
    "klein tools",
];

const EXACT_MATCH_SCORE: f64 = 0.85;
const EXACT_MATCH_RATIO: f64 = 0.7;

fn model_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)modelo\s+([a-z0-9\-]+)",
            r"(?i)model\s+([a-z0-9\-]+)",
            r"(?i)\b([a-z]{2,4}\d{2,4}[a-z]?)\b",
            r"(?i)\b(v\d{2})\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("model pattern is a valid regex"))
        .collect()
    })
}

/// Extract a model code ("GSB120", "V20", "modelo X") from product text, uppercased.
#[must_use]
pub fn extract_model(text: &str) -> Option<String> {
    model_patterns()
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

#[allow(clippy::cast_precision_loss)]
fn word_match_ratio(query: &str, product: &str) -> f64 {
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let matching = words.iter().filter(|w| product.contains(*w)).count();
    matching as f64 / words.len() as f64
}

/// Word-overlap and brand heuristic.
///
/// Score is `ratio * 0.6`, plus 0.3 when a known brand named in the query or
/// title is confirmed by the listing, plus 0.1 for a positive price. A
/// listing is an exact match at score >= 0.85 with ratio >= 0.7.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicValidator;

impl HeuristicValidator {
    /// Create the validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate one listing.
    #[must_use]
    pub fn validate(&self, request: &ValidationRequest) -> ValidationVerdict {
        let query = request.search_query.to_lowercase();
        let product = request.product_name.to_lowercase();
        let listing_brand = request.brand.as_deref().map(str::to_lowercase);

        let ratio = word_match_ratio(&query, &product);

        let detected = KNOWN_BRANDS
            .iter()
            .copied()
            .find(|b| query.contains(b) || product.contains(b));
        let listing_confirms = detected
            .is_some_and(|b| listing_brand.as_deref().is_some_and(|lb| lb.contains(b)));
        let brand_match = listing_confirms || detected.is_some_and(|b| product.contains(b));

        let mut score = ratio * 0.6;
        if brand_match {
            score += 0.3;
        }
        if request.price > 0.0 {
            score += 0.1;
        }
        let score = ((score * 100.0).round() / 100.0).clamp(0.0, 1.0);

        ValidationVerdict {
            is_exact_match: score >= EXACT_MATCH_SCORE && ratio >= EXACT_MATCH_RATIO,
            confidence_score: score,
            extracted_brand: if listing_confirms {
                request.brand.clone()
            } else {
                detected.map(str::to_string).or_else(|| request.brand.clone())
            },
            extracted_model: extract_model(&product),
            reasoning: format!(
                "Heuristic analysis: {:.0}% word match, brand {}",
                ratio * 100.0,
                if brand_match { "verified" } else { "not confirmed" }
            ),
            provider: self.provider_id().to_string(),
        }
    }
}

#[async_trait]
impl ProductValidator for HeuristicValidator {
    async fn batch_validate(&self, requests: &[ValidationRequest]) -> Result<Vec<ValidationVerdict>> {
        let verdicts: Vec<ValidationVerdict> = requests.iter().map(|r| self.validate(r)).collect();

        debug!(
            provider = self.provider_id(),
            total = verdicts.len(),
            exact_matches = verdicts.iter().filter(|v| v.is_exact_match).count(),
            "validated batch"
        );

        Ok(verdicts)
    }

    fn provider_id(&self) -> &str {
        "heuristic"
    }
}

/// Keyword validator used when heuristic validation is switched off.
///
/// Scores 0.75 when any query word longer than three characters appears in
/// the title, otherwise 0.45.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordValidator;

impl KeywordValidator {
    /// Create the validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate one listing.
    #[must_use]
    pub fn validate(&self, request: &ValidationRequest) -> ValidationVerdict {
        let query = request.search_query.to_lowercase();
        let product = request.product_name.to_lowercase();

        let has_common_word = query
            .split_whitespace()
            .any(|w| w.chars().count() > 3 && product.contains(w));
        let score = if has_common_word { 0.75 } else { 0.45 };

        ValidationVerdict {
            is_exact_match: score > 0.7,
            confidence_score: score,
            extracted_brand: request.brand.clone(),
            extracted_model: None,
            reasoning: "Keyword match without model analysis".to_string(),
            provider: self.provider_id().to_string(),
        }
    }
}

#[async_trait]
impl ProductValidator for KeywordValidator {
    async fn batch_validate(&self, requests: &[ValidationRequest]) -> Result<Vec<ValidationVerdict>> {
        Ok(requests.iter().map(|r| self.validate(r)).collect())
    }

    fn provider_id(&self) -> &str {
        "keyword"
    }
}
