//! Filter and ranking stages.

use cotiza_scraper::Listing;
use std::cmp::Ordering;

/// Thresholds applied by [`filter_listings`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOptions {
    /// Keep only listings from official sellers
    pub official_only: bool,
    /// Accept close matches; when false `exact_match_confidence` applies
    pub alternatives: bool,
    /// Minimum confidence for any listing
    pub min_confidence: f64,
    /// Minimum confidence in exact-match mode
    pub exact_match_confidence: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            official_only: false,
            alternatives: false,
            min_confidence: 50.0,
            exact_match_confidence: 70.0,
        }
    }
}

/// Drop listings that fail any filter stage.
///
/// Stages, in order: invalid listings (blank name, price <= 0, blank URL),
/// non-official listings when `official_only`, listings below
/// `min_confidence`, and listings below `exact_match_confidence` unless
/// `alternatives` is set.
#[must_use]
pub fn filter_listings(listings: Vec<Listing>, options: &FilterOptions) -> Vec<Listing> {
    listings
        .into_iter()
        .filter(Listing::is_valid)
        .filter(|l| !options.official_only || l.is_official_source)
        .filter(|l| l.confidence_score >= options.min_confidence)
        .filter(|l| options.alternatives || l.confidence_score >= options.exact_match_confidence)
        .collect()
}

/// Ranking order: official first, then confidence descending, then price ascending.
#[must_use]
pub fn compare_listings(a: &Listing, b: &Listing) -> Ordering {
    b.is_official_source
        .cmp(&a.is_official_source)
        .then_with(|| b.confidence_score.total_cmp(&a.confidence_score))
        .then_with(|| a.price.total_cmp(&b.price))
}

/// Sort in ranking order. Equal keys keep their incoming order.
pub fn sort_listings(listings: &mut [Listing]) {
    listings.sort_by(compare_listings);
}
