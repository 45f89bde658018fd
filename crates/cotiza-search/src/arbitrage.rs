//! Cross-country price comparison for global searches.

use cotiza_core::SourceId;
use cotiza_scraper::Listing;
use cotiza_sources::SourceRegistry;
use serde::{Deserialize, Serialize};

/// Country codes recognized in source ids, checked in this order.
const ID_COUNTRY_SUFFIXES: [&str; 7] = ["pe", "mx", "us", "ar", "cl", "de", "uk"];

/// Delivery estimate when a country pair is missing from the matrix.
const DEFAULT_DELIVERY_DAYS: u32 = 14;

/// Savings above which importing is the recommended action.
const IMPORT_THRESHOLD: f64 = 15.0;

/// Savings above which the recommendation text suggests importing.
const SIGNIFICANT_SAVINGS: f64 = 20.0;

/// Estimated delivery days, `(from, to, days)`.
const DELIVERY_MATRIX: &[(&str, &str, u32)] = &[
    ("US", "PE", 7),
    ("US", "MX", 3),
    ("US", "AR", 10),
    ("US", "CL", 8),
    ("US", "BR", 9),
    ("DE", "PE", 12),
    ("DE", "US", 5),
    ("DE", "UK", 2),
    ("DE", "FR", 1),
    ("DE", "ES", 2),
    ("PE", "CL", 3),
    ("PE", "AR", 4),
    ("PE", "BR", 5),
    ("PE", "MX", 8),
    ("PE", "US", 7),
];

/// Cheapest listing across every country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPrice {
    /// Country derived from the listing's source
    pub country: String,
    /// Source display name
    pub source: String,
    /// Listing price
    pub price: f64,
    /// Currency of `price`
    pub currency: String,
    /// Product page
    pub url: String,
}

/// Cheapest listing with its estimated delivery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestTotalCost {
    /// Country derived from the listing's source
    pub country: String,
    /// Source display name
    pub source: String,
    /// Price plus shipping; shipping is not estimated yet
    pub total_cost: f64,
    /// Estimated days to reach the requester's country
    pub delivery_days: u32,
}

/// Whether to import or buy locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    /// Import from the cheapest country
    #[serde(rename = "importar")]
    Import,
    /// Buy in the requester's country
    #[serde(rename = "comprar_local")]
    BuyLocal,
}

/// Savings of the global best price over the local best price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsAnalysis {
    /// Percentage saved, rounded
    pub max_savings: f64,
    /// Action implied by `max_savings`
    pub recommended_action: RecommendedAction,
}

/// Arbitrage summary attached to global search responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalAnalysis {
    /// Cheapest listing overall
    pub best_price: Option<BestPrice>,
    /// Cheapest listing with delivery estimate
    pub best_total_cost: Option<BestTotalCost>,
    /// Listings from the requester's country
    pub local_availability: Vec<Listing>,
    /// Recommendation sentence
    pub strategic_recommendation: String,
    /// Savings figures
    pub savings_analysis: SavingsAnalysis,
}

/// Country a listing's source operates in.
///
/// Looks for a known country segment in the id (`grainger-us` is `US`),
/// then asks the registry, then gives up with `UNKNOWN`.
#[must_use]
pub fn country_from_source_id(source_id: &SourceId, registry: &SourceRegistry) -> String {
    let segments: Vec<&str> = source_id.segments().skip(1).collect();
    if let Some(code) = ID_COUNTRY_SUFFIXES
        .iter()
        .find(|code| segments.contains(code))
    {
        return code.to_uppercase();
    }

    registry
        .get_source_by_id(source_id)
        .map_or_else(|_| "UNKNOWN".to_string(), |d| d.country.to_string())
}

/// Estimated delivery days from one country to another.
#[must_use]
pub fn estimate_delivery_days(from: &str, to: &str) -> u32 {
    if from.eq_ignore_ascii_case(to) {
        return 1;
    }

    DELIVERY_MATRIX
        .iter()
        .find(|(f, t, _)| f.eq_ignore_ascii_case(from) && t.eq_ignore_ascii_case(to))
        .map_or(DEFAULT_DELIVERY_DAYS, |(_, _, days)| *days)
}

/// Compare filtered results across countries for a requester in `local_country`.
#[must_use]
pub fn analyze_global(results: &[Listing], local_country: &str, registry: &SourceRegistry) -> GlobalAnalysis {
    let best_price = results
        .iter()
        .fold(None::<&Listing>, |best, l| match best {
            Some(b) if b.price <= l.price => Some(b),
            _ => Some(l),
        })
        .map(|l| BestPrice {
            country: country_from_source_id(&l.source_id, registry),
            source: l.source_name.clone(),
            price: l.price,
            currency: l.currency.clone(),
            url: l.url.clone(),
        });

    let best_total_cost = best_price.as_ref().map(|b| BestTotalCost {
        country: b.country.clone(),
        source: b.source.clone(),
        total_cost: b.price,
        delivery_days: estimate_delivery_days(&b.country, local_country),
    });

    let local_availability: Vec<Listing> = results
        .iter()
        .filter(|l| country_from_source_id(&l.source_id, registry).eq_ignore_ascii_case(local_country))
        .cloned()
        .collect();

    let local_best = local_availability
        .iter()
        .map(|l| l.price)
        .fold(f64::INFINITY, f64::min);
    let global_best = best_price.as_ref().map_or(0.0, |b| b.price);

    let savings = if local_best.is_finite() && local_best > 0.0 && global_best > 0.0 {
        (local_best - global_best) / local_best * 100.0
    } else {
        0.0
    };

    let best_country = best_price.as_ref().map_or("UNKNOWN", |b| b.country.as_str());
    let strategic_recommendation = if savings > SIGNIFICANT_SAVINGS {
        format!("Significant saving of {savings:.1}% buying from {best_country}. Consider importing.")
    } else if !local_availability.is_empty() {
        format!("Best option: buy locally in {local_country} for immediate delivery.")
    } else {
        format!("Product available in {best_country}. Weigh importing against urgency.")
    };

    GlobalAnalysis {
        best_price,
        best_total_cost,
        local_availability,
        strategic_recommendation,
        savings_analysis: SavingsAnalysis {
            max_savings: savings.round(),
            recommended_action: if savings > IMPORT_THRESHOLD {
                RecommendedAction::Import
            } else {
                RecommendedAction::BuyLocal
            },
        },
    }
}
