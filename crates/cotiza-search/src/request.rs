//! Search request and response types.

use crate::{
    arbitrage::GlobalAnalysis,
    error::{Result, SearchError},
};
use chrono::{DateTime, Utc};
use cotiza_core::CountryCode;
use cotiza_scraper::Listing;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product search as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Product text to look for
    pub product: String,
    /// Requester's country; single-country mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Countries for global mode; `["ALL"]` selects every source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    /// Per-source cap on listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    /// Relax the exact-match threshold
    pub alternatives: bool,
    /// Keep only listings from official sellers
    pub official_only: bool,
}

/// Which sources a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Sources serving one country
    Country(CountryCode),
    /// Sources serving any of these countries (`ALL` for every source)
    Global(Vec<CountryCode>),
}

impl SearchRequest {
    /// Single-country request for `product`.
    #[must_use]
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            ..Self::default()
        }
    }

    /// Set the requester's country.
    #[must_use]
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Switch to global mode over `countries`.
    #[must_use]
    pub fn countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = Some(countries.into_iter().map(Into::into).collect());
        self
    }

    /// Cap listings per source.
    #[must_use]
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Accept close matches as well as exact ones.
    #[must_use]
    pub fn alternatives(mut self, alternatives: bool) -> Self {
        self.alternatives = alternatives;
        self
    }

    /// Keep only official sellers.
    #[must_use]
    pub fn official_only(mut self, official_only: bool) -> Self {
        self.official_only = official_only;
        self
    }

    /// Whether the request runs in global mode.
    ///
    /// An empty `countries` list falls back to single-country mode.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.countries.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Check the request and resolve its scope.
    ///
    /// `default_country` applies when neither `country` nor `countries` is set.
    /// When both are set, `countries` wins.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidRequest`] for a blank product, a zero
    /// `max_results` or a malformed country code.
    pub fn validate(&self, default_country: &str) -> Result<SearchScope> {
        if self.product.trim().is_empty() {
            return Err(invalid("product is required and must not be blank"));
        }

        if self.max_results == Some(0) {
            return Err(invalid("max_results must be greater than 0"));
        }

        if self.is_global() {
            let countries = self
                .countries
                .iter()
                .flatten()
                .map(|code| parse_country(code))
                .collect::<Result<Vec<_>>>()?;
            return Ok(SearchScope::Global(countries));
        }

        let country = self.country.as_deref().unwrap_or(default_country);
        let country = parse_country(country)?;
        if country.is_all() {
            return Err(invalid("ALL is only valid in countries"));
        }
        Ok(SearchScope::Country(country))
    }

    /// Country whose listings count as local.
    #[must_use]
    pub fn local_country<'a>(&'a self, default_country: &'a str) -> &'a str {
        self.country.as_deref().unwrap_or(default_country)
    }
}

fn parse_country(code: &str) -> Result<CountryCode> {
    CountryCode::new(code).map_err(|_| invalid(&format!("invalid country code '{code}'")))
}

fn invalid(reason: &str) -> SearchError {
    SearchError::InvalidRequest {
        reason: reason.to_string(),
    }
}

/// Outcome of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Correlation id of this search
    pub search_id: Uuid,
    /// Request as received
    pub query: SearchRequest,
    /// Whether the search ran in global mode
    pub is_global_search: bool,
    /// Number of sources queried
    pub total_sources: usize,
    /// Number of listings returned
    pub total_results: usize,
    /// Wall time of the search
    pub response_time_ms: u64,
    /// Filtered and ranked listings
    pub results: Vec<Listing>,
    /// Cross-country comparison, global mode only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_analysis: Option<GlobalAnalysis>,
    /// When the response was produced
    pub timestamp: DateTime<Utc>,
}

impl SearchResponse {
    /// Response with no results.
    #[must_use]
    pub fn empty(search_id: Uuid, query: SearchRequest, response_time_ms: u64) -> Self {
        Self {
            search_id,
            is_global_search: query.is_global(),
            query,
            total_sources: 0,
            total_results: 0,
            response_time_ms,
            results: Vec::new(),
            global_analysis: None,
            timestamp: Utc::now(),
        }
    }
}
