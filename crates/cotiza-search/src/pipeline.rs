//! Search pipeline.
//!
//! Runs the stages of a search in order: select sources, fetch them
//! concurrently, validate, filter, sort and, for global searches, analyze
//! prices across countries. Source and validator failures degrade the
//! response; only a malformed request is an error.

use crate::{
    arbitrage::analyze_global,
    cache::{request_cache_key, SearchCache},
    error::Result,
    filter::{filter_listings, sort_listings, FilterOptions},
    request::{SearchRequest, SearchResponse, SearchScope},
};
use cotiza_core::{AppConfig, FetchMode, SearchConfig};
use cotiza_scraper::{
    clamp_confidence, AdapterRegistry, HttpListingAdapter, Listing, ListingFetcher, ListingQuery,
    SyntheticListingGenerator, ValidationNote,
};
use cotiza_sources::{SourceDescriptor, SourceRegistry};
use cotiza_validation::{
    ensure_same_length, HeuristicValidator, KeywordValidator, ProductValidator, ValidationRequest,
    ValidatorStatus,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Weight of the previous reliability score when folding in a fetch result.
const SCORE_DECAY: f64 = 0.8;

/// Result of fetching one source; `completed` is false after a cancellation
/// or timeout.
struct SourceFetch {
    index: usize,
    listings: Vec<Listing>,
    completed: bool,
}

impl SourceFetch {
    fn incomplete(index: usize) -> Self {
        Self {
            index,
            listings: Vec::new(),
            completed: false,
        }
    }
}

/// Convert a validator confidence in [0, 1] to the listing scale [0, 100].
#[must_use]
pub fn normalize_confidence(fraction: f64) -> f64 {
    clamp_confidence((fraction * 100.0).round())
}

/// Product search over the source registry.
///
/// Cheap to share behind an `Arc`; concurrent searches only contend on the
/// registry's score updates.
pub struct SearchPipeline {
    registry: SourceRegistry,
    fetcher: Arc<ListingFetcher>,
    validator: Arc<dyn ProductValidator>,
    cache: Option<Arc<dyn SearchCache>>,
    settings: SearchConfig,
}

impl SearchPipeline {
    /// Create a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        registry: SourceRegistry,
        fetcher: Arc<ListingFetcher>,
        validator: Arc<dyn ProductValidator>,
        settings: SearchConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            validator,
            cache: None,
            settings,
        }
    }

    /// Attach a response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn SearchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build a pipeline from application configuration.
    ///
    /// Live modes fetch over HTTP; synthetic listings are seeded from
    /// `scraping.synthetic_seed` and honor the registry's B2B feature flags.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &AppConfig, registry: SourceRegistry) -> Result<Self> {
        config.validate()?;

        let synthetic = SyntheticListingGenerator::new(config.scraping.synthetic_seed)
            .with_features(registry.features());

        let adapters = match config.scraping.fetch_mode {
            FetchMode::Synthetic => AdapterRegistry::new(),
            FetchMode::Live | FetchMode::LiveWithFallback => {
                AdapterRegistry::with_default(Arc::new(HttpListingAdapter::new(&config.scraping)?))
            }
        };
        let fetcher = ListingFetcher::new(adapters, synthetic, config.scraping.fetch_mode);

        let validator: Arc<dyn ProductValidator> = if config.validation.enabled {
            Arc::new(HeuristicValidator::new())
        } else {
            Arc::new(KeywordValidator::new())
        };

        info!(
            fetch_mode = ?config.scraping.fetch_mode,
            validator = validator.provider_id(),
            sources = registry.count(),
            "search pipeline ready"
        );

        Ok(Self::new(registry, Arc::new(fetcher), validator, config.search.clone()))
    }

    /// Source registry the pipeline selects from.
    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Status of the product validator.
    #[must_use]
    pub fn validator_status(&self) -> ValidatorStatus {
        self.validator.status()
    }

    /// Active fetch mode.
    #[must_use]
    pub fn fetch_mode(&self) -> FetchMode {
        self.fetcher.mode()
    }

    /// Run a search.
    ///
    /// # Errors
    /// Returns [`crate::SearchError::InvalidRequest`] for a malformed request.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        self.search_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Run a search that stops fetching when `cancel` fires.
    ///
    /// Sources still in flight at cancellation contribute no listings; the
    /// response is built from whatever finished.
    ///
    /// # Errors
    /// Returns [`crate::SearchError::InvalidRequest`] for a malformed request.
    pub async fn search_with_cancellation(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<SearchResponse> {
        let search_id = Uuid::new_v4();
        let span = info_span!("search", search_id = %search_id, product = %request.product);
        self.run(search_id, request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        search_id: Uuid,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<SearchResponse> {
        let start = Instant::now();

        let scope = request.validate(&self.settings.default_country).map_err(|e| {
            warn!(stage = "validate_request", error = %e, "rejected search request");
            e
        })?;

        let max_results = request.max_results.unwrap_or(match scope {
            SearchScope::Country(_) => self.settings.default_max_results,
            SearchScope::Global(_) => self.settings.default_global_max_results,
        });

        let cache_key = request_cache_key(&request, &scope, max_results);
        if let Some(cached) = self.cached_response(&cache_key).await {
            return Ok(cached);
        }

        let sources = match &scope {
            SearchScope::Country(country) => self.registry.get_sources_by_country(country),
            SearchScope::Global(countries) => self.registry.get_global_sources(countries),
        };
        debug!(stage = "select", sources = sources.len(), "selected sources");

        if sources.is_empty() {
            warn!(stage = "select", "no sources match the request");
            return Ok(SearchResponse::empty(search_id, request, elapsed_ms(start)));
        }

        let query = ListingQuery::new(request.product.clone(), max_results)
            .official_only(request.official_only);
        let (fetched, complete) = self.fetch_all(&sources, &query, &cancel).await;
        let validated = self.validate(&request.product, fetched, &sources).await;

        let mut results = filter_listings(
            validated,
            &FilterOptions {
                official_only: request.official_only,
                alternatives: request.alternatives,
                min_confidence: self.settings.min_confidence,
                exact_match_confidence: self.settings.exact_match_confidence,
            },
        );
        sort_listings(&mut results);

        let is_global_search = request.is_global();
        let global_analysis = (is_global_search && !results.is_empty()).then(|| {
            analyze_global(
                &results,
                request.local_country(&self.settings.default_country),
                &self.registry,
            )
        });

        let response = SearchResponse {
            search_id,
            is_global_search,
            total_sources: sources.len(),
            total_results: results.len(),
            response_time_ms: elapsed_ms(start),
            results,
            global_analysis,
            timestamp: chrono::Utc::now(),
            query: request,
        };

        info!(
            total_sources = response.total_sources,
            total_results = response.total_results,
            elapsed_ms = response.response_time_ms,
            "search completed"
        );

        if complete && !cancel.is_cancelled() && response.total_results > 0 {
            self.store_response(&cache_key, &response).await;
        } else if !complete {
            debug!(stage = "cache", "partial response, not caching");
        }

        Ok(response)
    }

    /// Fetch every source with at most `max_concurrent_fetches` in flight.
    ///
    /// Listings come back grouped in source selection order regardless of
    /// completion order. The flag is false when any source was cancelled or
    /// timed out.
    async fn fetch_all(
        &self,
        sources: &[SourceDescriptor],
        query: &ListingQuery,
        cancel: &CancellationToken,
    ) -> (Vec<Listing>, bool) {
        let max_concurrent = self.settings.max_concurrent_fetches.max(1);
        let mut futures = FuturesUnordered::new();
        let mut fetched: Vec<SourceFetch> = Vec::with_capacity(sources.len());

        for (index, source) in sources.iter().enumerate() {
            futures.push(self.fetch_source(index, source, query, cancel));

            while futures.len() >= max_concurrent {
                if let Some(result) = futures.next().await {
                    fetched.push(result);
                }
            }
        }

        while let Some(result) = futures.next().await {
            fetched.push(result);
        }

        fetched.sort_by_key(|f| f.index);
        let complete = fetched.iter().all(|f| f.completed);
        let listings: Vec<Listing> = fetched.into_iter().flat_map(|f| f.listings).collect();
        debug!(stage = "fetch", listings = listings.len(), complete, "fetched all sources");
        (listings, complete)
    }

    async fn fetch_source(
        &self,
        index: usize,
        source: &SourceDescriptor,
        query: &ListingQuery,
        cancel: &CancellationToken,
    ) -> SourceFetch {
        let timeout = Duration::from_secs(self.settings.fetch_timeout_secs);

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(source_id = %source.id, stage = "fetch", "fetch cancelled");
                SourceFetch::incomplete(index)
            }
            result = tokio::time::timeout(timeout, self.fetcher.fetch_with_outcome(source, query)) => {
                match result {
                    Ok(outcome) => {
                        self.record_fetch(source, outcome.succeeded, outcome.elapsed_ms);
                        SourceFetch {
                            index,
                            listings: outcome.listings,
                            completed: true,
                        }
                    }
                    Err(_) => {
                        warn!(
                            source_id = %source.id,
                            stage = "fetch",
                            timeout_secs = self.settings.fetch_timeout_secs,
                            "source timed out"
                        );
                        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                        self.record_fetch(source, false, timeout_ms);
                        SourceFetch::incomplete(index)
                    }
                }
            }
        }
    }

    fn record_fetch(&self, source: &SourceDescriptor, succeeded: bool, elapsed_ms: u64) {
        let outcome = if succeeded { 1.0 } else { 0.0 };
        let score = SCORE_DECAY * source.score + (1.0 - SCORE_DECAY) * outcome;
        self.registry
            .update_score(&source.id, score, Some(elapsed_ms));
    }

    /// Rescore listings with the validator; keep adapter scores if it fails.
    async fn validate(
        &self,
        product: &str,
        mut listings: Vec<Listing>,
        sources: &[SourceDescriptor],
    ) -> Vec<Listing> {
        if listings.is_empty() {
            return listings;
        }

        let source_types: HashMap<_, _> = sources
            .iter()
            .map(|s| (&s.id, s.source_type.as_str()))
            .collect();

        let requests: Vec<ValidationRequest> = listings
            .iter()
            .map(|l| ValidationRequest {
                search_query: product.to_string(),
                product_name: l.product_name.clone(),
                brand: l.brand.clone(),
                price: l.price,
                currency: l.currency.clone(),
                source_type: source_types
                    .get(&l.source_id)
                    .copied()
                    .unwrap_or("unknown")
                    .to_string(),
            })
            .collect();

        let verdicts = match self
            .validator
            .batch_validate(&requests)
            .await
            .and_then(|v| ensure_same_length(&requests, &v).map(|()| v))
        {
            Ok(verdicts) => verdicts,
            Err(e) => {
                warn!(
                    stage = "validate",
                    provider = self.validator.provider_id(),
                    error = %e,
                    "validation failed, keeping adapter scores"
                );
                return listings;
            }
        };

        for (listing, verdict) in listings.iter_mut().zip(verdicts) {
            listing.confidence_score = normalize_confidence(verdict.confidence_score);
            if verdict.extracted_brand.is_some() {
                listing.brand = verdict.extracted_brand;
            }
            if verdict.extracted_model.is_some() {
                listing.model = verdict.extracted_model;
            }
            listing.validation = Some(ValidationNote {
                is_exact_match: verdict.is_exact_match,
                reasoning: verdict.reasoning,
                provider: verdict.provider,
            });
        }

        listings
    }

    async fn cached_response(&self, key: &str) -> Option<SearchResponse> {
        let cache = self.cache.as_ref()?;
        let raw = cache.get(key).await?;

        match serde_json::from_str(&raw) {
            Ok(response) => {
                debug!(key, "serving cached response");
                Some(response)
            }
            Err(e) => {
                warn!(key, stage = "cache", error = %e, "discarding unreadable cache entry");
                cache.del(key).await;
                None
            }
        }
    }

    async fn store_response(&self, key: &str, response: &SearchResponse) {
        let Some(cache) = &self.cache else {
            return;
        };

        match serde_json::to_string(response) {
            Ok(raw) => {
                cache
                    .set(key, raw, Some(Duration::from_secs(self.settings.cache_ttl_secs)))
                    .await;
            }
            Err(e) => warn!(key, stage = "cache", error = %e, "could not serialize response"),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
