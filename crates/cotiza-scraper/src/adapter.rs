//! Adapter contract, adapter registry and the never-failing fetch entry point.

use crate::{
    error::{Result, ScrapeError},
    listing::{clamp_confidence, Listing},
    synthetic::SyntheticListingGenerator,
};
use async_trait::async_trait;
use cotiza_core::FetchMode;
use cotiza_sources::{SourceDescriptor, SourceType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What to look for on one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// Product text as typed by the user
    pub product: String,
    /// Per-source cap on returned listings
    pub max_results: usize,
    /// Keep only listings from official sellers
    pub official_only: bool,
}

impl ListingQuery {
    /// Query for `product` with the given per-source cap.
    #[must_use]
    pub fn new(product: impl Into<String>, max_results: usize) -> Self {
        Self {
            product: product.into(),
            max_results,
            official_only: false,
        }
    }

    /// Restrict results to official sellers.
    #[must_use]
    pub fn official_only(mut self, official_only: bool) -> Self {
        self.official_only = official_only;
        self
    }
}

/// Turns a query plus a source descriptor into normalized listings.
#[async_trait]
pub trait ListingAdapter: Send + Sync {
    /// Fetch listings for `query` from `source`.
    ///
    /// # Errors
    /// Returns error if the source can't be reached or its page can't be read.
    async fn fetch(&self, source: &SourceDescriptor, query: &ListingQuery) -> Result<Vec<Listing>>;

    /// Short identifier used in logs.
    fn adapter_id(&self) -> &str;
}

/// Resolves the adapter for a source: by id, then by type, then the default.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    by_id: HashMap<String, Arc<dyn ListingAdapter>>,
    by_type: HashMap<SourceType, Arc<dyn ListingAdapter>>,
    default: Option<Arc<dyn ListingAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose default adapter is `adapter`.
    #[must_use]
    pub fn with_default(adapter: Arc<dyn ListingAdapter>) -> Self {
        Self {
            default: Some(adapter),
            ..Self::default()
        }
    }

    /// Use `adapter` for the source with this id.
    pub fn register_source(&mut self, source_id: impl Into<String>, adapter: Arc<dyn ListingAdapter>) {
        self.by_id.insert(source_id.into(), adapter);
    }

    /// Use `adapter` for every source of this type without an id entry.
    pub fn register_type(&mut self, source_type: SourceType, adapter: Arc<dyn ListingAdapter>) {
        self.by_type.insert(source_type, adapter);
    }

    /// Use `adapter` when nothing more specific matches.
    pub fn set_default(&mut self, adapter: Arc<dyn ListingAdapter>) {
        self.default = Some(adapter);
    }

    /// Adapter responsible for `source`, if any.
    #[must_use]
    pub fn resolve(&self, source: &SourceDescriptor) -> Option<Arc<dyn ListingAdapter>> {
        self.by_id
            .get(source.id.as_str())
            .or_else(|| self.by_type.get(&source.source_type))
            .or(self.default.as_ref())
            .cloned()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("by_id", &self.by_id.keys().collect::<Vec<_>>())
            .field("by_type", &self.by_type.keys().collect::<Vec<_>>())
            .field("default", &self.default.as_ref().map(|a| a.adapter_id().to_string()))
            .finish()
    }
}

/// Result of one source fetch, as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Normalized listings, already capped and filtered
    pub listings: Vec<Listing>,
    /// Whether the source answered without error
    pub succeeded: bool,
    /// Whether the listings are synthetic replacements for a failed live fetch
    pub fell_back: bool,
    /// Wall time of the fetch
    pub elapsed_ms: u64,
}

/// Fetches listings from one source and never fails.
///
/// Adapter errors are logged and turned into an empty result, or into
/// synthetic listings when the fetch mode allows it.
#[derive(Debug, Clone)]
pub struct ListingFetcher {
    adapters: AdapterRegistry,
    synthetic: SyntheticListingGenerator,
    mode: FetchMode,
}

impl ListingFetcher {
    /// Create a fetcher.
    #[must_use]
    pub fn new(adapters: AdapterRegistry, synthetic: SyntheticListingGenerator, mode: FetchMode) -> Self {
        if mode == FetchMode::Synthetic {
            warn!("synthetic fetch mode: listings are generated, not scraped");
        }
        Self {
            adapters,
            synthetic,
            mode,
        }
    }

    /// Fetcher that only produces synthetic listings.
    #[must_use]
    pub fn synthetic(generator: SyntheticListingGenerator) -> Self {
        Self::new(AdapterRegistry::new(), generator, FetchMode::Synthetic)
    }

    /// Active fetch mode.
    #[must_use]
    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Fetch listings for `query` from `source`.
    pub async fn fetch_listings(&self, source: &SourceDescriptor, query: &ListingQuery) -> Vec<Listing> {
        self.fetch_with_outcome(source, query).await.listings
    }

    /// Fetch listings and report whether the source answered.
    pub async fn fetch_with_outcome(&self, source: &SourceDescriptor, query: &ListingQuery) -> FetchOutcome {
        let start = Instant::now();

        let result = if self.mode == FetchMode::Synthetic {
            self.synthetic.fetch(source, query).await
        } else {
            match self.adapters.resolve(source) {
                Some(adapter) => {
                    debug!(source_id = %source.id, adapter = adapter.adapter_id(), "fetching listings");
                    adapter.fetch(source, query).await
                }
                None => Err(ScrapeError::SourceUnavailable {
                    source_id: source.id.clone(),
                    reason: "no adapter registered".to_string(),
                }),
            }
        };

        let (listings, succeeded, fell_back) = match result {
            Ok(listings) => (listings, true, false),
            Err(e) if self.mode.allows_synthetic() => {
                warn!(
                    source_id = %source.id,
                    stage = "fetch",
                    error = %e,
                    "live fetch failed, using synthetic listings"
                );
                (self.synthetic.generate(source, query), false, true)
            }
            Err(e) => {
                warn!(source_id = %source.id, stage = "fetch", error = %e, "live fetch failed");
                (Vec::new(), false, false)
            }
        };

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let listings = finalize(listings, query, elapsed_ms);

        debug!(
            source_id = %source.id,
            count = listings.len(),
            elapsed_ms,
            succeeded,
            "fetched listings"
        );

        FetchOutcome {
            listings,
            succeeded,
            fell_back,
            elapsed_ms,
        }
    }
}

fn finalize(listings: Vec<Listing>, query: &ListingQuery, elapsed_ms: u64) -> Vec<Listing> {
    listings
        .into_iter()
        .filter(|l| l.price > 0.0)
        .filter(|l| !query.official_only || l.is_official_source)
        .take(query.max_results)
        .map(|mut l| {
            l.response_time_ms = elapsed_ms;
            l.confidence_score = clamp_confidence(l.confidence_score);
            l
        })
        .collect()
}
