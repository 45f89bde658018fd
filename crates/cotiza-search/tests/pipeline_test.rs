//! End-to-end pipeline tests with in-process adapters and validators.

use async_trait::async_trait;
use cotiza_core::{CountryCode, FetchMode, SearchConfig, SourceId};
use cotiza_scraper::{
    AdapterRegistry, Listing, ListingAdapter, ListingFetcher, ListingQuery, ScrapeError,
    SyntheticListingGenerator,
};
use cotiza_search::{
    MemoryCache, RecommendedAction, SearchError, SearchPipeline, SearchRequest,
};
use cotiza_sources::{ScraperProfile, SourceDescriptor, SourceRegistry, SourceType};
use cotiza_validation::{
    HeuristicValidator, ProductValidator, ValidationError, ValidationRequest, ValidationVerdict,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn source(id: &str, country: &str, official_brands: &[&str]) -> SourceDescriptor {
    SourceDescriptor {
        id: SourceId::new(id).expect("valid source ID"),
        name: format!("Tienda {id}"),
        base_url: format!("https://{id}.example.com"),
        country: CountryCode::new(country).expect("valid country"),
        source_type: SourceType::Marketplace,
        enabled: true,
        priority: 2,
        is_official: !official_brands.is_empty(),
        official_brands: official_brands.iter().map(ToString::to_string).collect(),
        shipping_countries: Vec::new(),
        capabilities: BTreeSet::new(),
        specialization: None,
        categories: Vec::new(),
        certifications: Vec::new(),
        score: 0.5,
        last_checked: None,
        response_time_ms: None,
        scraper: ScraperProfile::default(),
    }
}

fn listing(source_id: &str, name: &str, brand: &str, price: f64, official: bool) -> Listing {
    let mut listing = Listing::new(
        SourceId::new(source_id).expect("valid source ID"),
        format!("Tienda {source_id}"),
        name,
        price,
        "PEN",
        format!("https://{source_id}.example.com/p/{}", name.len()),
    );
    listing.brand = Some(brand.to_string());
    listing.is_official_source = official;
    listing.confidence_score = 88.0;
    listing
}

/// Serves canned listings per source, optionally after a delay.
#[derive(Default)]
struct StaticAdapter {
    listings: HashMap<String, Vec<Listing>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StaticAdapter {
    fn with(mut self, source_id: &str, listings: Vec<Listing>) -> Self {
        self.listings.insert(source_id.to_string(), listings);
        self
    }

    fn delayed(mut self, source_id: &str, delay: Duration) -> Self {
        self.delays.insert(source_id.to_string(), delay);
        self
    }
}

#[async_trait]
impl ListingAdapter for StaticAdapter {
    async fn fetch(&self, source: &SourceDescriptor, _query: &ListingQuery) -> Result<Vec<Listing>, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(source.id.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self
            .listings
            .get(source.id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn adapter_id(&self) -> &str {
        "static"
    }
}

/// Returns the same verdict for every listing.
struct FixedValidator {
    confidence: f64,
}

#[async_trait]
impl ProductValidator for FixedValidator {
    async fn batch_validate(
        &self,
        requests: &[ValidationRequest],
    ) -> Result<Vec<ValidationVerdict>, ValidationError> {
        Ok(requests
            .iter()
            .map(|_| ValidationVerdict {
                is_exact_match: true,
                confidence_score: self.confidence,
                extracted_brand: Some("Bosch".to_string()),
                extracted_model: Some("GSB550".to_string()),
                reasoning: "fixed verdict".to_string(),
                provider: "fixed".to_string(),
            })
            .collect())
    }

    fn provider_id(&self) -> &str {
        "fixed"
    }
}

/// Fails every batch, or answers with too few verdicts.
struct BrokenValidator {
    short_answer: bool,
}

#[async_trait]
impl ProductValidator for BrokenValidator {
    async fn batch_validate(
        &self,
        _requests: &[ValidationRequest],
    ) -> Result<Vec<ValidationVerdict>, ValidationError> {
        if self.short_answer {
            Ok(Vec::new())
        } else {
            Err(ValidationError::Provider {
                provider: "broken".to_string(),
                message: "upstream unavailable".to_string(),
            })
        }
    }

    fn provider_id(&self) -> &str {
        "broken"
    }
}

fn registry(sources: Vec<SourceDescriptor>) -> SourceRegistry {
    let registry = SourceRegistry::new();
    for descriptor in sources {
        registry.insert(descriptor).expect("insert source");
    }
    registry
}

fn pipeline(
    registry: SourceRegistry,
    adapter: Arc<StaticAdapter>,
    validator: Arc<dyn ProductValidator>,
    settings: SearchConfig,
) -> SearchPipeline {
    let fetcher = ListingFetcher::new(
        AdapterRegistry::with_default(adapter),
        SyntheticListingGenerator::new(42),
        FetchMode::Live,
    );
    SearchPipeline::new(registry, Arc::new(fetcher), validator, settings)
}

fn bosch_scenario() -> (SourceRegistry, Arc<StaticAdapter>) {
    let registry = registry(vec![
        source("bosch-store-pe", "PE", &["Bosch"]),
        source("generic-one-pe", "PE", &[]),
        source("generic-two-pe", "PE", &[]),
    ]);
    let adapter = StaticAdapter::default()
        .with(
            "bosch-store-pe",
            vec![listing("bosch-store-pe", "Taladro Percutor Bosch GSB 550", "Bosch", 300.0, true)],
        )
        .with(
            "generic-one-pe",
            vec![listing("generic-one-pe", "Taladro Bosch GSB 550", "Bosch", 250.0, false)],
        )
        .with(
            "generic-two-pe",
            vec![listing("generic-two-pe", "Taladro Makita HP1630", "Makita", 200.0, false)],
        );
    (registry, Arc::new(adapter))
}

#[tokio::test]
async fn test_official_result_ranks_first() {
    let (registry, adapter) = bosch_scenario();
    let pipeline = pipeline(
        registry,
        adapter,
        Arc::new(HeuristicValidator::new()),
        SearchConfig::default(),
    );

    let response = pipeline
        .search(SearchRequest::new("taladro bosch").country("PE"))
        .await
        .expect("search should succeed");

    assert!(!response.is_global_search);
    assert!(response.global_analysis.is_none());
    assert_eq!(response.total_sources, 3);
    // The Makita listing scores 40 and is filtered out
    assert_eq!(response.total_results, 2);
    assert_eq!(response.results.len(), response.total_results);

    let first = &response.results[0];
    assert!(first.is_official_source);
    assert_eq!(first.source_id.as_str(), "bosch-store-pe");
    assert!((first.confidence_score - 100.0).abs() < f64::EPSILON);
    assert_eq!(
        first.validation.as_ref().map(|v| v.provider.as_str()),
        Some("heuristic")
    );

    for listing in &response.results {
        assert!((0.0..=100.0).contains(&listing.confidence_score));
        assert!(listing.price > 0.0 && !listing.url.is_empty());
    }
}

#[tokio::test]
async fn test_alternatives_relaxes_exact_threshold() {
    let (registry, adapter) = bosch_scenario();
    let pipeline = pipeline(
        registry,
        adapter,
        Arc::new(FixedValidator { confidence: 0.6 }),
        SearchConfig::default(),
    );

    let exact = pipeline
        .search(SearchRequest::new("taladro bosch").country("PE"))
        .await
        .expect("search should succeed");
    assert_eq!(exact.total_results, 0);

    let relaxed = pipeline
        .search(SearchRequest::new("taladro bosch").country("PE").alternatives(true))
        .await
        .expect("search should succeed");
    assert_eq!(relaxed.total_results, 3);
    // Equal confidence: official first, then cheapest
    let prices: Vec<f64> = relaxed.results.iter().map(|l| l.price).collect();
    assert_eq!(prices, [300.0, 200.0, 250.0]);
}

#[tokio::test]
async fn test_official_only_without_official_match_is_empty() {
    let registry = registry(vec![source("generic-one-pe", "PE", &[]), source("generic-two-pe", "PE", &[])]);
    let adapter = StaticAdapter::default()
        .with(
            "generic-one-pe",
            vec![listing("generic-one-pe", "Casco 3M H-700", "3M", 45.0, false)],
        )
        .with(
            "generic-two-pe",
            vec![listing("generic-two-pe", "Casco 3M Blanco", "3M", 39.0, false)],
        );
    let pipeline = pipeline(
        registry,
        Arc::new(adapter),
        Arc::new(HeuristicValidator::new()),
        SearchConfig::default(),
    );

    let response = pipeline
        .search(SearchRequest::new("casco 3m").country("PE").official_only(true))
        .await
        .expect("search should succeed");

    assert_eq!(response.total_results, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_global_search_recommends_import() {
    let registry = registry(vec![source("tienda-pe", "PE", &[]), source("tienda-us", "US", &[])]);
    let adapter = StaticAdapter::default()
        .with(
            "tienda-pe",
            vec![
                listing("tienda-pe", "Taladro Bosch GSB 550", "Bosch", 100.0, false),
                listing("tienda-pe", "Taladro Bosch GSB 550 kit", "Bosch", 115.0, false),
            ],
        )
        .with(
            "tienda-us",
            vec![listing("tienda-us", "Taladro Bosch GSB 550", "Bosch", 70.0, false)],
        );
    let pipeline = pipeline(
        registry,
        Arc::new(adapter),
        Arc::new(HeuristicValidator::new()),
        SearchConfig::default(),
    );

    let response = pipeline
        .search(SearchRequest::new("taladro bosch").country("PE").countries(["PE", "US"]))
        .await
        .expect("search should succeed");

    assert!(response.is_global_search);
    assert_eq!(response.total_sources, 2);

    let analysis = response.global_analysis.expect("global analysis present");
    let best = analysis.best_price.expect("best price present");
    assert_eq!(best.country, "US");
    assert!(response.results.iter().all(|l| best.price <= l.price));
    assert_eq!(analysis.local_availability.len(), 2);
    assert_eq!(analysis.savings_analysis.recommended_action, RecommendedAction::Import);
    assert!((analysis.savings_analysis.max_savings - 30.0).abs() < 0.5);
    assert_eq!(analysis.best_total_cost.expect("total cost present").delivery_days, 7);
}

#[tokio::test]
async fn test_validator_confidence_is_scaled_to_percent() {
    let (registry, adapter) = bosch_scenario();
    let pipeline = pipeline(
        registry,
        adapter,
        Arc::new(FixedValidator { confidence: 0.85 }),
        SearchConfig::default(),
    );

    let response = pipeline
        .search(SearchRequest::new("taladro bosch").country("PE"))
        .await
        .expect("search should succeed");

    assert_eq!(response.total_results, 3);
    for listing in &response.results {
        assert!((listing.confidence_score - 85.0).abs() < f64::EPSILON);
        assert_eq!(listing.brand.as_deref(), Some("Bosch"));
        assert_eq!(listing.model.as_deref(), Some("GSB550"));
        let note = listing.validation.as_ref().expect("verdict attached");
        assert!(note.is_exact_match);
        assert_eq!(note.reasoning, "fixed verdict");
    }
}

#[tokio::test]
async fn test_validator_failure_keeps_adapter_scores() {
    for short_answer in [false, true] {
        let (registry, adapter) = bosch_scenario();
        let pipeline = pipeline(
            registry,
            adapter,
            Arc::new(BrokenValidator { short_answer }),
            SearchConfig::default(),
        );

        let response = pipeline
            .search(SearchRequest::new("taladro bosch").country("PE"))
            .await
            .expect("search should succeed");

        assert_eq!(response.total_results, 3);
        assert!(response
            .results
            .iter()
            .all(|l| (l.confidence_score - 88.0).abs() < f64::EPSILON && l.validation.is_none()));
        assert!(response.results[0].is_official_source);
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out() {
    let registry = registry(vec![source("fast-pe", "PE", &[]), source("slow-pe", "PE", &[])]);
    let adapter = StaticAdapter::default()
        .with("fast-pe", vec![listing("fast-pe", "Nivel Stanley 24", "Stanley", 80.0, false)])
        .with("slow-pe", vec![listing("slow-pe", "Nivel Stanley 48", "Stanley", 95.0, false)])
        .delayed("slow-pe", Duration::from_secs(60));
    let settings = SearchConfig {
        fetch_timeout_secs: 1,
        ..SearchConfig::default()
    };
    let registry_handle = registry.clone();
    let pipeline = pipeline(
        registry,
        Arc::new(adapter),
        Arc::new(FixedValidator { confidence: 0.9 }),
        settings,
    );

    let response = pipeline
        .search(SearchRequest::new("nivel stanley").country("PE"))
        .await
        .expect("search should succeed");

    assert_eq!(response.total_sources, 2);
    assert_eq!(response.total_results, 1);
    assert_eq!(response.results[0].source_id.as_str(), "fast-pe");

    let score = |id: &str| {
        registry_handle
            .get_source_by_id(&SourceId::new(id).expect("valid source ID"))
            .expect("source registered")
            .score
    };
    assert!((score("fast-pe") - 0.6).abs() < 1e-9);
    assert!((score("slow-pe") - 0.4).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_concurrency_is_capped() {
    let ids: Vec<String> = (0..6).map(|i| format!("tienda{i}-pe")).collect();
    let registry = registry(ids.iter().map(|id| source(id, "PE", &[])).collect());

    let mut adapter = StaticAdapter::default();
    for id in &ids {
        adapter = adapter
            .with(id, vec![listing(id, "Amoladora Dewalt DWE4010", "DeWalt", 190.0, false)])
            .delayed(id, Duration::from_millis(50));
    }
    let adapter = Arc::new(adapter);

    let settings = SearchConfig {
        max_concurrent_fetches: 2,
        ..SearchConfig::default()
    };
    let pipeline = pipeline(
        registry,
        adapter.clone(),
        Arc::new(FixedValidator { confidence: 0.9 }),
        settings,
    );

    let response = pipeline
        .search(SearchRequest::new("amoladora dewalt").country("PE"))
        .await
        .expect("search should succeed");

    assert_eq!(response.total_results, 6);
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 6);
    assert_eq!(adapter.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ties_keep_source_selection_order() {
    // aaa-pe finishes last but is selected first
    let registry = registry(vec![source("aaa-pe", "PE", &[]), source("bbb-pe", "PE", &[])]);
    let adapter = StaticAdapter::default()
        .with("aaa-pe", vec![listing("aaa-pe", "Casco 3M H-700", "3M", 45.0, false)])
        .with("bbb-pe", vec![listing("bbb-pe", "Casco 3M H-700", "3M", 45.0, false)])
        .delayed("aaa-pe", Duration::from_millis(200));
    let pipeline = pipeline(
        registry,
        Arc::new(adapter),
        Arc::new(FixedValidator { confidence: 0.9 }),
        SearchConfig::default(),
    );

    let response = pipeline
        .search(SearchRequest::new("casco 3m").country("PE"))
        .await
        .expect("search should succeed");

    let order: Vec<&str> = response.results.iter().map(|l| l.source_id.as_str()).collect();
    assert_eq!(order, ["aaa-pe", "bbb-pe"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_in_flight_fetches() {
    let registry = registry(vec![source("lenta-pe", "PE", &[]), source("lenta-dos-pe", "PE", &[])]);
    let mut adapter = StaticAdapter::default();
    for id in ["lenta-pe", "lenta-dos-pe"] {
        adapter = adapter
            .with(id, vec![listing(id, "Taladro Bosch GSB 550", "Bosch", 250.0, false)])
            .delayed(id, Duration::from_secs(10));
    }
    let registry_handle = registry.clone();
    let pipeline = pipeline(
        registry,
        Arc::new(adapter),
        Arc::new(FixedValidator { confidence: 0.9 }),
        SearchConfig::default(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let response = pipeline
        .search_with_cancellation(SearchRequest::new("taladro bosch").country("PE"), cancel)
        .await
        .expect("search should succeed");

    assert_eq!(response.total_sources, 2);
    assert_eq!(response.total_results, 0);

    // Cancelled fetches leave source scores untouched
    let descriptor = registry_handle
        .get_source_by_id(&SourceId::new("lenta-pe").expect("valid source ID"))
        .expect("source registered");
    assert!((descriptor.score - 0.5).abs() < f64::EPSILON);
    assert!(descriptor.last_checked.is_none());
}

#[tokio::test]
async fn test_repeated_search_is_served_from_cache() {
    let (registry, adapter) = bosch_scenario();
    let cache = Arc::new(MemoryCache::new(None));
    let pipeline = pipeline(
        registry,
        adapter.clone(),
        Arc::new(HeuristicValidator::new()),
        SearchConfig::default(),
    )
    .with_cache(cache.clone());

    let request = SearchRequest::new("taladro bosch").country("PE");
    let first = pipeline.search(request.clone()).await.expect("search should succeed");
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len(), 1);

    let second = pipeline.search(request).await.expect("search should succeed");
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
    assert_eq!(second.search_id, first.search_id);
    assert_eq!(second.results, first.results);

    // Different flags miss the cache
    pipeline
        .search(SearchRequest::new("taladro bosch").country("PE").alternatives(true))
        .await
        .expect("search should succeed");
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_search_is_not_cached() {
    let registry = registry(vec![source("rapida-pe", "PE", &[]), source("lenta-pe", "PE", &[])]);
    let adapter = StaticAdapter::default()
        .with("rapida-pe", vec![listing("rapida-pe", "Taladro Bosch GSB 550", "Bosch", 240.0, false)])
        .with("lenta-pe", vec![listing("lenta-pe", "Taladro Bosch GSB 550", "Bosch", 260.0, false)])
        .delayed("lenta-pe", Duration::from_secs(10));
    let cache = Arc::new(MemoryCache::new(None));
    let pipeline = pipeline(
        registry,
        Arc::new(adapter),
        Arc::new(FixedValidator { confidence: 0.9 }),
        SearchConfig::default(),
    )
    .with_cache(cache.clone());
    let request = SearchRequest::new("taladro bosch").country("PE");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let partial = pipeline
        .search_with_cancellation(request.clone(), cancel)
        .await
        .expect("search should succeed");
    assert_eq!(partial.total_results, 1);
    assert!(cache.is_empty());

    let full = pipeline.search(request).await.expect("search should succeed");
    assert_eq!(full.total_results, 2);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_search_is_not_cached() {
    let registry = registry(vec![source("fast-pe", "PE", &[]), source("slow-pe", "PE", &[])]);
    let adapter = StaticAdapter::default()
        .with("fast-pe", vec![listing("fast-pe", "Nivel Stanley 24", "Stanley", 80.0, false)])
        .with("slow-pe", vec![listing("slow-pe", "Nivel Stanley 48", "Stanley", 95.0, false)])
        .delayed("slow-pe", Duration::from_secs(60));
    let adapter = Arc::new(adapter);
    let cache = Arc::new(MemoryCache::new(None));
    let settings = SearchConfig {
        fetch_timeout_secs: 1,
        ..SearchConfig::default()
    };
    let pipeline = pipeline(
        registry,
        adapter.clone(),
        Arc::new(FixedValidator { confidence: 0.9 }),
        settings,
    )
    .with_cache(cache.clone());

    let response = pipeline
        .search(SearchRequest::new("nivel stanley").country("PE"))
        .await
        .expect("search should succeed");
    assert_eq!(response.total_results, 1);
    assert!(cache.is_empty());

    pipeline
        .search(SearchRequest::new("nivel stanley").country("PE"))
        .await
        .expect("search should succeed");
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let (registry, adapter) = bosch_scenario();
    let pipeline = pipeline(
        registry,
        adapter.clone(),
        Arc::new(HeuristicValidator::new()),
        SearchConfig::default(),
    );

    let err = pipeline
        .search(SearchRequest::new("  ").country("PE"))
        .await
        .expect_err("blank product is rejected");

    assert!(matches!(err, SearchError::InvalidRequest { .. }));
    assert!(err.invalid_request_payload().is_some());
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_country_without_sources_returns_empty_response() {
    let (registry, adapter) = bosch_scenario();
    let pipeline = pipeline(
        registry,
        adapter,
        Arc::new(HeuristicValidator::new()),
        SearchConfig::default(),
    );

    let response = pipeline
        .search(SearchRequest::new("taladro bosch").country("JP"))
        .await
        .expect("search should succeed");

    assert_eq!(response.total_sources, 0);
    assert_eq!(response.total_results, 0);
}
