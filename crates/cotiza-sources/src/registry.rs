//! In-memory source registry with query support.

use crate::{
    definition::{B2bFeatures, Capability, SourceCatalog, SourceDescriptor, SourceType},
    error::{Result, SourceError},
    loader::{builtin_catalog, merge_catalogs, CatalogLoader},
};
use chrono::Utc;
use cotiza_core::{CountryCode, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[derive(Default)]
struct RegistryState {
    sources: BTreeMap<SourceId, SourceDescriptor>,
    features: B2bFeatures,
}

/// Shared, read-mostly catalog of sources.
///
/// Clones share the same underlying state. Queries only consider enabled
/// sources unless stated otherwise; results come back in id order, or in
/// `(priority, id)` order for the prioritized queries.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    state: Arc<RwLock<RegistryState>>,
}

/// Aggregate counts over every registered source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Registered sources, including runtime-disabled ones
    pub total: usize,
    /// Enabled sources
    pub active: usize,
    /// Sources flagged official
    pub official: usize,
    /// Count per source type (every type present, zero included)
    pub by_type: BTreeMap<SourceType, usize>,
    /// Count per home country
    pub by_country: BTreeMap<String, usize>,
    /// Mean reliability score, 0 for an empty registry
    pub average_score: f64,
}

impl SourceRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in catalog only.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.load_sources(&builtin_catalog(), None);
        registry
    }

    /// Create a registry from the built-in catalog and an optional external
    /// catalog file. Never fails; see [`Self::load_sources`].
    #[must_use]
    pub fn from_catalog_path(path: Option<&std::path::Path>) -> Self {
        let registry = Self::new();
        let loader = path.map(CatalogLoader::new);
        registry.load_sources(&builtin_catalog(), loader.as_ref());
        registry
    }

    /// Replace the registry contents with `builtins` merged with the
    /// catalog read by `external`.
    ///
    /// A missing or malformed external catalog is logged and the built-ins
    /// are loaded alone. Loading the same inputs twice yields the same
    /// registry. Returns the number of sources loaded.
    pub fn load_sources(&self, builtins: &SourceCatalog, external: Option<&CatalogLoader>) -> usize {
        let external_catalog = external.and_then(|loader| match loader.load() {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                warn!(
                    path = %loader.path().display(),
                    error = %e,
                    "external source catalog unusable, using built-in sources only"
                );
                None
            }
        });

        self.load_catalog(&merge_catalogs(builtins, external_catalog.as_ref()))
    }

    /// Replace the registry contents with an already merged catalog.
    pub fn load_catalog(&self, catalog: &SourceCatalog) -> usize {
        let mut state = self.state.write().expect("acquire write lock on sources");

        state.sources.clear();
        for descriptor in &catalog.sources {
            state.sources.insert(descriptor.id.clone(), descriptor.clone());
        }
        state.features = catalog.features;

        info!(count = state.sources.len(), "loaded source registry");
        state.sources.len()
    }

    /// Add or replace a single descriptor.
    ///
    /// # Errors
    /// Returns error if the descriptor fails validation.
    pub fn insert(&self, descriptor: SourceDescriptor) -> Result<()> {
        descriptor.validate()?;

        let mut state = self.state.write().expect("acquire write lock on sources");
        debug!(source_id = %descriptor.id, "inserted source descriptor");
        state.sources.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// All enabled sources.
    #[must_use]
    pub fn get_active_sources(&self) -> Vec<SourceDescriptor> {
        self.select(|_| true)
    }

    /// Enabled sources located in or shipping to `country`.
    #[must_use]
    pub fn get_sources_by_country(&self, country: &CountryCode) -> Vec<SourceDescriptor> {
        self.select(|d| d.serves(country))
    }

    /// Enabled sources of the given type.
    #[must_use]
    pub fn get_sources_by_type(&self, source_type: SourceType) -> Vec<SourceDescriptor> {
        self.select(|d| d.source_type == source_type)
    }

    /// Enabled sources flagged official.
    #[must_use]
    pub fn get_official_sources(&self) -> Vec<SourceDescriptor> {
        self.select(|d| d.is_official)
    }

    /// Enabled sources whose specialization equals `tag` (case-insensitive).
    #[must_use]
    pub fn get_sources_by_specialization(&self, tag: &str) -> Vec<SourceDescriptor> {
        self.select(|d| {
            d.specialization
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(tag))
        })
    }

    /// Enabled sources advertising `capability`.
    #[must_use]
    pub fn get_sources_with_capability(&self, capability: Capability) -> Vec<SourceDescriptor> {
        self.select(|d| d.has_capability(capability))
    }

    /// Enabled sources listing `brand` among their official brands.
    #[must_use]
    pub fn get_sources_by_brand(&self, brand: &str) -> Vec<SourceDescriptor> {
        self.select(|d| d.carries_brand(brand))
    }

    /// Enabled B2B sources (specialized catalogs and distributors).
    #[must_use]
    pub fn get_b2b_sources(&self) -> Vec<SourceDescriptor> {
        self.select(|d| d.source_type.is_b2b())
    }

    /// Enabled sources ordered by priority, then id.
    #[must_use]
    pub fn get_prioritized_sources(&self) -> Vec<SourceDescriptor> {
        let mut sources = self.get_active_sources();
        sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        sources
    }

    /// Sources for a multi-country search.
    ///
    /// An empty list or one containing `ALL` selects every enabled source;
    /// otherwise a source is selected when it serves any listed country.
    /// Ordered by priority, then id.
    #[must_use]
    pub fn get_global_sources(&self, countries: &[CountryCode]) -> Vec<SourceDescriptor> {
        if countries.is_empty() || countries.iter().any(CountryCode::is_all) {
            return self.get_prioritized_sources();
        }

        let mut sources = self.select(|d| countries.iter().any(|c| d.serves(c)));
        sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        sources
    }

    /// Get a source by ID, enabled or not.
    ///
    /// # Errors
    /// Returns error if the source is not registered.
    pub fn get_source_by_id(&self, source_id: &SourceId) -> Result<SourceDescriptor> {
        let state = self.state.read().expect("acquire read lock on sources");

        state
            .sources
            .get(source_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                source_id: source_id.to_string(),
            })
    }

    /// Record advisory telemetry for a source.
    ///
    /// `score` is clamped to [0, 1]. Unknown ids and non-finite scores are
    /// logged and ignored.
    pub fn update_score(&self, source_id: &SourceId, score: f64, response_time_ms: Option<u64>) {
        if !score.is_finite() {
            warn!(source_id = %source_id, score, "ignoring non-finite source score");
            return;
        }

        let mut state = self.state.write().expect("acquire write lock on sources");
        let Some(descriptor) = state.sources.get_mut(source_id) else {
            debug!(source_id = %source_id, "score update for unknown source ignored");
            return;
        };

        descriptor.score = score.clamp(0.0, 1.0);
        descriptor.last_checked = Some(Utc::now());
        if response_time_ms.is_some() {
            descriptor.response_time_ms = response_time_ms;
        }

        debug!(
            source_id = %source_id,
            score = descriptor.score,
            response_time_ms,
            "updated source score"
        );
    }

    /// Disable a source at runtime. The descriptor stays registered.
    ///
    /// # Errors
    /// Returns error if the source is not registered.
    pub fn disable_source(&self, source_id: &SourceId) -> Result<()> {
        let mut state = self.state.write().expect("acquire write lock on sources");

        let descriptor =
            state
                .sources
                .get_mut(source_id)
                .ok_or_else(|| SourceError::NotFound {
                    source_id: source_id.to_string(),
                })?;

        descriptor.enabled = false;
        info!(source_id = %source_id, "disabled source");
        Ok(())
    }

    /// B2B feature flags from the loaded catalog.
    #[must_use]
    pub fn features(&self) -> B2bFeatures {
        self.state.read().expect("acquire read lock on sources").features
    }

    /// Get the total number of registered sources.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.read().expect("acquire read lock on sources").sources.len()
    }

    /// Aggregate statistics over every registered source.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get_stats(&self) -> SourceStats {
        let state = self.state.read().expect("acquire read lock on sources");

        let mut by_type: BTreeMap<SourceType, usize> =
            SourceType::ALL.iter().map(|t| (*t, 0)).collect();
        let mut by_country: BTreeMap<String, usize> = BTreeMap::new();
        let mut score_sum = 0.0;

        for descriptor in state.sources.values() {
            *by_type.entry(descriptor.source_type).or_insert(0) += 1;
            *by_country
                .entry(descriptor.country.to_string())
                .or_insert(0) += 1;
            score_sum += descriptor.score;
        }

        let total = state.sources.len();
        SourceStats {
            total,
            active: state.sources.values().filter(|d| d.enabled).count(),
            official: state.sources.values().filter(|d| d.is_official).count(),
            by_type,
            by_country,
            average_score: if total == 0 {
                0.0
            } else {
                score_sum / total as f64
            },
        }
    }

    fn select(&self, predicate: impl Fn(&SourceDescriptor) -> bool) -> Vec<SourceDescriptor> {
        let state = self.state.read().expect("acquire read lock on sources");

        state
            .sources
            .values()
            .filter(|d| d.enabled && predicate(d))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::tests::create_test_descriptor;

    fn country(code: &str) -> CountryCode {
        CountryCode::new(code).expect("valid country")
    }

    fn id(value: &str) -> SourceId {
        SourceId::new(value).expect("valid source ID")
    }

    fn create_test_registry() -> SourceRegistry {
        let registry = SourceRegistry::new();

        let mut ml = create_test_descriptor("mercadolibre-pe", "PE", SourceType::Marketplace);
        ml.priority = 1;
        ml.is_official = true;
        ml.official_brands = vec!["Bosch".to_string(), "Fluke".to_string()];
        registry.insert(ml).expect("insert mercadolibre-pe");

        let mut efc = create_test_descriptor("efc-pe", "PE", SourceType::B2bSpecialized);
        efc.specialization = Some("ppe_tools".to_string());
        efc.capabilities.insert(Capability::TechnicalSpecs);
        registry.insert(efc).expect("insert efc-pe");

        let mut grainger = create_test_descriptor("grainger-us", "US", SourceType::B2bSpecialized);
        grainger.shipping_countries = vec![country("MX"), country("CA")];
        grainger.capabilities.insert(Capability::BulkPricing);
        grainger.score = 0.9;
        registry.insert(grainger).expect("insert grainger-us");

        let mut mcmaster = create_test_descriptor("mcmaster-carr-us", "US", SourceType::Distributor);
        mcmaster.priority = 3;
        registry.insert(mcmaster).expect("insert mcmaster-carr-us");

        registry
    }

    #[test]
    fn test_registry_new() {
        let registry = SourceRegistry::new();
        assert_eq!(registry.count(), 0);
        assert!(registry.get_active_sources().is_empty());
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = SourceRegistry::with_builtins();
        assert!(registry.count() >= 5);
        assert!(registry.get_source_by_id(&id("mercadolibre-pe")).is_ok());
    }

    #[test]
    fn test_sources_by_country_membership() {
        let registry = create_test_registry();

        let pe: Vec<String> = registry
            .get_sources_by_country(&country("PE"))
            .iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(pe, vec!["efc-pe", "mercadolibre-pe"]);

        // Shipping country counts as membership
        let mx = registry.get_sources_by_country(&country("MX"));
        assert_eq!(mx.len(), 1);
        assert_eq!(mx[0].id.as_str(), "grainger-us");

        for c in ["PE", "US", "MX", "CA", "DE"] {
            let c = country(c);
            let selected = registry.get_sources_by_country(&c);
            for descriptor in registry.get_active_sources() {
                let expected = descriptor.country == c || descriptor.shipping_countries.contains(&c);
                assert_eq!(
                    selected.iter().any(|d| d.id == descriptor.id),
                    expected,
                    "membership mismatch for {} in {c}",
                    descriptor.id
                );
            }
        }
    }

    #[test]
    fn test_global_sources_all_and_empty() {
        let registry = create_test_registry();

        let all = registry.get_global_sources(&[CountryCode::all()]);
        let ids: Vec<&str> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["mercadolibre-pe", "efc-pe", "grainger-us", "mcmaster-carr-us"]
        );

        let empty = registry.get_global_sources(&[]);
        assert_eq!(empty.len(), 4);
    }

    #[test]
    fn test_global_sources_by_countries() {
        let registry = create_test_registry();

        let sources = registry.get_global_sources(&[country("PE"), country("MX")]);
        let ids: Vec<&str> = sources.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["mercadolibre-pe", "efc-pe", "grainger-us"]);
    }

    #[test]
    fn test_queries_by_type_official_specialization_capability_brand() {
        let registry = create_test_registry();

        assert_eq!(registry.get_sources_by_type(SourceType::B2bSpecialized).len(), 2);
        assert_eq!(registry.get_official_sources().len(), 1);
        assert_eq!(registry.get_sources_by_specialization("PPE_TOOLS").len(), 1);
        assert_eq!(
            registry.get_sources_with_capability(Capability::BulkPricing)[0]
                .id
                .as_str(),
            "grainger-us"
        );
        assert!(registry
            .get_sources_with_capability(Capability::CadFiles)
            .is_empty());
        assert_eq!(registry.get_sources_by_brand("fluke").len(), 1);
        assert_eq!(registry.get_b2b_sources().len(), 3);
    }

    #[test]
    fn test_get_source_by_id_not_found() {
        let registry = create_test_registry();
        let result = registry.get_source_by_id(&id("unknown-source"));
        assert!(matches!(result, Err(SourceError::NotFound { .. })));
    }

    #[test]
    fn test_update_score_clamps_and_ignores_unknown() {
        let registry = create_test_registry();

        registry.update_score(&id("efc-pe"), 1.7, Some(420));
        let efc = registry.get_source_by_id(&id("efc-pe")).expect("efc-pe");
        assert!((efc.score - 1.0).abs() < f64::EPSILON);
        assert_eq!(efc.response_time_ms, Some(420));
        assert!(efc.last_checked.is_some());

        registry.update_score(&id("efc-pe"), -0.3, None);
        let efc = registry.get_source_by_id(&id("efc-pe")).expect("efc-pe");
        assert!(efc.score.abs() < f64::EPSILON);
        assert_eq!(efc.response_time_ms, Some(420));

        registry.update_score(&id("efc-pe"), f64::NAN, None);
        let efc = registry.get_source_by_id(&id("efc-pe")).expect("efc-pe");
        assert!(efc.score.abs() < f64::EPSILON);

        // Unknown id is a no-op
        registry.update_score(&id("ghost-source"), 0.5, None);
        assert_eq!(registry.count(), 4);
    }

    #[test]
    fn test_update_score_concurrent() {
        let registry = create_test_registry();
        let handles: Vec<_> = (0..8_u32)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        registry.update_score(&id("grainger-us"), f64::from(i) / 10.0, None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join updater");
        }

        let score = registry
            .get_source_by_id(&id("grainger-us"))
            .expect("grainger-us")
            .score;
        assert!((0.0..=0.7).contains(&score));
    }

    #[test]
    fn test_disable_source_keeps_descriptor() {
        let registry = create_test_registry();
        registry
            .disable_source(&id("efc-pe"))
            .expect("disable efc-pe");

        assert_eq!(registry.count(), 4);
        assert_eq!(registry.get_active_sources().len(), 3);
        assert!(registry.get_source_by_id(&id("efc-pe")).is_ok());
        assert!(registry
            .get_sources_by_country(&country("PE"))
            .iter()
            .all(|d| d.id.as_str() != "efc-pe"));
        assert!(registry.disable_source(&id("ghost-source")).is_err());
    }

    #[test]
    fn test_stats() {
        let registry = create_test_registry();
        registry
            .disable_source(&id("mcmaster-carr-us"))
            .expect("disable mcmaster");

        let stats = registry.get_stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.official, 1);
        assert_eq!(stats.by_type.get(&SourceType::B2bSpecialized), Some(&2));
        assert_eq!(stats.by_type.get(&SourceType::BrandDirect), Some(&0));
        assert_eq!(stats.by_country.get("US"), Some(&2));
        assert!((stats.average_score - 0.6).abs() < 1e-9);

        let json = serde_json::to_string(&stats).expect("serialize stats");
        assert!(json.contains("\"b2b_specialized\":2"));
    }

    #[test]
    fn test_stats_empty_registry() {
        let stats = SourceRegistry::new().get_stats();
        assert_eq!(stats.total, 0);
        assert!(stats.average_score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_features_follow_catalog() {
        let registry = SourceRegistry::new();
        let mut catalog = SourceCatalog::default();
        catalog.features.enable_bulk_pricing = false;
        registry.load_catalog(&catalog);
        assert!(!registry.features().enable_bulk_pricing);
    }
}
