//! Seeded synthetic listings.
//!
//! Used in demo mode and as a degradation path when a live fetch fails.
//! Every listing carries `synthetic = true`. Generation for one source is
//! seeded from `(seed, source id, query)`, so results do not depend on the
//! order in which concurrent fetches complete.

use crate::{
    adapter::{ListingAdapter, ListingQuery},
    error::Result,
    extract::{
        confidence_score, currency_for_country, detect_brand, is_official_match, round_price,
        slugify, KNOWN_BRANDS,
    },
    listing::{Availability, BulkPriceTier, Listing},
};
use async_trait::async_trait;
use cotiza_sources::{B2bFeatures, Capability, SourceDescriptor};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

const AVAILABILITY_POOL: [Availability; 3] = [
    Availability::InStock,
    Availability::InStock,
    Availability::Limited,
];

/// Listing URL shapes as (source id, template, item number offset).
/// Placeholders: `{base}`, `{slug}`, `{n}` (offset + index) and `{code}`
/// (random product code).
const LISTING_URL_TEMPLATES: &[(&str, &str, usize)] = &[
    ("mercadolibre-pe", "https://articulo.mercadolibre.com.pe/MPE-{n}-{slug}", 600_000_000),
    ("mercadolibre-mx", "https://articulo.mercadolibre.com.mx/MLM-{n}-{slug}", 700_000_000),
    ("mercadolibre-cl", "https://articulo.mercadolibre.cl/MLC-{n}-{slug}", 500_000_000),
    ("mercadolibre-ar", "https://articulo.mercadolibre.com.ar/MLA-{n}-{slug}", 800_000_000),
    ("efc-pe", "https://www.efc.com.pe/producto/{slug}-{n}", 1000),
    ("amazon-business-us", "https://www.amazon.com/dp/B0{code}", 0),
    ("grainger-us", "https://www.grainger.com/product/{code}", 0),
];

const DEFAULT_LISTING_URL: &str = "{base}/producto/{slug}-{n}";

const BULK_TIERS: [(u32, f64); 3] = [(10, 0.95), (50, 0.90), (100, 0.85)];

/// Base prices as (keywords, Peru, United States, elsewhere).
const PRICE_TABLE: &[(&[&str], f64, f64, f64)] = &[
    (&["nivel", "level"], 80.0, 25.0, 60.0),
    (&["taladro", "drill"], 200.0, 80.0, 150.0),
    (&["multimetro", "multímetro", "multimeter"], 120.0, 45.0, 90.0),
    (&["llave", "wrench"], 35.0, 15.0, 25.0),
];

const DEFAULT_BASE_PRICE: f64 = 50.0;

/// Generator of plausible placeholder listings.
#[derive(Debug, Clone)]
pub struct SyntheticListingGenerator {
    seed: u64,
    features: B2bFeatures,
}

impl SyntheticListingGenerator {
    /// Create a generator with all B2B feature flags on.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            features: B2bFeatures::default(),
        }
    }

    /// Gate the B2B extension fields with the catalog's feature flags.
    #[must_use]
    pub fn with_features(mut self, features: B2bFeatures) -> Self {
        self.features = features;
        self
    }

    /// Generate 1-3 listings (capped by `query.max_results`) for `source`.
    #[must_use]
    pub fn generate(&self, source: &SourceDescriptor, query: &ListingQuery) -> Vec<Listing> {
        let mut rng = StdRng::seed_from_u64(self.source_seed(source, &query.product));
        let count = rng.gen_range(1..=3_usize).min(query.max_results);

        let product = query.product.trim();
        let detected = detect_brand(product);
        let slug = slugify(product);
        let country = source.country.as_str();
        let currency = currency_for_country(country);
        let base_price = base_price(product, country);

        let listings: Vec<Listing> = (0..count)
            .map(|index| {
                let brand = detected.map_or_else(|| rotate_brand(source, index), str::to_string);
                let product_name = if product.to_lowercase().contains(&brand.to_lowercase()) {
                    format!("{product} Modelo {}", index + 1)
                } else {
                    format!("{brand} {product} Modelo {}", index + 1)
                };
                let price = round_price(base_price * rng.gen_range(0.8..1.2));
                let url = listing_url(source, &slug, index, &mut rng);

                let mut listing = Listing::new(
                    source.id.clone(),
                    source.name.clone(),
                    product_name,
                    price,
                    currency,
                    url,
                );
                listing.is_official_source = is_official_match(source, &listing.product_name, Some(&brand));
                listing.confidence_score = confidence_score(
                    product,
                    &listing.product_name,
                    listing.is_official_source,
                    Some(&brand),
                );
                listing.availability = AVAILABILITY_POOL[rng.gen_range(0..AVAILABILITY_POOL.len())];
                listing.image_url = Some(format!(
                    "{}/images/{slug}-{index}.jpg",
                    source.base_url.trim_end_matches('/')
                ));
                listing.brand = Some(brand);
                listing.synthetic = true;

                self.fill_b2b_fields(&mut listing, source, &slug, index, &mut rng);
                listing
            })
            .collect();

        debug!(
            source_id = %source.id,
            count = listings.len(),
            "generated synthetic listings"
        );

        listings
    }

    fn fill_b2b_fields(
        &self,
        listing: &mut Listing,
        source: &SourceDescriptor,
        slug: &str,
        index: usize,
        rng: &mut StdRng,
    ) {
        let base = source.base_url.trim_end_matches('/');
        let features = &self.features;

        if source.has_capability(Capability::TechnicalSpecs) && features.enable_technical_specs {
            listing.technical_specs = Some(technical_specs(source.specialization.as_deref(), rng));
        }
        if source.has_capability(Capability::Datasheets) && features.enable_datasheet_extraction {
            listing.datasheet_url = Some(format!("{base}/datasheets/{slug}-{index}.pdf"));
        }
        if source.has_capability(Capability::CadFiles) && features.enable_cad_file_detection {
            listing.cad_file_url = Some(format!("{base}/cad/{slug}-{index}.dwg"));
        }
        if source.has_capability(Capability::BulkPricing) && features.enable_bulk_pricing {
            listing.bulk_pricing = BULK_TIERS
                .iter()
                .map(|(quantity, factor)| BulkPriceTier {
                    quantity: *quantity,
                    price: round_price(listing.price * factor),
                    currency: listing.currency.clone(),
                })
                .collect();
        }
        if source.has_capability(Capability::Certifications) {
            listing.certifications.clone_from(&source.certifications);
        }
        if source.has_capability(Capability::LeadTime) && features.lead_time_extraction {
            listing.lead_time = Some(format!("{} days", rng.gen_range(1..=14)));
        }
        if source.has_capability(Capability::MinimumOrderQuantity)
            && features.minimum_order_quantity_detection
        {
            listing.minimum_order_quantity = Some(rng.gen_range(1..=10));
        }
        if source.has_capability(Capability::WarrantyInfo) {
            let years: u32 = rng.gen_range(1..=3);
            let unit = if years == 1 { "year" } else { "years" };
            listing.warranty = Some(format!("{years} {unit} manufacturer warranty"));
        }
    }

    // FNV-1a over the seed, source id and normalized query
    fn source_seed(&self, source: &SourceDescriptor, product: &str) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0100_0000_01b3;

        let product = product.trim().to_lowercase();
        self.seed
            .to_le_bytes()
            .iter()
            .chain(source.id.as_str().as_bytes())
            .chain(&[0xff])
            .chain(product.as_bytes())
            .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
    }
}

#[async_trait]
impl ListingAdapter for SyntheticListingGenerator {
    async fn fetch(&self, source: &SourceDescriptor, query: &ListingQuery) -> Result<Vec<Listing>> {
        Ok(self.generate(source, query))
    }

    fn adapter_id(&self) -> &str {
        "synthetic"
    }
}

fn base_price(product: &str, country: &str) -> f64 {
    let product = product.to_lowercase();
    PRICE_TABLE
        .iter()
        .find(|(keywords, ..)| keywords.iter().any(|k| product.contains(k)))
        .map_or(DEFAULT_BASE_PRICE, |(_, pe, us, other)| match country {
            "PE" => *pe,
            "US" => *us,
            _ => *other,
        })
}

fn rotate_brand(source: &SourceDescriptor, index: usize) -> String {
    if source.official_brands.is_empty() {
        KNOWN_BRANDS[index % KNOWN_BRANDS.len()].to_string()
    } else {
        source.official_brands[index % source.official_brands.len()].clone()
    }
}

fn random_code(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

fn listing_url(source: &SourceDescriptor, slug: &str, index: usize, rng: &mut StdRng) -> String {
    let (template, offset) = LISTING_URL_TEMPLATES
        .iter()
        .find(|(id, ..)| *id == source.id.as_str())
        .map_or((DEFAULT_LISTING_URL, 0), |(_, template, offset)| (*template, *offset));

    let mut url = template
        .replace("{base}", source.base_url.trim_end_matches('/'))
        .replace("{slug}", slug)
        .replace("{n}", &(offset + index).to_string());
    if url.contains("{code}") {
        url = url.replace("{code}", &random_code(rng, 6));
    }
    url
}

fn technical_specs(specialization: Option<&str>, rng: &mut StdRng) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        specs.insert(key.to_string(), value);
    };

    put("Weight", format!("{:.2} kg", rng.gen_range(0.1..5.1)));
    put(
        "Dimensions",
        format!(
            "{}x{}x{} cm",
            rng.gen_range(10..60),
            rng.gen_range(10..60),
            rng.gen_range(10..60)
        ),
    );
    put("Material", "Stainless steel".to_string());

    match specialization {
        Some("electronics_automation") => {
            put("Voltage", format!("{}V", rng.gen_range(12..232)));
            put("Current", format!("{:.2}A", rng.gen_range(0.1..10.1)));
            put("Frequency", "50/60 Hz".to_string());
            put("Operating temperature", "-20°C to +70°C".to_string());
            put("Ingress protection", "IP65".to_string());
        }
        Some("industrial_supplies") => {
            put("Load capacity", format!("{} kg", rng.gen_range(100..1100)));
            put("Max pressure", format!("{} bar", rng.gen_range(10..110)));
            put("Max temperature", format!("{}°C", rng.gen_range(50..250)));
            put("Certification", "ISO 9001".to_string());
        }
        Some("ppe_tools") => {
            put("Protection level", "EN 388".to_string());
            put("Size", "M/L/XL".to_string());
            put("Color", "Yellow/Black".to_string());
            put("CE marked", "Yes".to_string());
            put("Cut resistance", "Level 5".to_string());
        }
        Some("fasteners_tools") => {
            put("Thread", format!("M{}", rng.gen_range(6..26)));
            put("Length", format!("{} mm", rng.gen_range(10..110)));
            put("Property class", "8.8".to_string());
            put("Finish", "Galvanized".to_string());
        }
        Some("technical_components") => {
            put("Tolerance", "±0.1mm".to_string());
            put("Hardness", format!("{} HRC", rng.gen_range(40..70)));
            put("Surface finish", "Ra 0.8".to_string());
            put("Certified material", "AISI 316L".to_string());
        }
        _ => {}
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::descriptor;
    use cotiza_sources::SourceType;

    #[test]
    fn test_generation_is_deterministic() {
        let source = descriptor("mercadolibre-pe", "PE", SourceType::Marketplace);
        let query = ListingQuery::new("taladro bosch", 10);
        let generator = SyntheticListingGenerator::new(42);

        let first = generator.generate(&source, &query);
        let second = generator.generate(&source, &query);

        let strip = |listings: Vec<Listing>| {
            listings
                .into_iter()
                .map(|l| (l.product_name, l.price.to_bits(), l.url, l.availability))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(first), strip(second));
    }

    #[test]
    fn test_generated_listings_are_well_formed() {
        let source = descriptor("mercadolibre-pe", "PE", SourceType::Marketplace);
        let listings = SyntheticListingGenerator::new(42)
            .generate(&source, &ListingQuery::new("Taladro Bosch", 10));

        assert!((1..=3).contains(&listings.len()));
        for (index, listing) in listings.iter().enumerate() {
            assert!(listing.is_valid());
            assert!(listing.synthetic);
            assert_eq!(listing.currency, "PEN");
            assert_eq!(listing.brand.as_deref(), Some("Bosch"));
            assert_eq!(listing.product_name, format!("Taladro Bosch Modelo {}", index + 1));
            assert!((160.0..=240.0).contains(&listing.price));
            assert!(listing.url.starts_with(&format!(
                "https://articulo.mercadolibre.com.pe/MPE-{}-taladro-bosch",
                600_000_000 + index
            )));
            assert!(listing.confidence_score > 0.0 && listing.confidence_score <= 100.0);
        }
    }

    #[test]
    fn test_listing_url_shapes() {
        let mut rng = StdRng::seed_from_u64(9);

        let efc = descriptor("efc-pe", "PE", SourceType::B2bSpecialized);
        assert_eq!(
            listing_url(&efc, "casco-3m", 2, &mut rng),
            "https://www.efc.com.pe/producto/casco-3m-1002"
        );

        let grainger = descriptor("grainger-us", "US", SourceType::B2bSpecialized);
        let url = listing_url(&grainger, "drill", 0, &mut rng);
        let code = url
            .strip_prefix("https://www.grainger.com/product/")
            .expect("grainger product URL");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        let other = descriptor("ferreteria-pe", "PE", SourceType::Marketplace);
        assert_eq!(
            listing_url(&other, "nivel", 1, &mut rng),
            "https://ferreteria-pe.example.com/producto/nivel-1"
        );
    }

    #[test]
    fn test_count_respects_max_results() {
        let source = descriptor("efc-pe", "PE", SourceType::B2bSpecialized);
        let generator = SyntheticListingGenerator::new(1);
        for seed_query in ["casco", "guantes", "lentes", "arnés", "botas"] {
            assert!(generator.generate(&source, &ListingQuery::new(seed_query, 1)).len() <= 1);
        }
        assert!(generator.generate(&source, &ListingQuery::new("casco", 0)).is_empty());
    }

    #[test]
    fn test_brand_rotation_without_detected_brand() {
        let mut source = descriptor("bosch-store-pe", "PE", SourceType::BrandDirect);
        source.is_official = true;
        source.official_brands = vec!["Bosch".to_string()];

        let listings = SyntheticListingGenerator::new(3).generate(&source, &ListingQuery::new("nivel laser", 10));
        for listing in &listings {
            assert_eq!(listing.brand.as_deref(), Some("Bosch"));
            assert!(listing.product_name.starts_with("Bosch nivel laser"));
            assert!(listing.is_official_source);
        }
    }

    #[test]
    fn test_b2b_fields_follow_capabilities_and_flags() {
        let mut source = descriptor("rs-components-uk", "UK", SourceType::B2bSpecialized);
        source.specialization = Some("electronics_automation".to_string());
        source.certifications = vec!["ISO 9001".to_string()];
        source.capabilities = [
            Capability::TechnicalSpecs,
            Capability::Datasheets,
            Capability::CadFiles,
            Capability::BulkPricing,
            Capability::Certifications,
        ]
        .into_iter()
        .collect();

        let query = ListingQuery::new("relay 24v", 10);
        let listings = SyntheticListingGenerator::new(9).generate(&source, &query);
        let first = &listings[0];

        let specs = first.technical_specs.as_ref().expect("technical specs present");
        assert!(specs.contains_key("Voltage"));
        assert!(specs.contains_key("Weight"));
        assert!(first.datasheet_url.as_deref().is_some_and(|u| u.ends_with(".pdf")));
        assert!(first.cad_file_url.is_some());
        assert_eq!(first.currency, "GBP");
        assert_eq!(first.certifications, vec!["ISO 9001".to_string()]);
        assert!(first.lead_time.is_none());

        let tiers: Vec<u32> = first.bulk_pricing.iter().map(|t| t.quantity).collect();
        assert_eq!(tiers, vec![10, 50, 100]);
        assert!(first.bulk_pricing[2].price < first.price);

        let features = B2bFeatures {
            enable_cad_file_detection: false,
            enable_bulk_pricing: false,
            ..B2bFeatures::default()
        };
        let gated = SyntheticListingGenerator::new(9)
            .with_features(features)
            .generate(&source, &query);
        assert!(gated[0].cad_file_url.is_none());
        assert!(gated[0].bulk_pricing.is_empty());
        assert!(gated[0].datasheet_url.is_some());
    }

    #[test]
    fn test_base_price_table() {
        assert!((base_price("Nivel de burbuja", "PE") - 80.0).abs() < f64::EPSILON);
        assert!((base_price("multimeter fluke", "US") - 45.0).abs() < f64::EPSILON);
        assert!((base_price("llave inglesa", "MX") - 25.0).abs() < f64::EPSILON);
        assert!((base_price("casco", "PE") - DEFAULT_BASE_PRICE).abs() < f64::EPSILON);
    }
}
