//! Source descriptor types and structures.
//!
//! This module defines the data structures describing scrape targets
//! (marketplaces, B2B distributors, brand stores) as loaded from TOML catalogs.

use crate::error::{Result, SourceError};
use chrono::{DateTime, Utc};
use cotiza_core::{CountryCode, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Lowest priority value a source may carry (1 is the highest priority).
pub const MIN_PRIORITY: u8 = 1;

/// Highest priority value a source may carry.
pub const MAX_PRIORITY: u8 = 5;

/// Complete description of one remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique source identifier (e.g., "mercadolibre-pe", "grainger-us")
    pub id: SourceId,

    /// Human-readable source name
    pub name: String,

    /// Site root used to build search URLs
    pub base_url: String,

    /// Country the source operates from
    pub country: CountryCode,

    /// Source classification
    #[serde(rename = "type")]
    pub source_type: SourceType,

    /// Whether the source takes part in searches
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Selection priority, 1 (highest) to 5 (lowest)
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Whether the source is an authorized seller for `official_brands`
    #[serde(default)]
    pub is_official: bool,

    /// Brands this source sells officially
    #[serde(default)]
    pub official_brands: Vec<String>,

    /// Countries the source delivers to besides its own
    #[serde(default)]
    pub shipping_countries: Vec<CountryCode>,

    /// Data the source exposes beyond name and price
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,

    /// Product specialization (e.g. `industrial_supplies`)
    #[serde(default)]
    pub specialization: Option<String>,

    /// Free-form product categories
    #[serde(default)]
    pub categories: Vec<String>,

    /// Industrial certifications held by the source
    #[serde(default)]
    pub certifications: Vec<String>,

    /// Advisory reliability score in [0, 1]
    #[serde(default = "default_score")]
    pub score: f64,

    /// When the score was last updated
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,

    /// Last observed fetch time in milliseconds
    #[serde(default)]
    pub response_time_ms: Option<u64>,

    /// Selector profile for the live adapter
    #[serde(default)]
    pub scraper: ScraperProfile,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u8 {
    3
}

fn default_score() -> f64 {
    0.5
}

impl SourceDescriptor {
    /// Whether the source serves `country`, either from inside it or by
    /// shipping there.
    #[must_use]
    pub fn serves(&self, country: &CountryCode) -> bool {
        self.country == *country || self.shipping_countries.contains(country)
    }

    /// Whether the source advertises `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether `brand` is one of the source's official brands (case-insensitive).
    #[must_use]
    pub fn carries_brand(&self, brand: &str) -> bool {
        let brand = brand.trim().to_lowercase();
        !brand.is_empty()
            && self
                .official_brands
                .iter()
                .any(|b| b.to_lowercase() == brand)
    }

    /// Validate the descriptor for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("source name cannot be empty".to_string()));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(self.invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(self.invalid(format!(
                "priority must be {MIN_PRIORITY}-{MAX_PRIORITY}, got {}",
                self.priority
            )));
        }

        if !self.score.is_finite() {
            return Err(self.invalid("score must be a finite number".to_string()));
        }

        if self.is_official && self.official_brands.is_empty() {
            return Err(self.invalid("official sources must list official_brands".to_string()));
        }

        Ok(())
    }

    fn invalid(&self, reason: String) -> SourceError {
        SourceError::Validation {
            source_id: self.id.to_string(),
            reason,
        }
    }
}

/// Classification of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// General marketplaces (MercadoLibre, Amazon Business)
    Marketplace,
    /// Industrial B2B catalogs (Grainger, RS Components)
    B2bSpecialized,
    /// Manufacturer-run stores
    #[serde(alias = "direct_brand")]
    BrandDirect,
    /// Specialized retail chains
    RetailSpecialized,
    /// Wholesale distributors
    Distributor,
}

impl SourceType {
    /// All source types, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Marketplace,
        Self::B2bSpecialized,
        Self::BrandDirect,
        Self::RetailSpecialized,
        Self::Distributor,
    ];

    /// Wire name of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marketplace => "marketplace",
            Self::B2bSpecialized => "b2b_specialized",
            Self::BrandDirect => "brand_direct",
            Self::RetailSpecialized => "retail_specialized",
            Self::Distributor => "distributor",
        }
    }

    /// Whether sources of this type sell to businesses.
    #[must_use]
    pub fn is_b2b(&self) -> bool {
        matches!(self, Self::B2bSpecialized | Self::Distributor)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "marketplace" => Ok(Self::Marketplace),
            "b2b_specialized" | "b2b" => Ok(Self::B2bSpecialized),
            "brand_direct" | "direct_brand" => Ok(Self::BrandDirect),
            "retail_specialized" | "retail" => Ok(Self::RetailSpecialized),
            "distributor" => Ok(Self::Distributor),
            other => Err(format!("unknown source type '{other}'")),
        }
    }
}

/// Data a source exposes beyond the basic listing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Structured technical specifications
    TechnicalSpecs,
    /// Downloadable datasheets
    Datasheets,
    /// CAD drawings
    CadFiles,
    /// Quantity price tiers
    BulkPricing,
    /// Warranty terms
    WarrantyInfo,
    /// Product certifications
    Certifications,
    /// Lead time estimates
    LeadTime,
    /// Minimum order quantities
    MinimumOrderQuantity,
}

impl Capability {
    /// Wire name of the capability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TechnicalSpecs => "technical_specs",
            Self::Datasheets => "datasheets",
            Self::CadFiles => "cad_files",
            Self::BulkPricing => "bulk_pricing",
            Self::WarrantyInfo => "warranty_info",
            Self::Certifications => "certifications",
            Self::LeadTime => "lead_time",
            Self::MinimumOrderQuantity => "minimum_order_quantity",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "technical_specs" => Ok(Self::TechnicalSpecs),
            "datasheets" => Ok(Self::Datasheets),
            "cad_files" => Ok(Self::CadFiles),
            "bulk_pricing" => Ok(Self::BulkPricing),
            "warranty_info" => Ok(Self::WarrantyInfo),
            "certifications" => Ok(Self::Certifications),
            "lead_time" => Ok(Self::LeadTime),
            "minimum_order_quantity" => Ok(Self::MinimumOrderQuantity),
            other => Err(format!("unknown capability '{other}'")),
        }
    }
}

/// How the live adapter reads a source's result page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperProfile {
    /// Search URL template with `{base}` and `{q}` placeholders; overrides
    /// the built-in template table
    pub search_template: Option<String>,
    /// CSS selectors for result fields
    pub selectors: Selectors,
    /// Delay before each search page request, in milliseconds
    pub wait_ms: Option<u64>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

/// CSS selectors for one result item and its fields.
///
/// Field selectors are evaluated relative to each `item` match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// One element per result
    pub item: Option<String>,
    /// Product title
    pub product_name: Option<String>,
    /// Price text
    pub price: Option<String>,
    /// Anchor carrying the product URL
    pub link: Option<String>,
    /// Brand text
    pub brand: Option<String>,
    /// Product image
    pub image: Option<String>,
    /// Stock information
    pub availability: Option<String>,
    /// Vendor SKU
    pub sku: Option<String>,
}

/// Global flags gating the B2B extension fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct B2bFeatures {
    /// Fill `technical_specs`
    pub enable_technical_specs: bool,
    /// Fill `bulk_pricing`
    pub enable_bulk_pricing: bool,
    /// Fill `datasheet_url`
    pub enable_datasheet_extraction: bool,
    /// Fill `cad_file_url`
    pub enable_cad_file_detection: bool,
    /// Fill `minimum_order_quantity`
    pub minimum_order_quantity_detection: bool,
    /// Fill `lead_time`
    pub lead_time_extraction: bool,
}

impl Default for B2bFeatures {
    fn default() -> Self {
        Self {
            enable_technical_specs: true,
            enable_bulk_pricing: true,
            enable_datasheet_extraction: true,
            enable_cad_file_detection: true,
            minimum_order_quantity_detection: true,
            lead_time_extraction: true,
        }
    }
}

/// A catalog file: feature flags plus an ordered list of sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCatalog {
    /// B2B feature flags
    pub features: B2bFeatures,
    /// Source descriptors in file order
    pub sources: Vec<SourceDescriptor>,
}
