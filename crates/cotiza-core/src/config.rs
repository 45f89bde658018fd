//! Configuration management for Cotiza.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main application configuration.
///
/// This is loaded from `~/.config/cotiza/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search pipeline settings
    pub search: SearchConfig,
    /// Listing fetch settings
    pub scraping: ScrapingConfig,
    /// Product validation settings
    pub validation: ValidationConfig,
    /// External source catalog settings
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `COTIZA_DEFAULT_COUNTRY`: Override the single-country default
    /// - `COTIZA_MIN_CONFIDENCE`: Override the minimum confidence threshold
    /// - `COTIZA_MAX_CONCURRENT_FETCHES`: Override the fetch concurrency cap
    /// - `COTIZA_FETCH_MODE`: `live`, `live-with-fallback` or `synthetic`
    /// - `COTIZA_CATALOG_PATH`: Path to an external source catalog
    /// - `COTIZA_VALIDATION_ENABLED`: Use the heuristic validator (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `COTIZA_*` environment overrides in place.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("COTIZA_DEFAULT_COUNTRY") {
            let country = val.trim().to_uppercase();
            if !country.is_empty() {
                tracing::debug!("Override search.default_country from env: {}", country);
                self.search.default_country = country;
            }
        }

        if let Some(val) = lookup("COTIZA_MIN_CONFIDENCE") {
            if let Ok(min) = val.parse() {
                self.search.min_confidence = min;
                tracing::debug!("Override search.min_confidence from env: {}", min);
            }
        }

        if let Some(val) = lookup("COTIZA_MAX_CONCURRENT_FETCHES") {
            if let Ok(max) = val.parse() {
                self.search.max_concurrent_fetches = max;
                tracing::debug!("Override search.max_concurrent_fetches from env: {}", max);
            }
        }

        if let Some(val) = lookup("COTIZA_FETCH_MODE") {
            if let Ok(mode) = val.parse() {
                self.scraping.fetch_mode = mode;
                tracing::debug!("Override scraping.fetch_mode from env: {}", mode);
            }
        }

        if let Some(val) = lookup("COTIZA_CATALOG_PATH") {
            if !val.is_empty() {
                tracing::debug!("Override catalog.path from env: {}", val);
                self.catalog.path = Some(PathBuf::from(val));
            }
        }

        if let Some(val) = lookup("COTIZA_VALIDATION_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.validation.enabled = enabled;
                tracing::debug!("Override validation.enabled from env: {}", enabled);
            }
        }
    }

    /// Check numeric settings for values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);

        if !in_range(self.search.min_confidence) {
            return Err(invalid("search.min_confidence", "must be within 0-100"));
        }
        if !in_range(self.search.exact_match_confidence) {
            return Err(invalid("search.exact_match_confidence", "must be within 0-100"));
        }
        if self.search.max_concurrent_fetches == 0 {
            return Err(invalid("search.max_concurrent_fetches", "must be at least 1"));
        }
        if self.search.fetch_timeout_secs == 0 {
            return Err(invalid("search.fetch_timeout_secs", "must be at least 1"));
        }
        if self.scraping.request_timeout_secs == 0 {
            return Err(invalid("scraping.request_timeout_secs", "must be at least 1"));
        }
        let country = &self.search.default_country;
        if !(2..=3).contains(&country.len()) || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid(
                "search.default_country",
                "must be a 2-3 letter country code",
            ));
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/cotiza/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "cotiza", "cotiza").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Search pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Country used when a request names neither `country` nor `countries`
    pub default_country: String,
    /// Listings scoring below this confidence (0-100) are dropped
    pub min_confidence: f64,
    /// Threshold applied when alternatives are not requested
    pub exact_match_confidence: f64,
    /// Upper bound on in-flight source fetches per search
    pub max_concurrent_fetches: usize,
    /// Per-source fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Per-source result cap for single-country searches
    pub default_max_results: usize,
    /// Per-source result cap for global searches
    pub default_global_max_results: usize,
    /// Time-to-live for cached search responses
    pub cache_ttl_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_country: "PE".to_string(),
            min_confidence: 50.0,
            exact_match_confidence: 70.0,
            max_concurrent_fetches: 8,
            fetch_timeout_secs: 20,
            default_max_results: 10,
            default_global_max_results: 20,
            cache_ttl_secs: 300,
        }
    }
}

/// How listings are obtained from a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMode {
    /// Live HTTP fetch only; failures yield no listings
    #[default]
    Live,
    /// Live HTTP fetch, synthetic listings when the fetch fails
    LiveWithFallback,
    /// Synthetic listings only (demo mode)
    Synthetic,
}

impl FetchMode {
    /// Whether this mode may produce synthetic listings.
    #[must_use]
    pub fn allows_synthetic(self) -> bool {
        !matches!(self, Self::Live)
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Live => "live",
            Self::LiveWithFallback => "live-with-fallback",
            Self::Synthetic => "synthetic",
        };
        f.write_str(s)
    }
}

impl FromStr for FetchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "live-with-fallback" | "live_with_fallback" | "fallback" => Ok(Self::LiveWithFallback),
            "synthetic" | "demo" => Ok(Self::Synthetic),
            other => Err(invalid(
                "scraping.fetch_mode",
                &format!("unknown fetch mode '{other}'"),
            )),
        }
    }
}

/// Listing fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Live, live with synthetic fallback, or synthetic only
    pub fetch_mode: FetchMode,
    /// User agent string for live requests
    pub user_agent: String,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Base seed for the synthetic listing generator
    pub synthetic_seed: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            fetch_mode: FetchMode::Live,
            user_agent: "Mozilla/5.0 (compatible; Cotiza/0.1; +https://github.com/cotiza/cotiza)"
                .to_string(),
            request_timeout_secs: 15,
            synthetic_seed: 42,
        }
    }
}

/// Product validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Use the heuristic validator; `false` selects the keyword validator
    pub enabled: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// External source catalog settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Optional TOML catalog merged over the built-in sources
    pub path: Option<PathBuf>,
}
