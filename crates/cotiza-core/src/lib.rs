//! Cotiza Core - Foundation crate for the Cotiza price search workspace.
//!
//! This crate provides shared identifier types, error handling and
//! configuration management that the other Cotiza crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes (`SourceId`, `CountryCode`)
//!
//! # Example
//!
//! ```rust
//! use cotiza_core::{AppConfig, CountryCode, SourceId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.search.default_country, "PE");
//!
//! let source = SourceId::new("mercadolibre-pe")?;
//! let country = CountryCode::new("pe")?;
//! assert_eq!(country.as_str(), "PE");
//! # let _ = source;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, CatalogConfig, FetchMode, ScrapingConfig, SearchConfig, ValidationConfig};
pub use error::{ConfigError, ConfigResult, CotizaError, Result};
pub use types::{CountryCode, SourceId};
