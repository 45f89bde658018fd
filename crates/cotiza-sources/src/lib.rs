//! Cotiza Sources - Catalog of marketplaces and distributors to search.
//!
//! This crate provides the core types and functionality for managing source
//! descriptors. It ships a built-in catalog, merges an optional external TOML
//! catalog over it, and keeps the result in a shared in-memory registry.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Strongly-typed source metadata and scraper profiles
//! - **Loader** ([`loader`]): Built-in catalog and external TOML catalog loading
//! - **Registry** ([`registry`]): In-memory store with query support
//! - **Errors** ([`error`]): Source-specific error types
//!
//! # Example
//!
//! ```rust
//! use cotiza_core::CountryCode;
//! use cotiza_sources::SourceRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SourceRegistry::with_builtins();
//!
//! let peru = CountryCode::new("PE")?;
//! for source in registry.get_sources_by_country(&peru) {
//!     println!("{} ({})", source.name, source.source_type);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use definition::{
    B2bFeatures, Capability, ScraperProfile, Selectors, SourceCatalog, SourceDescriptor,
    SourceType,
};
pub use error::{Result, SourceError};
pub use loader::{builtin_catalog, merge_catalogs, CatalogLoader};
pub use registry::{SourceRegistry, SourceStats};
