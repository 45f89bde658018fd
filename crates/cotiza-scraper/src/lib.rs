//! Cotiza Scraper - Listing adapters for product sources.
//!
//! Turns a product query plus a [`cotiza_sources::SourceDescriptor`] into
//! normalized [`Listing`]s. Adapters are resolved per source through an
//! [`AdapterRegistry`]; the [`ListingFetcher`] wraps them so that a failing
//! source never aborts a search.
//!
//! # Features
//!
//! - Table-driven search URL templates
//! - HTML result parsing with per-source CSS selector profiles
//! - Price, currency, availability and brand extraction helpers
//! - Seeded synthetic listings for demo mode and live-fetch fallback
//!
//! # Example
//!
//! ```rust
//! use cotiza_core::SourceId;
//! use cotiza_scraper::{ListingFetcher, ListingQuery, SyntheticListingGenerator};
//! use cotiza_sources::SourceRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SourceRegistry::with_builtins();
//! let source = registry.get_source_by_id(&SourceId::new("efc-pe")?)?;
//!
//! let fetcher = ListingFetcher::synthetic(SyntheticListingGenerator::new(42));
//! let listings = fetcher
//!     .fetch_listings(&source, &ListingQuery::new("casco 3m", 5))
//!     .await;
//! assert!(listings.iter().all(|l| l.synthetic));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod error;
pub mod extract;
pub mod listing;
pub mod live;
pub mod parser;
pub mod synthetic;
pub mod url_builder;

pub use adapter::{AdapterRegistry, FetchOutcome, ListingAdapter, ListingFetcher, ListingQuery};
pub use error::{Result, ScrapeError};
pub use listing::{clamp_confidence, Availability, BulkPriceTier, Listing, ValidationNote, MAX_CONFIDENCE};
pub use live::HttpListingAdapter;
pub use parser::{ListingParser, ParsedItem};
pub use synthetic::SyntheticListingGenerator;
pub use url_builder::build_search_url;
