//! Cotiza Search - Product search pipeline.
//!
//! Selects sources from a [`cotiza_sources::SourceRegistry`], fetches them
//! concurrently through a [`cotiza_scraper::ListingFetcher`], rescores the
//! listings with a [`cotiza_validation::ProductValidator`], then filters and
//! ranks them. Multi-country searches also get a [`GlobalAnalysis`] that
//! compares the cheapest offer abroad with local availability.
//!
//! # Example
//!
//! ```rust
//! use cotiza_core::{AppConfig, FetchMode};
//! use cotiza_search::{SearchPipeline, SearchRequest};
//! use cotiza_sources::SourceRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = AppConfig::default();
//! config.scraping.fetch_mode = FetchMode::Synthetic;
//!
//! let pipeline = SearchPipeline::from_config(&config, SourceRegistry::with_builtins())?;
//! let response = pipeline
//!     .search(SearchRequest::new("taladro bosch").country("PE").alternatives(true))
//!     .await?;
//!
//! for listing in &response.results {
//!     println!("{} {} {}", listing.source_name, listing.price, listing.currency);
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

pub mod arbitrage;
pub mod cache;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod request;

pub use arbitrage::{
    analyze_global, country_from_source_id, estimate_delivery_days, BestPrice, BestTotalCost,
    GlobalAnalysis, RecommendedAction, SavingsAnalysis,
};
pub use cache::{request_cache_key, search_cache_key, source_cache_key, MemoryCache, SearchCache};
pub use error::{InvalidRequest, Result, SearchError};
pub use filter::{compare_listings, filter_listings, sort_listings, FilterOptions};
pub use pipeline::{normalize_confidence, SearchPipeline};
pub use request::{SearchRequest, SearchResponse, SearchScope};
