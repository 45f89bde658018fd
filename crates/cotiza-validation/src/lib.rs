//! Cotiza Validation - Product match validation.
//!
//! Defines the [`ProductValidator`] contract the search pipeline calls to
//! judge whether each listing is the product the user asked for, plus two
//! local implementations:
//!
//! - [`HeuristicValidator`] - word overlap, brand confirmation and model extraction
//! - [`KeywordValidator`] - single-keyword check used when validation is switched off
//!
//! Validators report confidence on a 0-1 scale; the pipeline converts it to
//! the 0-100 listing scale.
//!
//! # Example
//!
//! ```rust
//! use cotiza_validation::{HeuristicValidator, ValidationRequest};
//!
//! let verdict = HeuristicValidator::new().validate(&ValidationRequest {
//!     search_query: "taladro bosch".to_string(),
//!     product_name: "Taladro Bosch GSB120".to_string(),
//!     brand: Some("Bosch".to_string()),
//!     price: 259.9,
//!     currency: "PEN".to_string(),
//!     source_type: "marketplace".to_string(),
//! });
//! assert!(verdict.is_exact_match);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod heuristic;
pub mod validator;

pub use error::{Result, ValidationError};
pub use heuristic::{extract_model, HeuristicValidator, KeywordValidator};
pub use validator::{
    ensure_same_length, ProductValidator, ValidationRequest, ValidationVerdict, ValidatorStatus,
};
