//! Source catalog loading from TOML.
//!
//! The built-in catalog is compiled into the crate; an optional external
//! catalog file is merged over it at registry load time.

use crate::{
    definition::{SourceCatalog, SourceDescriptor},
    error::{Result, SourceError},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BUILTIN_CATALOG: &str = include_str!("../catalog/builtin.toml");

/// Parse the built-in catalog shipped with the crate.
#[must_use]
pub fn builtin_catalog() -> SourceCatalog {
    toml::from_str(BUILTIN_CATALOG).expect("built-in source catalog is valid TOML")
}

/// Loader for an external source catalog file.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    /// Path to the catalog TOML file
    path: PathBuf,
}

impl CatalogLoader {
    /// Create a loader for the given catalog file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path this loader reads from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the catalog file.
    ///
    /// Individual descriptors are not validated here; see [`merge_catalogs`].
    ///
    /// # Errors
    /// Returns error if the file can't be read or isn't a valid catalog.
    pub fn load(&self) -> Result<SourceCatalog> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| SourceError::Load {
            path: self.path.display().to_string(),
            source: e,
        })?;

        let catalog = Self::parse_str(&contents, &self.path.display().to_string())?;

        debug!(
            path = %self.path.display(),
            count = catalog.sources.len(),
            "loaded external source catalog"
        );

        Ok(catalog)
    }

    /// Parse catalog TOML from a string; `origin` labels errors.
    pub fn parse_str(contents: &str, origin: &str) -> Result<SourceCatalog> {
        toml::from_str(contents).map_err(|e| SourceError::Parse {
            path: origin.to_string(),
            source: e,
        })
    }
}

/// Merge an external catalog over the built-in one.
///
/// - Descriptors failing validation are logged and skipped.
/// - An external entry replaces the built-in entry with the same id, keeping
///   the built-in position; new ids are appended in file order.
/// - Entries with `enabled = false` are dropped after overriding, so an
///   external catalog can switch off a built-in source.
/// - External feature flags replace the built-in flags.
#[must_use]
pub fn merge_catalogs(builtins: &SourceCatalog, external: Option<&SourceCatalog>) -> SourceCatalog {
    let mut merged: Vec<SourceDescriptor> = Vec::new();

    let mut push = |descriptor: &SourceDescriptor, origin: &str| {
        if let Err(e) = descriptor.validate() {
            warn!(
                source_id = %descriptor.id,
                origin,
                error = %e,
                "skipping invalid source descriptor"
            );
            return;
        }

        if let Some(existing) = merged.iter_mut().find(|d| d.id == descriptor.id) {
            debug!(source_id = %descriptor.id, origin, "overriding source descriptor");
            *existing = descriptor.clone();
        } else {
            merged.push(descriptor.clone());
        }
    };

    for descriptor in &builtins.sources {
        push(descriptor, "builtin");
    }

    if let Some(external) = external {
        for descriptor in &external.sources {
            push(descriptor, "external");
        }
    }

    let before = merged.len();
    merged.retain(|d| d.enabled);
    let disabled = before - merged.len();

    info!(
        count = merged.len(),
        disabled,
        external = external.is_some(),
        "merged source catalogs"
    );

    SourceCatalog {
        features: external.map_or(builtins.features, |e| e.features),
        sources: merged,
    }
}
