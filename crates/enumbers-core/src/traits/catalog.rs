// # Additive Catalog Trait
//
// Defines the interface for the third-party additive catalog.
//
// ## Implementations
//
// - Open Food Facts: `enumbers-openfoodfacts` crate
//
// ## Contract
//
// Catalogs are single-shot: one HTTP request per call, no retries, no
// caching. A failed call is reported as `Error::Fetch` and the caller
// decides what a failure means (the reconciler treats it as "nothing to
// update").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::record::ExternalAdditive;

/// One entry of the external additive list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Catalog identifier (e.g. `en:e330`)
    #[serde(default)]
    pub id: Option<String>,

    /// Display name, starting with the code token (e.g. `E330 - Citric acid`)
    #[serde(default)]
    pub name: String,

    /// Catalog page URL
    #[serde(default)]
    pub url: String,

    /// Linked-data identifiers
    #[serde(default)]
    pub same_as: Vec<String>,
}

impl CatalogEntry {
    /// Create an entry with just a name and URL
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            url: url.into(),
            same_as: Vec::new(),
        }
    }

    /// Attach linked-data identifiers
    pub fn with_same_as(mut self, same_as: Vec<String>) -> Self {
        self.same_as = same_as;
        self
    }

    /// The catalog details stored on a matched record
    pub fn to_external(&self) -> ExternalAdditive {
        ExternalAdditive {
            name: self.name.clone(),
            url: self.url.clone(),
            same_as: self.same_as.clone(),
        }
    }
}

/// Trait for external additive catalogs
#[async_trait]
pub trait AdditiveCatalog: Send + Sync {
    /// Fetch the full additive list, in catalog order
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<CatalogEntry>)`: The snapshot
    /// - `Err(Error::Fetch)`: Network error, non-success status, or malformed body
    async fn fetch_additives(&self) -> Result<Vec<CatalogEntry>, crate::Error>;

    /// Look up one product by barcode
    ///
    /// # Returns
    ///
    /// - `Ok(Some(document))`: The product document, passed through as-is
    /// - `Ok(None)`: The catalog has no product for this barcode
    /// - `Err(Error::Fetch)`: The lookup failed
    async fn fetch_product(&self, barcode: &str)
    -> Result<Option<serde_json::Value>, crate::Error>;

    /// Catalog name (for logging)
    fn catalog_name(&self) -> &'static str;
}
