// # Open Food Facts Catalog
//
// This crate provides the Open Food Facts implementation of
// `AdditiveCatalog` for the E-number service.
//
// ## Behavior
//
// - One HTTP request per call; retries and scheduling belong to the caller
// - Every request carries the configured User-Agent (Open Food Facts asks
//   clients to identify themselves)
// - Long timeout for the bulk additive list, short timeout for per-barcode
//   product lookups
// - Specific error messages for 429 and 5xx responses
// - Unparseable entries in the additive list are skipped, not fatal
//
// ## API Reference
//
// - Additive list: GET `https://world.openfoodfacts.org/additives.json`
//   returns `{"count": n, "tags": [{"id", "name", "url", "sameAs", ...}]}`
// - Product: GET `https://world.openfoodfacts.org/api/v0/product/<barcode>.json`
//   returns `{"status": 0|1, "product": {...}}`

use async_trait::async_trait;
use enumbers_core::config::CatalogConfig;
use enumbers_core::traits::{AdditiveCatalog, CatalogEntry};
use enumbers_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Catalog name used in logs and `Error::Fetch`
pub const CATALOG_NAME: &str = "openfoodfacts";

/// Open Food Facts additive catalog
///
/// Stateless apart from the pooled HTTP client; cloning the client is cheap,
/// so the catalog can be shared behind an `Arc` by the reconciler.
pub struct OpenFoodFactsCatalog {
    /// Bulk additive list endpoint
    additives_url: String,

    /// Product endpoint base
    product_url: String,

    /// Timeout for the bulk list
    catalog_timeout: Duration,

    /// Timeout for a single product lookup
    product_timeout: Duration,

    /// HTTP client (User-Agent preconfigured)
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenFoodFactsCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFoodFactsCatalog")
            .field("additives_url", &self.additives_url)
            .field("product_url", &self.product_url)
            .field("catalog_timeout", &self.catalog_timeout)
            .field("product_timeout", &self.product_timeout)
            .finish()
    }
}

impl OpenFoodFactsCatalog {
    /// Create a catalog client from configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            additives_url: config.additives_url.clone(),
            product_url: config.product_url.trim_end_matches('/').to_string(),
            catalog_timeout: Duration::from_secs(config.catalog_timeout_secs),
            product_timeout: Duration::from_secs(config.product_timeout_secs),
            client,
        })
    }

    /// URL of the product document for `barcode`
    ///
    /// Only ASCII letters and digits are kept from the barcode, so stored
    /// codes that were never sanitized cannot escape the path segment.
    pub fn product_url(&self, barcode: &str) -> Result<String> {
        let segment: String = barcode
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if segment.is_empty() {
            return Err(Error::fetch(
                CATALOG_NAME,
                format!("Barcode has no usable characters: '{}'", barcode),
            ));
        }
        Ok(format!("{}/{}.json", self.product_url, segment))
    }

    /// GET `url` and decode the JSON body
    ///
    /// Returns `Ok(None)` for 404 so product lookups can treat it as "no
    /// product".
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Option<Value>> {
        tracing::debug!("GET {} (timeout {:?})", url, timeout);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| Error::fetch(CATALOG_NAME, format!("Malformed JSON body: {}", e)))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl AdditiveCatalog for OpenFoodFactsCatalog {
    async fn fetch_additives(&self) -> Result<Vec<CatalogEntry>> {
        let body = self
            .get_json(&self.additives_url, self.catalog_timeout)
            .await?
            .ok_or_else(|| {
                Error::fetch(
                    CATALOG_NAME,
                    format!("Additive list not found at {}", self.additives_url),
                )
            })?;

        let entries = parse_additives(body)?;
        tracing::info!(
            "Fetched {} additives from {}",
            entries.len(),
            self.additives_url
        );
        Ok(entries)
    }

    async fn fetch_product(&self, barcode: &str) -> Result<Option<Value>> {
        let url = self.product_url(barcode)?;
        match self.get_json(&url, self.product_timeout).await? {
            Some(body) => Ok(parse_product(body)),
            None => Ok(None),
        }
    }

    fn catalog_name(&self) -> &'static str {
        CATALOG_NAME
    }
}

/// Bulk additive list body
#[derive(Debug, Deserialize)]
struct AdditivesBody {
    tags: Vec<Value>,
}

/// Parse the `{tags: [...]}` body of the additive list
///
/// Entries that are not objects of the expected shape are skipped with a
/// `debug!`; a body without a `tags` array is an error.
pub fn parse_additives(body: Value) -> Result<Vec<CatalogEntry>> {
    let body: AdditivesBody = serde_json::from_value(body).map_err(|e| {
        Error::fetch(
            CATALOG_NAME,
            format!("Additive list has no usable 'tags' array: {}", e),
        )
    })?;

    let total = body.tags.len();
    let entries: Vec<CatalogEntry> = body
        .tags
        .into_iter()
        .filter_map(|tag| match serde_json::from_value::<CatalogEntry>(tag) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable additive entry: {}", e);
                None
            }
        })
        .collect();

    if entries.len() < total {
        tracing::warn!(
            "Skipped {} of {} additive entries that could not be read",
            total - entries.len(),
            total
        );
    }
    Ok(entries)
}

/// Extract the product document from a `{status, product}` body
///
/// `status` 0, or a missing/null `product`, means the catalog has no such
/// product.
pub fn parse_product(mut body: Value) -> Option<Value> {
    if body.get("status").and_then(Value::as_i64) == Some(0) {
        return None;
    }
    match body.get_mut("product").map(Value::take) {
        Some(Value::Null) | None => None,
        Some(product) => Some(product),
    }
}

fn request_error(error: reqwest::Error, timeout: Duration) -> Error {
    if error.is_timeout() {
        Error::fetch(
            CATALOG_NAME,
            format!("Request timed out after {:?}", timeout),
        )
    } else {
        Error::fetch(CATALOG_NAME, format!("HTTP request failed: {}", error))
    }
}

fn status_error(status: reqwest::StatusCode, error_text: &str) -> Error {
    match status.as_u16() {
        429 => Error::fetch(
            CATALOG_NAME,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::fetch(
            CATALOG_NAME,
            format!("Open Food Facts server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::fetch(
            CATALOG_NAME,
            format!("Unexpected response: {} - {}", status, error_text),
        ),
    }
}
