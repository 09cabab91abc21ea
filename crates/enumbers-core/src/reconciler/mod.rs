//! Catalog reconciliation
//!
//! The Reconciler is responsible for:
//! - Fetching the external additive catalog
//! - Matching catalog entries to local records by normalized code
//! - Attaching catalog details, flagging vanished codes, adding new ones
//! - Persisting the merged collection through the [`RecordStore`]
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   fetch_additives()   ┌──────────────┐
//! │ AdditiveCatalog  │──────────────────────▶│  Reconciler  │
//! └──────────────────┘                       └──────────────┘
//!                                                   │ mutate_and_reload()
//!                                                   ▼
//!                                           ┌──────────────┐
//!                                           │ RecordStore  │
//!                                           └──────────────┘
//! ```
//!
//! ## Merge Rules
//!
//! 1. Catalog entries are keyed by the normalized `E<digits>` token at the
//!    start of their name; entries without one are skipped, and so are
//!    entries whose code would not survive storage unchanged (longer than
//!    [`MAX_CODE_LEN`](crate::record::MAX_CODE_LEN)). When two entries share
//!    a key, the later one wins.
//! 2. Local records matching a key get `externalAdditive` and lose `removed`.
//! 3. Local records matching nothing get `removed: true` and lose
//!    `externalAdditive`. Records are never deleted here.
//! 4. Keys with no local record become new records.
//!
//! A failed fetch changes nothing and reports zero updates.

pub mod scheduler;

pub use scheduler::{ReconcileScheduler, SchedulerEvent, SchedulerHandle};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{Record, catalog_code, sanitize_code};
use crate::store::RecordStore;
use crate::traits::{AdditiveCatalog, CatalogEntry};

/// Outcome of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Records touched (matched + flagged removed + added)
    pub updated: usize,

    /// Local records that matched a catalog entry
    pub matched: usize,

    /// Local records flagged as removed
    pub flagged_removed: usize,

    /// New records appended from the catalog
    pub added: usize,

    /// Entries received from the catalog
    pub fetched: usize,

    /// Entries without a leading `E<digits>` token, or with a code too long
    /// to store
    pub skipped_entries: usize,

    /// Codes that appeared more than once in the catalog (later entry kept)
    pub duplicate_codes: Vec<String>,

    /// Why the catalog could not be used, when the run was a no-op
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,

    /// When the run finished
    pub completed_at: DateTime<Utc>,
}

impl ReconcileReport {
    /// Report for a run that changed nothing
    pub fn empty() -> Self {
        Self {
            updated: 0,
            matched: 0,
            flagged_removed: 0,
            added: 0,
            fetched: 0,
            skipped_entries: 0,
            duplicate_codes: Vec::new(),
            fetch_error: None,
            completed_at: Utc::now(),
        }
    }

    fn fetch_failed(error: &Error) -> Self {
        Self {
            fetch_error: Some(error.to_string()),
            ..Self::empty()
        }
    }
}

/// Catalog entries keyed by normalized code, in first-seen order
#[derive(Debug, Default)]
pub struct CatalogIndex {
    order: Vec<String>,
    entries: HashMap<String, CatalogEntry>,
    fetched: usize,
    skipped: usize,
    duplicates: Vec<String>,
}

impl CatalogIndex {
    /// Index a catalog snapshot
    pub fn build(snapshot: Vec<CatalogEntry>) -> Self {
        let mut index = Self {
            fetched: snapshot.len(),
            ..Self::default()
        };

        for entry in snapshot {
            let Some(key) = catalog_code(&entry.name) else {
                index.skipped += 1;
                continue;
            };

            // A truncated code would never match its own catalog entry again
            if sanitize_code(&key) != key {
                warn!(
                    "Skipping catalog entry '{}': code {} is too long to store",
                    entry.name, key
                );
                index.skipped += 1;
                continue;
            }

            if index.entries.insert(key.clone(), entry).is_some() {
                // Last entry wins; surfaced so bad upstream data is visible
                warn!("Catalog lists {} more than once, keeping the later entry", key);
                index.duplicates.push(key);
            } else {
                index.order.push(key);
            }
        }

        index
    }

    /// Entry for a normalized code
    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    /// Number of distinct codes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no entry had a usable code
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &CatalogEntry)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).map(|entry| (key, entry)))
    }
}

/// Merge a catalog index into a collection in place
///
/// Every local record is visited exactly once; new records are appended in
/// catalog order after the existing ones.
pub fn merge_catalog(records: &mut Vec<Record>, index: &CatalogIndex) -> ReconcileReport {
    let mut report = ReconcileReport {
        fetched: index.fetched,
        skipped_entries: index.skipped,
        duplicate_codes: index.duplicates.clone(),
        ..ReconcileReport::empty()
    };

    let local_keys: HashSet<String> = records.iter().map(Record::match_key).collect();

    for record in records.iter_mut() {
        match index.get(&record.match_key()) {
            Some(entry) => {
                record.external_additive = Some(entry.to_external());
                record.removed = None;
                report.matched += 1;
            }
            None => {
                record.removed = Some(true);
                record.external_additive = None;
                report.flagged_removed += 1;
            }
        }
    }

    for (key, entry) in index.iter() {
        if local_keys.contains(key) {
            continue;
        }
        let name = if entry.name.trim().is_empty() {
            key
        } else {
            &entry.name
        };
        let mut record = Record::new(key, name);
        record.external_additive = Some(entry.to_external());
        debug!("Adding {} from catalog", record.code);
        records.push(record);
        report.added += 1;
    }

    report.updated = report.matched + report.flagged_removed + report.added;
    report.completed_at = Utc::now();
    report
}

/// Result of looking up one record's barcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductOutcome {
    /// A product document was attached to the record
    Attached,
    /// The catalog has no product for this barcode
    NotFound,
}

/// Per-record entry of a product refresh
#[derive(Debug)]
pub struct ProductLookup {
    /// Code of the record, used as the barcode
    pub code: String,
    /// What happened
    pub outcome: Result<ProductOutcome>,
}

/// Outcome of a product refresh, one entry per record
#[derive(Debug, Default)]
pub struct ProductRefreshReport {
    /// Lookups in collection order
    pub lookups: Vec<ProductLookup>,
}

impl ProductRefreshReport {
    /// Records that received a product document
    pub fn attached(&self) -> usize {
        self.count(|outcome| matches!(outcome, Ok(ProductOutcome::Attached)))
    }

    /// Records the catalog had no product for
    pub fn not_found(&self) -> usize {
        self.count(|outcome| matches!(outcome, Ok(ProductOutcome::NotFound)))
    }

    /// Records whose lookup failed
    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }

    fn count(&self, pred: impl Fn(&Result<ProductOutcome>) -> bool) -> usize {
        self.lookups.iter().filter(|l| pred(&l.outcome)).count()
    }
}

/// Synchronizes the record store with an external catalog
pub struct Reconciler {
    store: Arc<RecordStore>,
    catalog: Arc<dyn AdditiveCatalog>,
}

impl Reconciler {
    /// Create a reconciler over a store and a catalog
    pub fn new(store: Arc<RecordStore>, catalog: Arc<dyn AdditiveCatalog>) -> Self {
        Self { store, catalog }
    }

    /// The store this reconciler writes to
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Merge one fresh catalog snapshot into the store
    ///
    /// The network call happens before the store is locked. Merge, persist
    /// and reload happen under the lock.
    ///
    /// # Returns
    ///
    /// - `Ok(report)`: `report.updated` is zero when the fetch failed
    /// - `Err(Error::Persistence)`: the merged collection could not be saved
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let snapshot = match self.catalog.fetch_additives().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Reconciliation skipped, {} catalog unavailable: {}",
                    self.catalog.catalog_name(),
                    e
                );
                return Ok(ReconcileReport::fetch_failed(&e));
            }
        };

        let index = CatalogIndex::build(snapshot);
        debug!(
            "Catalog snapshot: {} usable code(s), {} skipped",
            index.len(),
            index.skipped
        );

        let report = self
            .store
            .mutate_and_reload(|records| Ok(merge_catalog(records, &index)))
            .await?;

        info!(
            "Reconciled against {}: {} updated ({} matched, {} removed, {} added)",
            self.catalog.catalog_name(),
            report.updated,
            report.matched,
            report.flagged_removed,
            report.added
        );
        Ok(report)
    }

    /// Look up every record's code as a barcode and attach the product
    ///
    /// Lookups run one at a time with the store unlocked; failures are
    /// logged and recorded in the report, never raised. Documents found are
    /// written in a single persist at the end. A failed or empty lookup
    /// leaves the record's existing `externalProduct` as it was.
    pub async fn refresh_product_details(&self) -> Result<ProductRefreshReport> {
        let codes: Vec<String> = self
            .store
            .snapshot()
            .await
            .into_iter()
            .map(|record| record.code)
            .collect();

        let mut report = ProductRefreshReport::default();
        let mut documents: HashMap<String, serde_json::Value> = HashMap::new();

        for code in codes {
            let outcome = match self.catalog.fetch_product(&code).await {
                Ok(Some(document)) => {
                    documents.insert(code.clone(), document);
                    Ok(ProductOutcome::Attached)
                }
                Ok(None) => Ok(ProductOutcome::NotFound),
                Err(e) => {
                    warn!("Product lookup failed for {}: {}", code, e);
                    Err(e)
                }
            };
            report.lookups.push(ProductLookup { code, outcome });
        }

        if !documents.is_empty() {
            self.store
                .mutate(|records| {
                    for record in records.iter_mut() {
                        if let Some(document) = documents.get(&record.code) {
                            record.external_product = Some(document.clone());
                        }
                    }
                    Ok(())
                })
                .await?;
        }

        info!(
            "Product refresh: {} attached, {} not found, {} failed",
            report.attached(),
            report.not_found(),
            report.failed()
        );
        Ok(report)
    }
}
