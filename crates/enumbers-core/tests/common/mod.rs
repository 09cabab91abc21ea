//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal catalog and storage doubles that record how
//! they were called, so tests can assert on side effects without network or
//! disk.

#![allow(dead_code)]

use enumbers_core::error::{Error, Result};
use enumbers_core::traits::{AdditiveCatalog, CatalogEntry, DocumentStorage};
use enumbers_core::{MemoryStorage, RecordStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A catalog that serves a fixed snapshot and product table
pub struct ScriptedCatalog {
    entries: std::sync::Mutex<Vec<CatalogEntry>>,
    products: HashMap<String, serde_json::Value>,
    failing_barcodes: HashSet<String>,
    fail_fetch: AtomicBool,
    fetch_delay: Option<Duration>,
    fetch_gate: Option<Arc<Notify>>,
    fetch_call_count: Arc<AtomicUsize>,
    product_call_count: Arc<AtomicUsize>,
}

impl ScriptedCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: std::sync::Mutex::new(entries),
            products: HashMap::new(),
            failing_barcodes: HashSet::new(),
            fail_fetch: AtomicBool::new(false),
            fetch_delay: None,
            fetch_gate: None,
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
            product_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A catalog whose bulk fetch always fails
    pub fn unavailable() -> Self {
        let catalog = Self::new(Vec::new());
        catalog.fail_fetch.store(true, Ordering::SeqCst);
        catalog
    }

    pub fn with_product(mut self, barcode: &str, document: serde_json::Value) -> Self {
        self.products.insert(barcode.to_string(), document);
        self
    }

    /// Make every bulk fetch sleep before answering, so other tasks run
    /// while a reconciliation is in flight
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Make every bulk fetch wait until [`release_fetch`](Self::release_fetch)
    pub fn with_fetch_gate(mut self) -> Self {
        self.fetch_gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Let one waiting (or the next) bulk fetch answer
    pub fn release_fetch(&self) {
        if let Some(gate) = &self.fetch_gate {
            gate.notify_one();
        }
    }

    pub fn with_failing_barcode(mut self, barcode: &str) -> Self {
        self.failing_barcodes.insert(barcode.to_string());
        self
    }

    /// Replace the snapshot served by later fetches
    pub fn set_entries(&self, entries: Vec<CatalogEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail_fetch.store(unavailable, Ordering::SeqCst);
    }

    /// Number of times fetch_additives() was called
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    /// Number of times fetch_product() was called
    pub fn product_call_count(&self) -> usize {
        self.product_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AdditiveCatalog for ScriptedCatalog {
    async fn fetch_additives(&self) -> Result<Vec<CatalogEntry>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.fetch_gate {
            gate.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::fetch("scripted", "HTTP error: 503 Service Unavailable"));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn fetch_product(&self, barcode: &str) -> Result<Option<serde_json::Value>> {
        self.product_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing_barcodes.contains(barcode) {
            return Err(Error::fetch("scripted", "Request timed out"));
        }
        Ok(self.products.get(barcode).cloned())
    }

    fn catalog_name(&self) -> &'static str {
        "scripted"
    }
}

/// A storage whose writes can be switched to fail
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_writes: Arc<AtomicBool>,
    write_call_count: Arc<AtomicUsize>,
}

impl FlakyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            fail_writes: Arc::new(AtomicBool::new(false)),
            write_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Switch that makes later writes fail
    pub fn fail_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_writes)
    }

    /// Shared counter of write() calls
    pub fn write_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.write_call_count)
    }
}

#[async_trait::async_trait]
impl DocumentStorage for FlakyStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        self.inner.read().await
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.write_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence("disk full"));
        }
        self.inner.write(bytes).await
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

/// Catalog entry with an OFF-style name and URL
pub fn entry(code: &str, label: &str) -> CatalogEntry {
    CatalogEntry::new(
        format!("{} - {}", code, label),
        format!(
            "https://world.openfoodfacts.org/facets/additives/{}",
            code.to_lowercase()
        ),
    )
    .with_same_as(vec![format!("https://www.wikidata.org/wiki/{}", code)])
}

/// Open a store over in-memory storage seeded with `document`
pub async fn store_with(document: &str) -> (Arc<RecordStore>, MemoryStorage) {
    let storage = MemoryStorage::with_document(document);
    let store = RecordStore::open(Box::new(storage.clone()))
        .await
        .expect("store opens");
    (Arc::new(store), storage)
}
