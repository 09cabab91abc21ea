//! Record store
//!
//! The [`RecordStore`] owns the authoritative in-memory collection and its
//! durable mirror in a [`DocumentStorage`].
//!
//! ## Mutation Flow
//!
//! Every change (manual create/update/delete, reconciliation merge, product
//! refresh) goes through [`RecordStore::mutate`]:
//!
//! 1. Lock the collection
//! 2. Apply the change to a working copy
//! 3. Persist the working copy (save-time sanitization happens here)
//! 4. On success, commit the copy in memory; on failure, keep the old one
//!
//! Holding the lock across persist means a scheduled reconciliation and a
//! manual edit can never interleave and drop each other's effect.

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::record::{Record, sanitize_code, sanitize_name};
use crate::storage::{decode_document, encode_collection};
use crate::traits::DocumentStorage;

/// Authoritative record collection plus its storage
pub struct RecordStore {
    storage: Box<dyn DocumentStorage>,
    records: Mutex<Vec<Record>>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("storage", &self.storage.describe())
            .finish()
    }
}

impl RecordStore {
    /// Open a store, loading whatever the storage holds
    ///
    /// A missing document yields an empty collection. Unreadable records are
    /// skipped after the damaged document has been handed to
    /// [`DocumentStorage::preserve_damaged`].
    pub async fn open(storage: Box<dyn DocumentStorage>) -> Result<Self> {
        let records = load(storage.as_ref()).await?;
        info!(
            "Loaded {} record(s) from {}",
            records.len(),
            storage.describe()
        );

        Ok(Self {
            storage,
            records: Mutex::new(records),
        })
    }

    /// All records, optionally filtered by a case-insensitive substring of
    /// code or name
    pub async fn list(&self, query: Option<&str>) -> Vec<Record> {
        let guard = self.records.lock().await;
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => {
                let needle = q.to_lowercase();
                guard
                    .iter()
                    .filter(|r| r.matches_query(&needle))
                    .cloned()
                    .collect()
            }
            None => guard.clone(),
        }
    }

    /// Copy of the full collection, in order
    pub async fn snapshot(&self) -> Vec<Record> {
        self.records.lock().await.clone()
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the collection is empty
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Exact match on sanitized code
    pub async fn find(&self, code: &str) -> Option<Record> {
        let code = sanitize_code(code);
        let guard = self.records.lock().await;
        guard.iter().find(|r| sanitize_code(&r.code) == code).cloned()
    }

    /// Append a new record
    ///
    /// # Errors
    ///
    /// - `Error::Validation`: code or name is empty after sanitization
    /// - `Error::DuplicateCode`: a record with the same sanitized code exists
    /// - `Error::Persistence`: the collection could not be written
    pub async fn create(&self, code: &str, name: &str) -> Result<Record> {
        let record = Record::new(code, name);
        require_field("code", &record.code)?;
        require_field("name", &record.name)?;

        let created = self
            .mutate(|records| {
                if records.iter().any(|r| sanitize_code(&r.code) == record.code) {
                    return Err(Error::duplicate_code(&record.code));
                }
                records.push(record.clone());
                Ok(record)
            })
            .await?;

        info!("Created {}", created.code);
        Ok(created)
    }

    /// Replace the name of an existing record
    ///
    /// # Errors
    ///
    /// - `Error::Validation`: name is empty after sanitization
    /// - `Error::NotFound`: no record has this code
    /// - `Error::Persistence`: the collection could not be written
    pub async fn update(&self, code: &str, name: &str) -> Result<Record> {
        let code = sanitize_code(code);
        let name = sanitize_name(name);
        require_field("name", &name)?;

        let updated = self
            .mutate(|records| {
                let record = records
                    .iter_mut()
                    .find(|r| sanitize_code(&r.code) == code)
                    .ok_or_else(|| Error::not_found(&code))?;
                record.name = name;
                Ok(record.clone())
            })
            .await?;

        info!("Updated {}", updated.code);
        Ok(updated)
    }

    /// Remove a record, returning it
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: no record has this code
    /// - `Error::Persistence`: the collection could not be written
    pub async fn delete(&self, code: &str) -> Result<Record> {
        let code = sanitize_code(code);

        let removed = self
            .mutate(|records| {
                let index = records
                    .iter()
                    .position(|r| sanitize_code(&r.code) == code)
                    .ok_or_else(|| Error::not_found(&code))?;
                Ok(records.remove(index))
            })
            .await?;

        info!("Deleted {}", removed.code);
        Ok(removed)
    }

    /// Apply a change to the collection and persist it
    ///
    /// `change` works on a copy of the collection. If it returns an error,
    /// or the result cannot be persisted, the in-memory collection is left
    /// untouched and the error is returned.
    pub async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Record>) -> Result<T>,
    {
        let mut guard = self.records.lock().await;
        let mut working = guard.clone();
        let value = change(&mut working)?;
        self.persist(&working).await?;
        *guard = working;
        Ok(value)
    }

    /// Like [`mutate`](Self::mutate), but afterwards replaces the in-memory
    /// collection with exactly what storage now holds
    pub async fn mutate_and_reload<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Record>) -> Result<T>,
    {
        let mut guard = self.records.lock().await;
        let mut working = guard.clone();
        let value = change(&mut working)?;
        self.persist(&working).await?;
        *guard = load(self.storage.as_ref()).await?;
        Ok(value)
    }

    /// Persist the current collection as-is
    pub async fn sync(&self) -> Result<()> {
        let guard = self.records.lock().await;
        self.persist(&guard).await
    }

    /// Replace the in-memory collection with the persisted one
    ///
    /// Returns the number of records loaded.
    pub async fn reload(&self) -> Result<usize> {
        let mut guard = self.records.lock().await;
        *guard = load(self.storage.as_ref()).await?;
        debug!("Reloaded {} record(s)", guard.len());
        Ok(guard.len())
    }

    async fn persist(&self, records: &[Record]) -> Result<()> {
        let bytes = encode_collection(records)?;
        if let Err(e) = self.storage.write(&bytes).await {
            error!(
                "Failed to persist {} record(s) to {}: {}",
                records.len(),
                self.storage.describe(),
                e
            );
            return Err(e);
        }
        debug!(
            "Persisted {} record(s) to {}",
            records.len(),
            self.storage.describe()
        );
        Ok(())
    }
}

async fn load(storage: &dyn DocumentStorage) -> Result<Vec<Record>> {
    let Some(bytes) = storage.read().await? else {
        return Ok(Vec::new());
    };

    let decoded = decode_document(&bytes);
    if decoded.damaged {
        // The next persist rewrites the document from what was readable
        storage.preserve_damaged(&bytes).await?;
        warn!(
            "Loaded {} record(s) from a damaged document in {} ({} unreadable)",
            decoded.records.len(),
            storage.describe(),
            decoded.skipped
        );
    }
    Ok(decoded.records)
}

fn require_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("Missing {}", field)));
    }
    Ok(())
}
