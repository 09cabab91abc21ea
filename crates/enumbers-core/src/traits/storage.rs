// # Document Storage Trait
//
// Defines the interface for persisting the record collection.
//
// ## Purpose
//
// The whole collection lives in one JSON document. Storage implementations
// only move bytes; encoding, decoding and save-time sanitization belong to
// the codec in `crate::storage` so every backend persists the same shape.
//
// ## Implementations
//
// - File-based: `FileStorage` (atomic write-then-rename)
// - In-memory: `MemoryStorage` (tests, ephemeral deployments)

use async_trait::async_trait;

/// Trait for document storage implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. The
/// [`RecordStore`](crate::store::RecordStore) serializes its own writes, so
/// implementations do not need to order concurrent `write` calls.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Read the persisted document
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))`: The stored document
    /// - `Ok(None)`: Nothing has been persisted yet
    /// - `Err(Error)`: Storage error
    async fn read(&self) -> Result<Option<Vec<u8>>, crate::Error>;

    /// Replace the persisted document
    ///
    /// Implementations should make the replacement atomic where the medium
    /// allows it: a reader sees either the old or the new document.
    async fn write(&self, bytes: &[u8]) -> Result<(), crate::Error>;

    /// Keep a copy of a document that could not be fully decoded
    ///
    /// Called before the store starts from a partial collection, so the next
    /// `write` cannot destroy the only copy of the unreadable records. The
    /// default keeps nothing.
    async fn preserve_damaged(&self, _bytes: &[u8]) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Human-readable location for log messages (e.g. a file path)
    fn describe(&self) -> String;
}
