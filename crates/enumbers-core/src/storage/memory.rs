// # Memory Storage
//
// In-memory implementation of DocumentStorage.
//
// ## Purpose
//
// Holds the serialized document in memory instead of on disk. Data goes
// through the same codec as the file backend, so behaviour (sanitization,
// ordering, fail-soft decoding) is identical; only durability differs.
//
// ## When to Use
//
// - Testing environments
// - Demo deployments where losing edits on restart is acceptable

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::DocumentStorage;

/// In-memory document storage
///
/// Clones share the same document, so a test can hand one clone to a
/// [`RecordStore`](crate::store::RecordStore) and inspect the bytes through
/// another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Option<Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create empty storage (nothing persisted yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage seeded with a raw document
    pub fn with_document(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(bytes.into()))),
        }
    }

    /// Current document, if any
    pub async fn document(&self) -> Option<Vec<u8>> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        *self.inner.write().await = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
