// # enumbers-core
//
// Core library for the E-number service.
//
// ## Architecture Overview
//
// This library provides the functionality behind the HTTP daemon:
// - **Record**: One E-number entry plus the code/name canonicalization rules
// - **RecordStore**: The authoritative in-memory collection, persisted after
//   every mutation
// - **DocumentStorage**: Trait for byte-level persistence (file, memory)
// - **AdditiveCatalog**: Trait for the third-party additive catalog
// - **Reconciler**: Merges a catalog snapshot into the store
// - **ReconcileScheduler**: Runs the reconciler on a fixed interval
//
// ## Design Principles
//
// 1. **Single writer**: Every change goes through `RecordStore::mutate`,
//    which holds the lock across persist
// 2. **Persist on mutation**: The in-memory copy only changes after storage
//    accepted the new document
// 3. **Flag, never delete**: Reconciliation marks vanished codes `removed`
// 4. **Library-first**: The daemon is a thin wrapper over this crate

pub mod config;
pub mod error;
pub mod reconciler;
pub mod record;
pub mod storage;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{CatalogConfig, SchedulerConfig, ServiceConfig, StorageConfig};
pub use error::{Error, Result};
pub use reconciler::{
    ProductOutcome, ProductRefreshReport, ReconcileReport, ReconcileScheduler, Reconciler,
    SchedulerEvent, SchedulerHandle,
};
pub use record::{ExternalAdditive, Record};
pub use storage::{FileStorage, MemoryStorage};
pub use store::RecordStore;
pub use traits::{AdditiveCatalog, CatalogEntry, DocumentStorage};
