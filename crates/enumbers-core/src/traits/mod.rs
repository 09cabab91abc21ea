//! Core traits for the E-number service
//!
//! This module defines the abstract interfaces the store and reconciler
//! depend on.
//!
//! - [`DocumentStorage`]: Byte-level persistence of the record document
//! - [`AdditiveCatalog`]: External additive catalog and product lookups

pub mod catalog;
pub mod storage;

pub use catalog::{AdditiveCatalog, CatalogEntry};
pub use storage::DocumentStorage;
