// # Storage Implementations
//
// This module provides implementations of the DocumentStorage trait and the
// codec that turns the record collection into the persisted JSON document.
//
// ## File Format
//
// ```json
// [
//   {
//     "code": "E330",
//     "name": "Citric acid",
//     "externalAdditive": {
//       "name": "E330 - Citric acid",
//       "url": "https://world.openfoodfacts.org/facets/additives/e330-citric-acid",
//       "sameAs": ["https://www.wikidata.org/wiki/Q159683"]
//     }
//   }
// ]
// ```

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::traits::DocumentStorage;

/// Build a storage backend from configuration
pub async fn from_config(config: &StorageConfig) -> Result<Box<dyn DocumentStorage>> {
    match config {
        StorageConfig::File { path } => Ok(Box::new(FileStorage::new(path).await?)),
        StorageConfig::Memory => Ok(Box::new(MemoryStorage::new())),
    }
}

/// A decoded document
#[derive(Debug, Default)]
pub struct DecodedDocument {
    /// Records that could be read, in document order
    pub records: Vec<Record>,

    /// Entries that could not be read as records
    pub skipped: usize,

    /// Whether anything in the document was lost while decoding
    pub damaged: bool,
}

/// Decode a persisted document, record by record
///
/// Fail-soft: a document that is not a JSON array yields an empty
/// collection, and an array entry that is not a valid record is skipped.
/// Both cases log a warning and set `damaged`, so the caller can keep the
/// original bytes before it writes anything.
pub fn decode_document(bytes: &[u8]) -> DecodedDocument {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return DecodedDocument::default();
    }

    let entries = match serde_json::from_slice::<Vec<serde_json::Value>>(bytes) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                "Stored document is not a JSON array ({}). Starting with an empty collection.",
                e
            );
            return DecodedDocument {
                damaged: true,
                ..DecodedDocument::default()
            };
        }
    };

    let mut decoded = DecodedDocument::default();
    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Record>(entry) {
            Ok(record) => decoded.records.push(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable record at position {}: {}", position, e);
                decoded.skipped += 1;
                decoded.damaged = true;
            }
        }
    }
    decoded
}

/// Decode a persisted document into a collection
///
/// Shorthand for [`decode_document`] when only the records matter.
pub fn decode_collection(bytes: &[u8]) -> Vec<Record> {
    decode_document(bytes).records
}

/// Encode a collection for persistence
///
/// Every record's `code` and `name` are re-derived here, immediately before
/// writing, regardless of what the in-memory copy holds.
pub fn encode_collection(records: &[Record]) -> Result<Vec<u8>> {
    let sanitized: Vec<Record> = records.iter().map(Record::sanitized).collect();
    serde_json::to_vec_pretty(&sanitized)
        .map_err(|e| Error::persistence(format!("Failed to serialize records: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_wrong_container_shape() {
        assert!(decode_collection(br#"{"code": "E330"}"#).is_empty());
        assert!(decode_collection(b"not json").is_empty());
        assert!(decode_collection(b"").is_empty());
    }

    #[test]
    fn decode_skips_only_unreadable_records() {
        let decoded = decode_document(
            br#"[{"code":"E330","name":"Citric acid"},{"code":"E300","name":"Ascorbic acid","removed":"true"},7,{"code":"E100","name":"Curcumin"}]"#,
        );

        let codes: Vec<&str> = decoded.records.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["E330", "E100"]);
        assert_eq!(decoded.skipped, 2);
        assert!(decoded.damaged);
    }

    #[test]
    fn decode_marks_clean_and_blank_documents_undamaged() {
        assert!(!decode_document(br#"[{"code":"E330","name":"Citric acid"}]"#).damaged);
        assert!(!decode_document(b"").damaged);
        assert!(!decode_document(b"  \n").damaged);
        assert!(decode_document(b"not json").damaged);
        assert!(decode_document(br#"{"code": "E330"}"#).damaged);
    }

    #[test]
    fn decode_keeps_order_and_optional_fields() {
        let records = decode_collection(
            br#"[{"code":"E322","name":"Lecithins","removed":true},{"code":"E100","name":"Curcumin"}]"#,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, "E322");
        assert!(records[0].is_removed());
        assert_eq!(records[1].code, "E100");
        assert_eq!(records[1].removed, None);
    }

    #[test]
    fn encode_sanitizes_every_record() {
        let raw = vec![Record {
            code: "e-330 ".to_string(),
            name: " <b>Citric acid</b> ".to_string(),
            removed: None,
            external_additive: None,
            external_product: None,
        }];

        let bytes = encode_collection(&raw).unwrap();
        let decoded = decode_collection(&bytes);
        assert_eq!(decoded[0].code, "E330");
        assert_eq!(decoded[0].name, "Citric acid");
    }

    #[test]
    fn encode_is_pretty_and_keeps_unicode() {
        let bytes = encode_collection(&[Record::new("E160a", "Carotènes")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\n  {"));
        assert!(text.contains("Carotènes"));
    }
}
