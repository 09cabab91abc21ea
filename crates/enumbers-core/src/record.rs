//! Record model and code/name canonicalization
//!
//! A [`Record`] is one E-number entry as it is held in memory and persisted
//! to the JSON document. Three string transforms live here:
//!
//! - [`sanitize_code`]: the persisted form of a code
//! - [`sanitize_name`]: the persisted form of a display name
//! - [`normalize_code`] / [`match_key`] / [`catalog_code`]: the comparison
//!   keys used when reconciling against the external catalog

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Maximum persisted code length (in characters)
pub const MAX_CODE_LEN: usize = 10;

/// Maximum persisted name length (in characters)
pub const MAX_NAME_LEN: usize = 500;

/// Markup tags, removed from names before they are stored.
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("TAG_REGEX is a valid regex pattern"));

/// Leading `E<digits>` token of a normalized code.
static CODE_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^E\d+").expect("CODE_TOKEN_REGEX is a valid regex pattern"));

/// Leading code token of a catalog display name, e.g. `E330 - Citric acid`.
static CATALOG_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^E[\s-]*\d+").expect("CATALOG_TOKEN_REGEX is a valid regex pattern")
});

/// One E-number entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Canonical code, e.g. `E330`
    #[serde(default)]
    pub code: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Set to `true` when the code disappeared from the latest catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,

    /// Matching entry from the external additive catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_additive: Option<ExternalAdditive>,

    /// Opaque product document from a per-barcode lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_product: Option<serde_json::Value>,
}

impl Record {
    /// Create a record from raw input, sanitizing both fields
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: sanitize_code(code),
            name: sanitize_name(name),
            removed: None,
            external_additive: None,
            external_product: None,
        }
    }

    /// Copy of this record with `code` and `name` re-derived for storage
    pub fn sanitized(&self) -> Self {
        Self {
            code: sanitize_code(&self.code),
            name: sanitize_name(&self.name),
            ..self.clone()
        }
    }

    /// Whether the record is flagged as gone from the external catalog
    pub fn is_removed(&self) -> bool {
        self.removed == Some(true)
    }

    /// Key used to match this record against catalog entries
    pub fn match_key(&self) -> String {
        match_key(&self.code)
    }

    /// Case-insensitive substring match on code or name
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn matches_query(&self, needle: &str) -> bool {
        self.code.to_lowercase().contains(needle) || self.name.to_lowercase().contains(needle)
    }
}

/// Catalog details attached to a matched record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAdditive {
    /// Catalog display name
    pub name: String,

    /// Catalog page URL
    #[serde(default)]
    pub url: String,

    /// Linked-data identifiers for the same additive
    #[serde(default)]
    pub same_as: Vec<String>,
}

/// Canonicalize a code for storage
///
/// Uppercases, keeps only ASCII letters and digits, and truncates to
/// [`MAX_CODE_LEN`] characters.
///
/// ```
/// use enumbers_core::record::sanitize_code;
///
/// assert_eq!(sanitize_code("e-330 "), "E330");
/// assert_eq!(sanitize_code("E 322i"), "E322I");
/// ```
pub fn sanitize_code(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_CODE_LEN)
        .collect()
}

/// Canonicalize a display name for storage
///
/// Strips markup tags, trims, and truncates to [`MAX_NAME_LEN`] characters.
pub fn sanitize_name(raw: &str) -> String {
    let stripped = TAG_REGEX.replace_all(raw, "");
    let truncated: String = stripped.trim().chars().take(MAX_NAME_LEN).collect();
    // truncation can expose trailing whitespace
    truncated.trim_end().to_string()
}

/// Uppercase and drop spaces and dashes
pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Comparison key for a local code
///
/// The normalized code collapsed to its leading `E<digits>` token, so that
/// `E322i` and `E322` compare equal. Codes without such a token fall back to
/// the normalized literal (possibly empty).
pub fn match_key(code: &str) -> String {
    let normalized = normalize_code(code);
    match CODE_TOKEN_REGEX.find(&normalized) {
        Some(token) => token.as_str().to_string(),
        None => normalized,
    }
}

/// Comparison key for a catalog entry, taken from its display name
///
/// Returns `None` when the name does not start with `E` followed by digits.
pub fn catalog_code(name: &str) -> Option<String> {
    if !name.starts_with('E') {
        return None;
    }
    CATALOG_TOKEN_REGEX
        .find(name)
        .map(|token| normalize_code(token.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_code_strips_and_uppercases() {
        assert_eq!(sanitize_code("e-330 "), "E330");
        assert_eq!(sanitize_code("E 322i"), "E322I");
        assert_eq!(sanitize_code("<e150a>"), "E150A");
        assert_eq!(sanitize_code("E1234567890123"), "E123456789");
        assert_eq!(sanitize_code("  "), "");
    }

    #[test]
    fn sanitize_name_removes_markup() {
        assert_eq!(sanitize_name("  <b>Citric</b> acid "), "Citric acid");
        assert_eq!(sanitize_name("<script>x</script>"), "x");
        assert_eq!(sanitize_name("Ascorbic acid"), "Ascorbic acid");
    }

    #[test]
    fn sanitize_name_truncates_on_char_boundary() {
        let long = "é".repeat(MAX_NAME_LEN + 20);
        let name = sanitize_name(&long);
        assert_eq!(name.chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let long = format!("{} z", "w".repeat(MAX_NAME_LEN - 1));
        let inputs = ["  <i>x</i>  y ", "a<b", "<<b>b>", long.as_str()];
        for input in inputs {
            let once = sanitize_name(input);
            assert_eq!(sanitize_name(&once), once, "input: {input:?}");
        }

        let code = sanitize_code("e-1 0-0 a");
        assert_eq!(sanitize_code(&code), code);
    }

    #[test]
    fn match_key_collapses_suffix() {
        assert_eq!(match_key("E322i"), "E322");
        assert_eq!(match_key("e-330"), "E330");
        assert_eq!(match_key("XYZ"), "XYZ");
        assert_eq!(match_key(""), "");
    }

    #[test]
    fn catalog_code_reads_leading_token() {
        assert_eq!(catalog_code("E330 - Citric acid"), Some("E330".to_string()));
        assert_eq!(catalog_code("E 150a - Plain caramel"), Some("E150".to_string()));
        assert_eq!(catalog_code("E-412 Guar gum"), Some("E412".to_string()));
        assert_eq!(catalog_code("Citric acid"), None);
        assert_eq!(catalog_code("Emulsifier"), None);
        assert_eq!(catalog_code("e330"), None);
    }

    #[test]
    fn record_serializes_camel_case_and_skips_absent_fields() {
        let mut record = Record::new("E330", "Citric acid");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"code": "E330", "name": "Citric acid"}));

        record.removed = Some(true);
        record.external_additive = Some(ExternalAdditive {
            name: "E330 - Citric acid".to_string(),
            url: "https://example.org/e330".to_string(),
            same_as: vec!["https://www.wikidata.org/wiki/Q159683".to_string()],
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["removed"], true);
        assert_eq!(
            json["externalAdditive"]["sameAs"][0],
            "https://www.wikidata.org/wiki/Q159683"
        );
    }
}
