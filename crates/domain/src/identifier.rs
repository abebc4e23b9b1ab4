use serde::{Deserialize, Serialize};

/// One key/value component of an object or data-subject identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Identifier key, e.g. a primary-key column name.
    pub key: String,
    /// Identifier value.
    pub value: String,
}

impl KeyValuePair {
    /// Creates a pair from key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Formats identifier pairs into one stable, human-readable string.
///
/// Pairs are sorted ascending by key with case-insensitive comparison,
/// ties broken by exact key, and joined as space-separated `key:value`
/// tokens, e.g. `"id:123 name:John"`.
/// The output is independent of input iteration order; an empty input
/// yields an empty string.
#[must_use]
pub fn format_identifier_pairs(pairs: &[KeyValuePair]) -> String {
    let mut sorted: Vec<&KeyValuePair> = pairs.iter().collect();
    sorted.sort_by(|left, right| {
        left.key
            .to_lowercase()
            .cmp(&right.key.to_lowercase())
            .then_with(|| left.key.cmp(&right.key))
    });
    sorted
        .iter()
        .map(|pair| format!("{}:{}", pair.key, pair.value))
        .collect::<Vec<String>>()
        .join(" ")
}
