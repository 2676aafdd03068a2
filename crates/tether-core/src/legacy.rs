//! Decoding of stored connection lists, including legacy layouts.
//!
//! Forward lists have been written in several shapes over time:
//!
//! ```json
//! [{"id": 12, "type": "article"}]          // tagged tuple (canonical)
//! [{"term_id": 30, "taxonomy": "category"}] // legacy term pair
//! [{"id": 12}]                              // tuple without a type
//! [12, "13"]                                // bare ids
//! {"0": 12, "2": 13}                        // list with gaps, stored as an object
//! ```
//!
//! Raw values are decoded once into [`StoredEntry`] and then normalized into
//! canonical [`ConnectionTuple`]s. Entries without a type are classified by
//! [`disambiguate_bare_id`].

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::constants::PRINCIPAL_SUBTYPE;
use crate::directory::EntityDirectory;
use crate::types::{ConnectionTuple, EntityId};

// ============================================================================
// Decoding
// ============================================================================

/// An id stored as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Number(u64),
    Text(String),
}

impl IdValue {
    /// The id, if it is a positive integer.
    pub fn get(&self) -> Option<EntityId> {
        let id = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        (id != 0).then_some(id)
    }
}

/// One element of a stored forward list, as written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StoredEntry {
    /// `{"id": n, "type": "..."}`
    Tagged {
        id: IdValue,
        #[serde(rename = "type")]
        subtype: String,
    },
    /// `{"term_id": n, "taxonomy": "..."}`
    TermPair { term_id: IdValue, taxonomy: String },
    /// `{"id": n}`
    Untyped { id: IdValue },
    /// `n` or `"n"`
    Bare(IdValue),
}

/// Result of decoding a raw stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedEntries {
    pub entries: Vec<StoredEntry>,
    /// Elements matching none of the known shapes.
    pub skipped: usize,
}

/// Elements of a stored list.
///
/// Objects whose keys are all integers are lists that lost their dense
/// indexing; their values are returned in key order. Anything else is not a
/// list.
fn list_elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let mut indexed = Vec::with_capacity(map.len());
            for (key, item) in map {
                match key.parse::<u64>() {
                    Ok(index) => indexed.push((index, item)),
                    Err(_) => return Vec::new(),
                }
            }
            indexed.sort_by_key(|(index, _)| *index);
            indexed.into_iter().map(|(_, item)| item).collect()
        }
        _ => Vec::new(),
    }
}

/// Decode a raw forward list. Non-list values decode to nothing.
pub fn decode_entries(value: &Value) -> DecodedEntries {
    let mut decoded = DecodedEntries::default();
    for element in list_elements(value) {
        match StoredEntry::deserialize(element) {
            Ok(entry) => decoded.entries.push(entry),
            Err(_) => {
                debug!("Skipping undecodable connection entry: {}", element);
                decoded.skipped += 1;
            }
        }
    }
    decoded
}

/// Decode a raw reverse list into unique positive ids, in stored order.
pub fn decode_id_list(value: &Value) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = Vec::new();
    for element in list_elements(value) {
        let Some(id) = IdValue::deserialize(element).ok().and_then(|v| v.get()) else {
            continue;
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

// ============================================================================
// Normalization
// ============================================================================

/// Classify an id stored without a type.
///
/// Principals are probed first: there are far fewer of them, so a match is
/// less likely to be a coincidence. Otherwise the id is looked up as a
/// content item and takes that item's type. Ids matching neither yield
/// `None`.
///
/// When a principal and an item share an id this picks the principal, which
/// may be wrong.
pub fn disambiguate_bare_id(id: EntityId, directory: &dyn EntityDirectory) -> Option<ConnectionTuple> {
    if directory.principal(id).is_some() {
        return Some(ConnectionTuple::new(id, PRINCIPAL_SUBTYPE));
    }
    directory
        .item(id)
        .map(|item| ConnectionTuple::new(id, item.item_type))
}

/// Canonical tuples plus what it took to get them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub tuples: Vec<ConnectionTuple>,
    /// Untyped entries classified by probing the directory.
    pub bare_resolved: usize,
    /// Legacy term pairs converted to tuples.
    pub term_pairs: usize,
    /// Entries that could not be turned into a tuple.
    pub dropped: usize,
}

/// Turn decoded entries into a duplicate-free tuple list, keeping order.
pub fn normalize_entries(decoded: DecodedEntries, directory: &dyn EntityDirectory) -> Normalized {
    let mut out = Normalized {
        dropped: decoded.skipped,
        ..Normalized::default()
    };

    for entry in decoded.entries {
        let tuple = match entry {
            StoredEntry::Tagged { id, subtype } if !subtype.is_empty() => {
                id.get().map(|id| ConnectionTuple::new(id, subtype))
            }
            StoredEntry::TermPair { term_id, taxonomy } => {
                let tuple = term_id.get().map(|id| ConnectionTuple::new(id, taxonomy));
                if tuple.is_some() {
                    out.term_pairs += 1;
                }
                tuple
            }
            // an empty type carries no more information than a bare id
            StoredEntry::Tagged { id, .. } | StoredEntry::Untyped { id } | StoredEntry::Bare(id) => {
                let tuple = id.get().and_then(|id| disambiguate_bare_id(id, directory));
                if tuple.is_some() {
                    out.bare_resolved += 1;
                }
                tuple
            }
        };

        match tuple {
            Some(tuple) if !out.tuples.contains(&tuple) => out.tuples.push(tuple),
            Some(_) => {}
            None => out.dropped += 1,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_directory;
    use serde_json::json;

    #[test]
    fn test_decode_shapes() {
        let decoded = decode_entries(&json!([
            {"id": 12, "type": "article"},
            {"term_id": "30", "taxonomy": "category"},
            {"id": 7},
            5,
            "6",
            {"unrelated": true},
            -1
        ]));

        assert_eq!(decoded.skipped, 2);
        assert_eq!(
            decoded.entries,
            vec![
                StoredEntry::Tagged {
                    id: IdValue::Number(12),
                    subtype: "article".to_string()
                },
                StoredEntry::TermPair {
                    term_id: IdValue::Text("30".to_string()),
                    taxonomy: "category".to_string()
                },
                StoredEntry::Untyped {
                    id: IdValue::Number(7)
                },
                StoredEntry::Bare(IdValue::Number(5)),
                StoredEntry::Bare(IdValue::Text("6".to_string())),
            ]
        );
    }

    #[test]
    fn test_non_list_decodes_empty() {
        assert_eq!(decode_entries(&json!("nope")), DecodedEntries::default());
        assert_eq!(decode_entries(&json!({"a": 1})), DecodedEntries::default());
        assert_eq!(decode_entries(&Value::Null), DecodedEntries::default());
    }

    #[test]
    fn test_gapped_list_read_in_key_order() {
        let ids = decode_id_list(&json!({"10": 3, "2": 2, "0": 1}));
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_id_list_skips_zero_and_duplicates() {
        let ids = decode_id_list(&json!([4, "4", 0, "x", 9]));
        assert_eq!(ids, vec![4, 9]);
    }

    #[test]
    fn test_bare_id_principal_first() {
        let directory = fixture_directory();
        // 5 is a principal, 101 a content item, 999 nothing.
        assert_eq!(
            disambiguate_bare_id(5, &directory),
            Some(ConnectionTuple::new(5, "principal"))
        );
        assert_eq!(
            disambiguate_bare_id(101, &directory),
            Some(ConnectionTuple::new(101, "content"))
        );
        assert_eq!(disambiguate_bare_id(999, &directory), None);
    }

    #[test]
    fn test_normalize_counts_and_dedupes() {
        let directory = fixture_directory();
        let decoded = decode_entries(&json!([
            5,
            {"id": 5, "type": "principal"},
            {"term_id": 30, "taxonomy": "category"},
            999,
            {"id": 0, "type": "article"},
            201
        ]));

        let normalized = normalize_entries(decoded, &directory);
        assert_eq!(
            normalized.tuples,
            vec![
                ConnectionTuple::new(5, "principal"),
                ConnectionTuple::new(30, "category"),
                ConnectionTuple::new(201, "article"),
            ]
        );
        assert_eq!(normalized.bare_resolved, 2);
        assert_eq!(normalized.term_pairs, 1);
        assert_eq!(normalized.dropped, 2);
    }

    #[test]
    fn test_empty_type_is_disambiguated() {
        let directory = fixture_directory();
        let decoded = decode_entries(&json!([
            {"id": 5, "type": ""},
            {"id": "102", "type": ""},
            {"id": 999, "type": ""}
        ]));
        assert_eq!(decoded.skipped, 0);

        let normalized = normalize_entries(decoded, &directory);
        assert_eq!(
            normalized.tuples,
            vec![
                ConnectionTuple::new(5, "principal"),
                ConnectionTuple::new(102, "content"),
            ]
        );
        assert_eq!(normalized.bare_resolved, 2);
        assert_eq!(normalized.dropped, 1);
    }
}
