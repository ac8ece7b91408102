//! Request-scoped lookup from raw CSV values to backend record ids.

use crate::codec::{self, DatetimePolicy, FieldFormat};
use crate::models::{FieldKind, FieldValue, RecordId};
use serde_json::Value;
use std::collections::HashMap;

/// Result of looking a raw value up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Exactly one record has the value.
    Found(RecordId),
    /// No record has the value.
    Missing,
    /// Several records have the value, in fetch order.
    Duplicated(Vec<RecordId>),
}

#[derive(Debug, Default)]
struct FieldEntry {
    kind: Option<FieldKind>,
    ids: HashMap<String, Vec<RecordId>>,
}

/// Maps `(record_type, field)` and a raw value to the matching record ids.
///
/// Values are compared in canonical form: a raw cell and a backend value
/// match when they render to the same cell text for the field's kind, so
/// `"42"`, `42` and `42.0` are one key. Lookups on `_id` are computed as
/// `record_type/value` without a backend round trip.
#[derive(Debug, Default)]
pub struct RecordIdentifierMap {
    fields: HashMap<(String, String), FieldEntry>,
}

impl RecordIdentifierMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical key for a raw cell value.
    #[must_use]
    pub fn canonical(kind: FieldKind, raw: &str) -> String {
        match codec::deserialize(kind, raw, DatetimePolicy::Error) {
            Ok(FieldValue::Null) | Err(_) => raw.to_string(),
            Ok(value) => codec::serialize(&value, &FieldFormat::Default),
        }
    }

    /// Returns the wire value used to query the backend for a raw cell.
    ///
    /// Returns `None` when the cell cannot match any record of that kind.
    #[must_use]
    pub fn query_value(kind: FieldKind, raw: &str) -> Option<Value> {
        match codec::deserialize(kind, raw, DatetimePolicy::Error) {
            Ok(FieldValue::Null) | Err(_) => None,
            Ok(value) => Some(value.to_wire()),
        }
    }

    /// Declares a populated `(record_type, field)` pair.
    pub fn register(&mut self, record_type: &str, field: &str, kind: FieldKind) {
        self.fields
            .entry((record_type.to_string(), field.to_string()))
            .or_default()
            .kind = Some(kind);
    }

    /// Records that `id` has the backend `value` in `field`.
    pub fn insert(&mut self, record_type: &str, field: &str, value: &Value, id: RecordId) {
        let entry = self
            .fields
            .entry((record_type.to_string(), field.to_string()))
            .or_default();
        let kind = entry.kind.unwrap_or(FieldKind::String);
        let key = codec::serialize(&FieldValue::from_wire(kind, value), &FieldFormat::Default);
        let ids = entry.ids.entry(key).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// Looks a raw cell value up.
    #[must_use]
    pub fn lookup(&self, record_type: &str, field: &str, raw: &str) -> Lookup {
        if field == "_id" {
            return Lookup::Found(RecordId::qualify(record_type, raw));
        }
        let Some(entry) = self.fields.get(&(record_type.to_string(), field.to_string())) else {
            return Lookup::Missing;
        };
        let key = Self::canonical(entry.kind.unwrap_or(FieldKind::String), raw);
        match entry.ids.get(&key).map(Vec::as_slice) {
            None | Some([]) => Lookup::Missing,
            Some([id]) => Lookup::Found(id.clone()),
            Some(ids) => Lookup::Duplicated(ids.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_id_is_algebraic() {
        let map = RecordIdentifierMap::new();
        assert_eq!(
            map.lookup("user", "_id", "42"),
            Lookup::Found(RecordId::new("user", "42"))
        );
        assert_eq!(
            map.lookup("user", "_id", "user/42"),
            Lookup::Found(RecordId::new("user", "42"))
        );
    }

    #[test]
    fn test_unpopulated_field_is_missing() {
        let map = RecordIdentifierMap::new();
        assert_eq!(map.lookup("user", "email", "a@example.com"), Lookup::Missing);
    }

    #[test]
    fn test_duplicates_kept_in_fetch_order() {
        let mut map = RecordIdentifierMap::new();
        map.register("user", "email", FieldKind::String);
        map.insert("user", "email", &json!("a@example.com"), RecordId::new("user", "2"));
        map.insert("user", "email", &json!("a@example.com"), RecordId::new("user", "1"));
        map.insert("user", "email", &json!("a@example.com"), RecordId::new("user", "2"));

        assert_eq!(
            map.lookup("user", "email", "a@example.com"),
            Lookup::Duplicated(vec![RecordId::new("user", "2"), RecordId::new("user", "1")])
        );
    }

    #[test]
    fn test_numeric_values_match_canonically() {
        let mut map = RecordIdentifierMap::new();
        map.register("product", "sku", FieldKind::Integer);
        map.insert("product", "sku", &json!(42), RecordId::new("product", "p"));
        assert_eq!(
            map.lookup("product", "sku", "42"),
            Lookup::Found(RecordId::new("product", "p"))
        );
        assert_eq!(map.lookup("product", "sku", "43"), Lookup::Missing);
    }

    #[test]
    fn test_query_value_skips_undecodable() {
        assert_eq!(
            RecordIdentifierMap::query_value(FieldKind::Integer, "7"),
            Some(json!(7))
        );
        assert_eq!(RecordIdentifierMap::query_value(FieldKind::Integer, "x"), None);
        assert_eq!(
            RecordIdentifierMap::query_value(FieldKind::String, "x"),
            Some(json!("x"))
        );
    }
}
