//! Record types and identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved system fields every record type carries.
pub const RESERVED_FIELDS: [&str; 3] = ["_id", "_created_at", "_updated_at"];

/// Record identifier qualified by record type, e.g. `user/4f1c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates an id from a record type and a bare key.
    #[must_use]
    pub fn new(record_type: &str, key: &str) -> Self {
        Self(format!("{record_type}/{key}"))
    }

    /// Qualifies a raw value with the record type unless it already is.
    #[must_use]
    pub fn qualify(record_type: &str, raw: &str) -> Self {
        let prefix = format!("{record_type}/");
        if raw.starts_with(&prefix) {
            Self(raw.to_string())
        } else {
            Self(format!("{prefix}{raw}"))
        }
    }

    /// Synthesizes a fresh id for a new record.
    #[must_use]
    pub fn generate(record_type: &str) -> Self {
        Self::new(record_type, &uuid::Uuid::new_v4().to_string())
    }

    /// Parses a qualified id.
    ///
    /// # Errors
    ///
    /// Returns an error if the value has no `type/` prefix.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((record_type, key)) if !record_type.is_empty() && !key.is_empty() => {
                Ok(Self(s.to_string()))
            },
            _ => Err(Error::InvalidInput(format!("malformed record id \"{s}\""))),
        }
    }

    /// Returns the record type portion.
    #[must_use]
    pub fn record_type(&self) -> &str {
        self.0.split_once('/').map_or("", |(t, _)| t)
    }

    /// Returns the bare key portion.
    #[must_use]
    pub fn key(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(_, k)| k)
    }

    /// Returns the qualified id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A backend record: its id plus field data in wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Qualified record id.
    pub id: RecordId,
    /// Field values keyed by field name, `$type`-tagged where applicable.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with no fields.
    #[must_use]
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Sets a field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> &str {
        self.id.record_type()
    }

    /// Returns a field value.
    ///
    /// `_id` resolves to the bare key so that it can be rendered and matched
    /// like any other field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == "_id" {
            return Some(Value::String(self.id.key().to_string()));
        }
        self.fields.get(name).cloned()
    }

    /// Parses a record from the backend wire format.
    ///
    /// Returns the record and any `_transient` included records.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object with a valid `_id`.
    pub fn from_wire(value: &Value) -> Result<FetchedRecord> {
        let Value::Object(object) = value else {
            return Err(Error::operation("decode_record", "record is not an object"));
        };
        let id = object
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::operation("decode_record", "record has no _id"))
            .and_then(RecordId::parse)?;

        let mut fields = Map::new();
        let mut included = BTreeMap::new();
        for (key, field_value) in object {
            match key.as_str() {
                "_id" | "_type" | "_access" | "_ownerID" => {},
                "_transient" => {
                    if let Value::Object(transient) = field_value {
                        for (name, related) in transient {
                            if related.is_object() {
                                included.insert(name.clone(), Self::from_wire(related)?.record);
                            }
                        }
                    }
                },
                _ => {
                    fields.insert(key.clone(), field_value.clone());
                },
            }
        }

        Ok(FetchedRecord {
            record: Self { id, fields },
            included,
        })
    }

    /// Encodes the record in the backend wire format.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut object = Map::new();
        object.insert("_id".to_string(), Value::String(self.id.to_string()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// A record returned by a query, with eagerly included direct references.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRecord {
    /// The matched record.
    pub record: Record,
    /// Records included through the query's include list, keyed by field name.
    pub included: BTreeMap<String, Record>,
}

impl FetchedRecord {
    /// Wraps a record with no included records.
    #[must_use]
    pub const fn bare(record: Record) -> Self {
        Self {
            record,
            included: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_parts() {
        let id = RecordId::new("user", "abc");
        assert_eq!(id.as_str(), "user/abc");
        assert_eq!(id.record_type(), "user");
        assert_eq!(id.key(), "abc");
    }

    #[test]
    fn test_qualify_does_not_double_prefix() {
        assert_eq!(RecordId::qualify("user", "abc").as_str(), "user/abc");
        assert_eq!(RecordId::qualify("user", "user/abc").as_str(), "user/abc");
    }

    #[test]
    fn test_parse_rejects_unqualified() {
        assert!(RecordId::parse("abc").is_err());
        assert!(RecordId::parse("user/").is_err());
        assert!(RecordId::parse("user/abc").is_ok());
    }

    #[test]
    fn test_generate_is_unique() {
        let a = RecordId::generate("order");
        let b = RecordId::generate("order");
        assert_ne!(a, b);
        assert_eq!(a.record_type(), "order");
    }

    #[test]
    fn test_from_wire_splits_transient() {
        let wire = json!({
            "_id": "order/1",
            "_type": "record",
            "amount": 12.5,
            "customer": {"$type": "ref", "$id": "customer/7"},
            "_transient": {
                "customer": {"_id": "customer/7", "name": "Ada"}
            }
        });

        let fetched = Record::from_wire(&wire).unwrap();
        assert_eq!(fetched.record.id.as_str(), "order/1");
        assert_eq!(fetched.record.get("amount"), Some(json!(12.5)));
        assert!(!fetched.record.fields.contains_key("_type"));
        assert!(!fetched.record.fields.contains_key("_transient"));
        let customer = fetched.included.get("customer").unwrap();
        assert_eq!(customer.get("name"), Some(json!("Ada")));
    }

    #[test]
    fn test_get_id_returns_key() {
        let record = Record::new(RecordId::new("user", "42"));
        assert_eq!(record.get("_id"), Some(json!("42")));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_to_wire_includes_id() {
        let record = Record::new(RecordId::new("user", "1")).with_field("name", json!("Ada"));
        assert_eq!(record.to_wire(), json!({"_id": "user/1", "name": "Ada"}));
    }
}
