//! Backend field catalogue.

use crate::models::FieldKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A field as described by the backend schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name.
    pub name: String,
    /// Backend type name, e.g. `string` or `ref(user)`.
    #[serde(rename = "type")]
    pub type_name: String,
}

impl SchemaField {
    /// Creates a schema field.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Returns whether the field references another record type.
    #[must_use]
    pub fn is_ref(&self) -> bool {
        self.type_name.starts_with("ref(") && self.type_name.ends_with(')')
    }

    /// Returns the referenced record type for reference fields.
    #[must_use]
    pub fn ref_target(&self) -> Option<&str> {
        self.type_name
            .strip_prefix("ref(")
            .and_then(|rest| rest.strip_suffix(')'))
    }

    /// Returns the codec kind, or `None` for unsupported backend types.
    #[must_use]
    pub fn kind(&self) -> Option<FieldKind> {
        FieldKind::from_backend_type(&self.type_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RecordTypeSchema {
    #[serde(default)]
    fields: Vec<SchemaField>,
}

/// The backend's live field catalogue, keyed by record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    record_types: BTreeMap<String, RecordTypeSchema>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record type with `(name, type)` field pairs.
    #[must_use]
    pub fn with_record_type<'a>(
        mut self,
        record_type: &str,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let fields = fields
            .into_iter()
            .map(|(name, type_name)| SchemaField::new(name, type_name))
            .collect();
        self.record_types
            .insert(record_type.to_string(), RecordTypeSchema { fields });
        self
    }

    /// Decodes the `schema:fetch` result.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not have the expected shape.
    pub fn from_wire(value: &Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| Error::operation("decode_schema", e))
    }

    /// Returns whether the record type exists.
    #[must_use]
    pub fn has_record_type(&self, record_type: &str) -> bool {
        self.record_types.contains_key(record_type)
    }

    /// Returns the record type names.
    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.record_types.keys().map(String::as_str)
    }

    /// Returns the declared fields of a record type.
    #[must_use]
    pub fn fields(&self, record_type: &str) -> &[SchemaField] {
        self.record_types
            .get(record_type)
            .map_or(&[], |t| t.fields.as_slice())
    }

    /// Looks up a field, including the reserved system fields.
    #[must_use]
    pub fn field_of(&self, record_type: &str, field_name: &str) -> Option<SchemaField> {
        match field_name {
            "_id" => return Some(SchemaField::new("_id", "string")),
            "_created_at" | "_updated_at" => {
                return Some(SchemaField::new(field_name, "datetime"));
            },
            _ => {},
        }
        self.fields(record_type)
            .iter()
            .find(|f| f.name == field_name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_wire() {
        let schema = Schema::from_wire(&json!({
            "record_types": {
                "user": {"fields": [
                    {"name": "email", "type": "string"},
                    {"name": "manager", "type": "ref(user)"}
                ]}
            }
        }))
        .unwrap();

        assert!(schema.has_record_type("user"));
        let manager = schema.field_of("user", "manager").unwrap();
        assert!(manager.is_ref());
        assert_eq!(manager.ref_target(), Some("user"));
        assert_eq!(manager.kind(), Some(FieldKind::Reference));
    }

    #[test]
    fn test_reserved_fields_always_present() {
        let schema = Schema::new().with_record_type("user", []);
        assert_eq!(schema.field_of("user", "_id").unwrap().type_name, "string");
        assert_eq!(
            schema.field_of("user", "_created_at").unwrap().kind(),
            Some(FieldKind::Datetime)
        );
        assert!(schema.field_of("user", "nickname").is_none());
    }

    #[test]
    fn test_malformed_schema_rejected() {
        assert!(Schema::from_wire(&json!({"record_types": []})).is_err());
    }
}
