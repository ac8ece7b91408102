//! Field kinds and typed field values.

use super::RecordId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::fmt;

/// The closed set of field kinds the codec handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Free text.
    String,
    /// Floating point number.
    Number,
    /// Whole number.
    Integer,
    /// True/false.
    Boolean,
    /// Arbitrary JSON blob.
    Json,
    /// Geo point (latitude, longitude).
    Location,
    /// Absolute timestamp.
    Datetime,
    /// Stored asset, referenced by name.
    Asset,
    /// Reference to another record.
    Reference,
}

impl FieldKind {
    /// Maps a backend schema type name to a field kind.
    ///
    /// Reference types are spelled `ref(<record_type>)` by the backend.
    /// Returns `None` for types the codec does not support.
    #[must_use]
    pub fn from_backend_type(type_name: &str) -> Option<Self> {
        if type_name.starts_with("ref(") && type_name.ends_with(')') {
            return Some(Self::Reference);
        }
        match type_name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" | "sequence" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "json" => Some(Self::Json),
            "location" | "geo" => Some(Self::Location),
            "datetime" => Some(Self::Datetime),
            "asset" => Some(Self::Asset),
            _ => None,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Location => "location",
            Self::Datetime => "datetime",
            Self::Asset => "asset",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// An asset referenced by its stored name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRef(pub String);

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No value.
    Null,
    /// Text value.
    String(String),
    /// Floating point value.
    Number(f64),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// JSON value, also used for wire values that do not match the declared kind.
    Json(Value),
    /// Geo point.
    Location(GeoPoint),
    /// Timestamp.
    Datetime(DateTime<Utc>),
    /// Asset reference.
    Asset(AssetRef),
    /// Record reference.
    Reference(RecordId),
}

impl FieldValue {
    /// Returns whether the value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Encodes the value in the backend wire format.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Integer(i) => json!(i),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Json(v) => v.clone(),
            Self::Location(point) => json!({"$type": "geo", "$lat": point.lat, "$lng": point.lng}),
            Self::Datetime(dt) => json!({
                "$type": "date",
                "$date": dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            }),
            Self::Asset(asset) => json!({"$type": "asset", "$name": asset.0}),
            Self::Reference(id) => json!({"$type": "ref", "$id": id.as_str()}),
        }
    }

    /// Decodes a wire value according to the declared field kind.
    ///
    /// Values whose shape does not match the kind are kept as [`FieldValue::Json`]
    /// so that exports never drop data.
    #[must_use]
    pub fn from_wire(kind: FieldKind, value: &Value) -> Self {
        if value.is_null() {
            return Self::Null;
        }
        let decoded = match kind {
            FieldKind::String => value.as_str().map(|s| Self::String(s.to_string())),
            FieldKind::Number => value.as_f64().map(Self::Number),
            FieldKind::Integer => value
                .as_i64()
                .map(Self::Integer)
                .or_else(|| value.as_f64().map(Self::Number)),
            FieldKind::Boolean => value.as_bool().map(Self::Boolean),
            FieldKind::Json => Some(Self::Json(value.clone())),
            FieldKind::Location => decode_geo(value),
            FieldKind::Datetime => decode_date(value),
            FieldKind::Asset => decode_asset(value),
            FieldKind::Reference => decode_ref(value),
        };
        decoded.unwrap_or_else(|| Self::Json(value.clone()))
    }
}

fn tagged<'a>(value: &'a Value, tag: &str) -> Option<&'a Map<String, Value>> {
    value
        .as_object()
        .filter(|object| object.get("$type").and_then(Value::as_str) == Some(tag))
}

fn decode_geo(value: &Value) -> Option<FieldValue> {
    let object = tagged(value, "geo").or_else(|| value.as_object())?;
    let lat = object.get("$lat")?.as_f64()?;
    let lng = object.get("$lng")?.as_f64()?;
    Some(FieldValue::Location(GeoPoint { lat, lng }))
}

fn decode_date(value: &Value) -> Option<FieldValue> {
    let raw = match tagged(value, "date") {
        Some(object) => object.get("$date")?.as_str()?,
        None => value.as_str()?,
    };
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| FieldValue::Datetime(dt.with_timezone(&Utc)))
}

fn decode_asset(value: &Value) -> Option<FieldValue> {
    let name = match tagged(value, "asset") {
        Some(object) => object.get("$name")?.as_str()?,
        None => value.as_str()?,
    };
    Some(FieldValue::Asset(AssetRef(name.to_string())))
}

fn decode_ref(value: &Value) -> Option<FieldValue> {
    let raw = match tagged(value, "ref") {
        Some(object) => object.get("$id")?.as_str()?,
        None => value.as_str()?,
    };
    RecordId::parse(raw).ok().map(FieldValue::Reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backend_type_mapping() {
        assert_eq!(
            FieldKind::from_backend_type("string"),
            Some(FieldKind::String)
        );
        assert_eq!(
            FieldKind::from_backend_type("ref(user)"),
            Some(FieldKind::Reference)
        );
        assert_eq!(
            FieldKind::from_backend_type("sequence"),
            Some(FieldKind::Integer)
        );
        assert_eq!(FieldKind::from_backend_type("polygon"), None);
    }

    #[test]
    fn test_wire_round_trip_tagged_values() {
        let dt = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let cases = [
            (FieldKind::Datetime, FieldValue::Datetime(dt)),
            (
                FieldKind::Location,
                FieldValue::Location(GeoPoint { lat: 22.3, lng: 114.2 }),
            ),
            (
                FieldKind::Reference,
                FieldValue::Reference(RecordId::new("user", "1")),
            ),
            (
                FieldKind::Asset,
                FieldValue::Asset(AssetRef("avatar.png".to_string())),
            ),
        ];
        for (kind, value) in cases {
            assert_eq!(FieldValue::from_wire(kind, &value.to_wire()), value);
        }
    }

    #[test]
    fn test_date_wire_format() {
        let dt = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            FieldValue::Datetime(dt).to_wire(),
            json!({"$type": "date", "$date": "2021-03-04T05:06:07Z"})
        );
    }

    #[test]
    fn test_mismatched_wire_value_kept_as_json() {
        let value = FieldValue::from_wire(FieldKind::Number, &json!("twelve"));
        assert_eq!(value, FieldValue::Json(json!("twelve")));
    }

    #[test]
    fn test_plain_string_date_accepted() {
        let value = FieldValue::from_wire(FieldKind::Datetime, &json!("2020-01-01T00:00:00Z"));
        assert!(matches!(value, FieldValue::Datetime(_)));
    }
}
