//! Value codec shared by export and import.
//!
//! [`serialize`] renders a typed [`FieldValue`] as CSV cell text and
//! [`deserialize`] parses cell text into a typed value for a declared
//! [`FieldKind`]. The per-kind rules are fixed for interoperability with
//! previously exported files:
//!
//! | Kind | Serialize | Deserialize |
//! |------|-----------|-------------|
//! | `string` | as-is | as-is |
//! | `number` / `integer` | decimal text | empty → null, else parsed |
//! | `boolean` | `True`/`False`, `T`/`F` or `1`/`0` | `True,T,1` / `False,F,0`, empty → null |
//! | `json` | compact JSON | empty → null, else parsed |
//! | `location` | `(lat,lng)` | `(lat,lng)` pattern, else null |
//! | `datetime` | strftime format | free-form date, see [`DatetimePolicy`] |
//! | `asset` | asset name | asset-by-name token |
//! | `reference` | target key | empty → null, else reference-by-id token |
//!
//! Multi-valued reference cells use the [`list`] serializers.

mod datetime;
pub mod list;

pub use datetime::{DEFAULT_DATETIME_FORMAT, parse_datetime};
pub use list::{SpreadListSerializer, serialize_grouped};

use crate::models::{AssetRef, FieldKind, FieldValue, GeoPoint, RecordId};
use chrono::format::{Item, StrftimeItems};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Matches the `(lat,lng)` location format at the start of the cell.
static LOCATION_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\((.*?),(.*?)\)").ok());

/// Output format for boolean cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BooleanFormat {
    /// `True` / `False`.
    #[default]
    Long,
    /// `T` / `F`.
    Short,
    /// `1` / `0`.
    Number,
}

impl BooleanFormat {
    /// Parses a configured format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Long" => Some(Self::Long),
            "Short" => Some(Self::Short),
            "Number" => Some(Self::Number),
            _ => None,
        }
    }

    const fn render(self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Long, true) => "True",
            (Self::Long, false) => "False",
            (Self::Short, true) => "T",
            (Self::Short, false) => "F",
            (Self::Number, true) => "1",
            (Self::Number, false) => "0",
        }
    }
}

/// Per-field output format selected by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldFormat {
    /// The kind's default rendering.
    #[default]
    Default,
    /// Boolean rendering.
    Boolean(BooleanFormat),
    /// strftime pattern for datetimes.
    Datetime(String),
}

impl FieldFormat {
    /// Builds the format for a field of `kind` from an optional configured string.
    ///
    /// # Errors
    ///
    /// Returns a message describing the problem when the format is unknown or
    /// the kind takes no format.
    pub fn for_kind(kind: FieldKind, format: Option<&str>) -> Result<Self, String> {
        let Some(format) = format else {
            return Ok(Self::Default);
        };
        match kind {
            FieldKind::Boolean => BooleanFormat::parse(format)
                .map(Self::Boolean)
                .ok_or_else(|| {
                    format!("boolean format \"{format}\" not supported, expected Long, Short or Number")
                }),
            FieldKind::Datetime => {
                if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                    Err(format!("datetime format \"{format}\" is not a valid strftime pattern"))
                } else {
                    Ok(Self::Datetime(format.to_string()))
                }
            },
            other => Err(format!("field kind \"{other}\" does not take a format")),
        }
    }
}

/// How unparseable, non-empty datetime cells are treated on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatetimePolicy {
    /// The row fails with an invalid value error.
    #[default]
    Error,
    /// The value silently becomes null.
    Null,
}

/// A cell that could not be parsed for its declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Boolean token outside the accepted set.
    #[error("unknown boolean value \"{0}\"")]
    InvalidBoolean(String),
    /// Text that is not a number.
    #[error("invalid number \"{0}\"")]
    InvalidNumber(String),
    /// Text that is not an integer.
    #[error("invalid integer \"{0}\"")]
    InvalidInteger(String),
    /// Text that is not JSON.
    #[error("invalid JSON \"{value}\": {reason}")]
    InvalidJson {
        /// The cell text.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// Text that is not a recognisable date.
    #[error("invalid datetime \"{0}\"")]
    InvalidDatetime(String),
}

/// Renders a value as CSV cell text.
#[must_use]
pub fn serialize(value: &FieldValue, format: &FieldFormat) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::String(s) => s.clone(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Boolean(b) => {
            let format = match format {
                FieldFormat::Boolean(f) => *f,
                _ => BooleanFormat::default(),
            };
            format.render(*b).to_string()
        },
        FieldValue::Json(v) => v.to_string(),
        FieldValue::Location(point) => format!("({},{})", point.lat, point.lng),
        FieldValue::Datetime(dt) => {
            let pattern = match format {
                FieldFormat::Datetime(p) => p.as_str(),
                _ => DEFAULT_DATETIME_FORMAT,
            };
            dt.format(pattern).to_string()
        },
        FieldValue::Asset(asset) => asset.0.clone(),
        FieldValue::Reference(id) => id.key().to_string(),
    }
}

/// Decodes a wire value for `kind` and renders it as cell text.
#[must_use]
pub fn serialize_wire(kind: FieldKind, value: Option<&Value>, format: &FieldFormat) -> String {
    value.map_or_else(String::new, |v| {
        serialize(&FieldValue::from_wire(kind, v), format)
    })
}

/// Parses cell text into a typed value.
///
/// # Errors
///
/// Returns a [`CodecError`] when the text is not valid for `kind`. Such errors
/// are per-row, never request-fatal.
pub fn deserialize(
    kind: FieldKind,
    raw: &str,
    datetime_policy: DatetimePolicy,
) -> Result<FieldValue, CodecError> {
    match kind {
        FieldKind::String => Ok(FieldValue::String(raw.to_string())),
        FieldKind::Number => {
            if raw.is_empty() {
                return Ok(FieldValue::Null);
            }
            // The wire format has no encoding for inf or NaN.
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number)
                .ok_or_else(|| CodecError::InvalidNumber(raw.to_string()))
        },
        FieldKind::Integer => {
            if raw.is_empty() {
                return Ok(FieldValue::Null);
            }
            raw.trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| CodecError::InvalidInteger(raw.to_string()))
        },
        FieldKind::Boolean => match raw {
            "True" | "T" | "1" => Ok(FieldValue::Boolean(true)),
            "False" | "F" | "0" => Ok(FieldValue::Boolean(false)),
            "" => Ok(FieldValue::Null),
            other => Err(CodecError::InvalidBoolean(other.to_string())),
        },
        FieldKind::Json => {
            if raw.is_empty() {
                return Ok(FieldValue::Null);
            }
            serde_json::from_str(raw)
                .map(FieldValue::Json)
                .map_err(|e| CodecError::InvalidJson {
                    value: raw.to_string(),
                    reason: e.to_string(),
                })
        },
        FieldKind::Location => Ok(deserialize_location(raw)),
        FieldKind::Datetime => {
            if raw.trim().is_empty() {
                return Ok(FieldValue::Null);
            }
            match (parse_datetime(raw), datetime_policy) {
                (Some(dt), _) => Ok(FieldValue::Datetime(dt)),
                (None, DatetimePolicy::Null) => Ok(FieldValue::Null),
                (None, DatetimePolicy::Error) => Err(CodecError::InvalidDatetime(raw.to_string())),
            }
        },
        FieldKind::Asset => {
            if raw.is_empty() {
                return Ok(FieldValue::Null);
            }
            Ok(FieldValue::Asset(AssetRef(raw.to_string())))
        },
        FieldKind::Reference => {
            if raw.is_empty() {
                return Ok(FieldValue::Null);
            }
            Ok(RecordId::parse(raw).map_or_else(
                |_| FieldValue::String(raw.to_string()),
                FieldValue::Reference,
            ))
        },
    }
}

fn deserialize_location(raw: &str) -> FieldValue {
    let Some(pattern) = LOCATION_PATTERN.as_ref() else {
        return FieldValue::Null;
    };
    let Some(captures) = pattern.captures(raw) else {
        return FieldValue::Null;
    };
    let lat = captures.get(1).and_then(|m| m.as_str().trim().parse::<f64>().ok());
    let lng = captures.get(2).and_then(|m| m.as_str().trim().parse::<f64>().ok());
    match (lat, lng) {
        (Some(lat), Some(lng)) => FieldValue::Location(GeoPoint { lat, lng }),
        _ => FieldValue::Null,
    }
}
