//! The YAML configuration document, as written by operators.
//!
//! The document is parsed as-is here and only validated against the backend
//! schema by [`crate::schema::bind`].

use super::{DisplayMode, DuplicatePolicy};
use crate::codec::DatetimePolicy;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    /// Record aliases used by `reference_target`, keyed by alias.
    #[serde(default)]
    pub records: BTreeMap<String, Option<RecordAliasDocument>>,
    /// Join record types for many-to-many references, keyed by name.
    #[serde(default)]
    pub association_records: BTreeMap<String, AssociationDocument>,
    /// Export jobs keyed by name.
    #[serde(default)]
    pub exports: BTreeMap<String, ExportDocument>,
    /// Import jobs keyed by name.
    #[serde(default)]
    pub imports: BTreeMap<String, ImportDocument>,
}

impl ConfigDocument {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the document is not valid YAML or
    /// does not follow the grammar.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid configuration document: {e}")))
    }
}

/// A record alias entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordAliasDocument {
    /// Backend record type; defaults to the alias itself.
    pub record_type: Option<String>,
}

/// An association (join) record declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssociationDocument {
    /// Backend record type; defaults to the association name.
    pub record_type: Option<String>,
    /// The two reference fields of the join record.
    pub fields: Vec<AssociationFieldDocument>,
}

/// One side of an association record.
#[derive(Debug, Clone, Deserialize)]
pub struct AssociationFieldDocument {
    /// Field name on the association record.
    pub name: String,
    /// Record alias the field points to.
    pub reference_target: String,
}

/// An export job.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportDocument {
    /// Backend record type to export.
    pub record_type: String,
    /// Columns, in output order.
    #[serde(default)]
    pub fields: Vec<ExportFieldDocument>,
}

/// One export column declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportFieldDocument {
    /// Field name on the exported record type.
    pub name: String,
    /// Column label; defaults to the name.
    pub label: Option<String>,
    /// Output format (booleans and datetimes only).
    pub format: Option<String>,
    /// Alias of the referenced record type.
    pub reference_target: Option<String>,
    /// Single target field to surface.
    pub reference_field_name: Option<String>,
    /// Several target fields to surface.
    pub reference_fields: Option<Vec<TargetFieldDocument>>,
    /// Alias of the record type holding a reference back to this one.
    pub reference_via_back_reference: Option<String>,
    /// Field on the back-referencing record type.
    pub reference_from_field: Option<String>,
    /// Association record to traverse.
    pub reference_via_association_record: Option<String>,
    /// Column layout for multi-valued references.
    pub display_mode: Option<DisplayMode>,
}

/// A target field inside `reference_fields`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetFieldDocument {
    /// Field name on the target record type.
    pub name: String,
    /// Column label; defaults to the name. May contain `{index}`.
    pub label: Option<String>,
    /// Output format.
    pub format: Option<String>,
}

/// An import job.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportDocument {
    /// Backend record type to import into.
    pub record_type: String,
    /// Field used to match rows to existing records; defaults to `_id`.
    pub identifier: Option<String>,
    /// Policy when several records share the identifier value.
    pub handle_duplicated_identifier: Option<DuplicatePolicy>,
    /// Row and size limits.
    pub limit: Option<LimitDocument>,
    /// Treatment of unparseable datetimes.
    pub invalid_datetime: Option<DatetimePolicy>,
    /// Columns read from the file.
    #[serde(default)]
    pub fields: Vec<ImportFieldDocument>,
}

/// Import limits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitDocument {
    /// Maximum number of data rows.
    pub record_number: Option<usize>,
    /// Maximum file size, human readable (`5MB`, `512KiB`).
    pub file_size: Option<String>,
}

/// One import column declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportFieldDocument {
    /// Field name on the imported record type.
    pub name: String,
    /// Column label; defaults to the name.
    pub label: Option<String>,
    /// Alias of the referenced record type.
    pub reference_target: Option<String>,
    /// Target field the column value is matched against.
    pub reference_field_name: Option<String>,
    /// Policy when several target records share the value.
    pub handle_duplicated_reference: Option<DuplicatePolicy>,
}

/// Parses a human-readable size such as `5MB`, `512KiB` or `1024`.
///
/// Decimal units (`KB`, `MB`, `GB`, `TB`, and the bare `K`, `M`, `G`, `T`)
/// are powers of 1000; binary units (`KiB`, `MiB`, `GiB`, `TiB`) are powers
/// of 1024. Units are case-insensitive.
///
/// # Errors
///
/// Returns a message if the text is not a size.
pub fn parse_file_size(text: &str) -> std::result::Result<u64, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid file size \"{text}\""))?;

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" | "bytes" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "kib" => 1 << 10,
        "mib" => 1 << 20,
        "gib" => 1 << 30,
        "tib" => 1 << 40,
        other => return Err(format!("unknown size unit \"{other}\" in \"{text}\"")),
    };

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let bytes = (number * multiplier as f64).round() as u64;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1024", 1024)]
    #[test_case("5MB", 5_000_000)]
    #[test_case("5 mb", 5_000_000)]
    #[test_case("512KiB", 524_288)]
    #[test_case("1.5GB", 1_500_000_000)]
    #[test_case("2k", 2_000)]
    fn test_parse_file_size(text: &str, expected: u64) {
        assert_eq!(parse_file_size(text).unwrap(), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("MB"; "no number")]
    #[test_case("5 parsecs"; "unknown unit")]
    fn test_parse_file_size_rejects(text: &str) {
        assert!(parse_file_size(text).is_err());
    }

    #[test]
    fn test_document_grammar() {
        let doc = ConfigDocument::from_yaml(
            r"
records:
  user:
  staff:
    record_type: user
association_records:
  user_has_skill:
    fields:
      - name: user
        reference_target: user
      - name: skill
        reference_target: skill
exports:
  users:
    record_type: user
    fields:
      - name: email
        label: Email
      - name: skills
        reference_via_association_record: user_has_skill
        reference_target: skill
        reference_fields:
          - name: name
            label: Skill {index}
imports:
  users:
    record_type: user
    identifier: email
    handle_duplicated_identifier: throw_error
    limit:
      record_number: 100
      file_size: 5MB
    invalid_datetime: 'null'
    fields:
      - name: email
",
        )
        .unwrap();

        assert_eq!(doc.records.len(), 2);
        assert_eq!(
            doc.records["staff"].as_ref().and_then(|r| r.record_type.as_deref()),
            Some("user")
        );
        assert_eq!(doc.association_records["user_has_skill"].fields.len(), 2);
        let export = &doc.exports["users"];
        assert_eq!(export.fields.len(), 2);
        assert_eq!(
            export.fields[1].reference_fields.as_ref().map(Vec::len),
            Some(1)
        );
        let import = &doc.imports["users"];
        assert_eq!(import.identifier.as_deref(), Some("email"));
        assert_eq!(
            import.handle_duplicated_identifier,
            Some(DuplicatePolicy::ThrowError)
        );
        assert_eq!(import.invalid_datetime, Some(DatetimePolicy::Null));
    }

    #[test]
    fn test_invalid_document_is_configuration_error() {
        let err = ConfigDocument::from_yaml("exports: [1, 2").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
