//! Binds a configuration document against the backend schema.

use super::{Schema, SchemaField};
use crate::cms_config::{
    CmsConfig, ConfigDocument, DisplayMode, ExportConfig, ExportDocument, ExportField,
    ExportFieldDocument, ExportReference, ImportConfig, ImportDocument, ImportField,
    ImportFieldDocument, ImportLimit, ImportReference, ReferenceKind, TargetField,
    parse_file_size,
};
use crate::codec::FieldFormat;
use crate::models::FieldKind;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Binds every export and import of `document` against `schema`.
///
/// Each configured field is looked up in the catalogue (reserved fields
/// included). Schema reference fields bind as direct references; fields
/// absent from the schema must be declared as back-references or
/// association references.
///
/// # Errors
///
/// Returns [`Error::Configuration`] naming the record type and field for any
/// field that cannot be bound, and [`Error::UnsupportedFieldType`] for schema
/// types the codec does not handle.
pub fn bind(document: &ConfigDocument, schema: &Schema) -> Result<CmsConfig> {
    let binder = Binder::new(document, schema);

    let exports = document
        .exports
        .iter()
        .map(|(name, export)| binder.bind_export(name, export))
        .collect::<Result<Vec<_>>>()?;
    let imports = document
        .imports
        .iter()
        .map(|(name, import)| binder.bind_import(name, import))
        .collect::<Result<Vec<_>>>()?;

    Ok(CmsConfig::new(exports, imports))
}

struct Association {
    record_type: String,
    /// `(field name, target record alias)` pairs.
    fields: Vec<(String, String)>,
}

struct Binder<'a> {
    schema: &'a Schema,
    aliases: BTreeMap<String, String>,
    associations: BTreeMap<String, Association>,
}

impl<'a> Binder<'a> {
    fn new(document: &ConfigDocument, schema: &'a Schema) -> Self {
        let aliases = document
            .records
            .iter()
            .map(|(alias, record)| {
                let record_type = record
                    .as_ref()
                    .and_then(|r| r.record_type.clone())
                    .unwrap_or_else(|| alias.clone());
                (alias.clone(), record_type)
            })
            .collect();

        let associations = document
            .association_records
            .iter()
            .map(|(name, association)| {
                let association = Association {
                    record_type: association
                        .record_type
                        .clone()
                        .unwrap_or_else(|| name.clone()),
                    fields: association
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), f.reference_target.clone()))
                        .collect(),
                };
                (name.clone(), association)
            })
            .collect();

        Self {
            schema,
            aliases,
            associations,
        }
    }

    fn record_type_of(&self, alias: &str) -> String {
        self.aliases
            .get(alias)
            .cloned()
            .unwrap_or_else(|| alias.to_string())
    }

    fn require_record_type(&self, record_type: &str) -> Result<()> {
        if self.schema.has_record_type(record_type) {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "record type \"{record_type}\" not found in schema"
            )))
        }
    }

    fn require_field(&self, record_type: &str, field: &str) -> Result<SchemaField> {
        self.schema.field_of(record_type, field).ok_or_else(|| {
            Error::Configuration(format!(
                "field name \"{record_type}.{field}\" not found in schema"
            ))
        })
    }

    fn kind_of(record_type: &str, field: &SchemaField) -> Result<FieldKind> {
        field.kind().ok_or_else(|| Error::UnsupportedFieldType {
            record_type: record_type.to_string(),
            field: field.name.clone(),
            type_name: field.type_name.clone(),
        })
    }

    fn format_of(
        record_type: &str,
        field: &str,
        kind: FieldKind,
        format: Option<&str>,
    ) -> Result<FieldFormat> {
        FieldFormat::for_kind(kind, format).map_err(|message| {
            Error::Configuration(format!("field \"{record_type}.{field}\": {message}"))
        })
    }

    fn bind_export(&self, name: &str, export: &ExportDocument) -> Result<ExportConfig> {
        self.require_record_type(&export.record_type)?;
        let fields = export
            .fields
            .iter()
            .map(|field| self.bind_export_field(&export.record_type, field))
            .collect::<Result<Vec<_>>>()?;

        Ok(ExportConfig {
            name: name.to_string(),
            record_type: export.record_type.clone(),
            fields,
        })
    }

    fn bind_export_field(
        &self,
        record_type: &str,
        field: &ExportFieldDocument,
    ) -> Result<ExportField> {
        let label = field.label.clone().unwrap_or_else(|| field.name.clone());

        let reference = match self.schema.field_of(record_type, &field.name) {
            Some(schema_field) if schema_field.is_ref() => {
                let target_alias = field
                    .reference_target
                    .as_deref()
                    .or_else(|| schema_field.ref_target())
                    .unwrap_or_default();
                let target_record_type = self.record_type_of(target_alias);
                self.export_reference(field, ReferenceKind::Direct, target_record_type)?
            },
            Some(schema_field) => {
                let kind = Self::kind_of(record_type, &schema_field)?;
                return Ok(ExportField {
                    name: field.name.clone(),
                    label,
                    kind,
                    format: Self::format_of(record_type, &field.name, kind, field.format.as_deref())?,
                    reference: None,
                });
            },
            None => {
                if let Some(source_alias) = &field.reference_via_back_reference {
                    let target_record_type = self.record_type_of(source_alias);
                    let source_field = field.reference_from_field.clone().ok_or_else(|| {
                        Error::Configuration(format!(
                            "back-reference field \"{record_type}.{}\" requires reference_from_field",
                            field.name
                        ))
                    })?;
                    self.require_record_type(&target_record_type)?;
                    self.require_field(&target_record_type, &source_field)?;
                    self.export_reference(
                        field,
                        ReferenceKind::BackReference { source_field },
                        target_record_type,
                    )?
                } else if let Some(association) = &field.reference_via_association_record {
                    let (kind, target_record_type) =
                        self.association_kind(record_type, field, association)?;
                    self.export_reference(field, kind, target_record_type)?
                } else {
                    return Err(Error::Configuration(format!(
                        "field name \"{record_type}.{}\" not found in schema, and neither \
                         reference_via_association_record nor reference_via_back_reference \
                         is declared",
                        field.name
                    )));
                }
            },
        };

        Ok(ExportField {
            name: field.name.clone(),
            label,
            kind: FieldKind::Reference,
            format: FieldFormat::Default,
            reference: Some(reference),
        })
    }

    fn association_kind(
        &self,
        record_type: &str,
        field: &ExportFieldDocument,
        association_name: &str,
    ) -> Result<(ReferenceKind, String)> {
        let association = self.associations.get(association_name).ok_or_else(|| {
            Error::Configuration(format!(
                "association record \"{association_name}\" used by \"{record_type}.{}\" is not declared",
                field.name
            ))
        })?;
        let target_alias = field.reference_target.as_deref().ok_or_else(|| {
            Error::Configuration(format!(
                "association field \"{record_type}.{}\" requires reference_target",
                field.name
            ))
        })?;
        let [first, second] = association.fields.as_slice() else {
            return Err(Error::Configuration(format!(
                "association record \"{association_name}\" must declare exactly two fields"
            )));
        };
        let (other, this) = if first.1 == target_alias {
            (first, second)
        } else if second.1 == target_alias {
            (second, first)
        } else {
            return Err(Error::Configuration(format!(
                "association record \"{association_name}\" has no field referencing \"{target_alias}\""
            )));
        };

        self.require_record_type(&association.record_type)?;
        self.require_field(&association.record_type, &this.0)?;
        self.require_field(&association.record_type, &other.0)?;

        let kind = ReferenceKind::Association {
            record_type: association.record_type.clone(),
            self_field: this.0.clone(),
            other_field: other.0.clone(),
        };
        Ok((kind, self.record_type_of(target_alias)))
    }

    fn export_reference(
        &self,
        field: &ExportFieldDocument,
        kind: ReferenceKind,
        target_record_type: String,
    ) -> Result<ExportReference> {
        let (target_fields, many_fields) = if let Some(name) = &field.reference_field_name {
            let label = field.label.clone().unwrap_or_else(|| field.name.clone());
            let target =
                self.target_field(&target_record_type, name, label, field.format.as_deref())?;
            (vec![target], false)
        } else if let Some(fields) = &field.reference_fields {
            let targets = fields
                .iter()
                .map(|f| {
                    let label = f.label.clone().unwrap_or_else(|| f.name.clone());
                    self.target_field(&target_record_type, &f.name, label, f.format.as_deref())
                })
                .collect::<Result<Vec<_>>>()?;
            (targets, true)
        } else {
            return Err(Error::Configuration(format!(
                "reference field \"{}\" requires either reference_field_name or reference_fields",
                field.name
            )));
        };

        let display_mode = field.display_mode.unwrap_or(if many_fields {
            DisplayMode::Spread
        } else {
            DisplayMode::Grouped
        });

        Ok(ExportReference {
            kind,
            target_record_type,
            target_fields,
            display_mode,
        })
    }

    fn target_field(
        &self,
        record_type: &str,
        name: &str,
        label: String,
        format: Option<&str>,
    ) -> Result<TargetField> {
        let schema_field = self.require_field(record_type, name)?;
        let kind = Self::kind_of(record_type, &schema_field)?;
        Ok(TargetField {
            name: name.to_string(),
            label,
            kind,
            format: Self::format_of(record_type, name, kind, format)?,
        })
    }

    fn bind_import(&self, name: &str, import: &ImportDocument) -> Result<ImportConfig> {
        let record_type = &import.record_type;
        self.require_record_type(record_type)?;
        let fields = import
            .fields
            .iter()
            .map(|field| self.bind_import_field(record_type, field))
            .collect::<Result<Vec<_>>>()?;

        let identifier = import
            .identifier
            .clone()
            .unwrap_or_else(|| ImportConfig::PRIMARY_IDENTIFIER.to_string());
        if identifier != ImportConfig::PRIMARY_IDENTIFIER
            && !fields.iter().any(|f| f.name == identifier)
        {
            return Err(Error::Configuration(format!(
                "import \"{name}\": identifier \"{identifier}\" must be one of the import fields"
            )));
        }

        let limit = import.limit.clone().unwrap_or_default();
        let file_size = limit
            .file_size
            .as_deref()
            .map(parse_file_size)
            .transpose()
            .map_err(|message| Error::Configuration(format!("import \"{name}\": {message}")))?;

        Ok(ImportConfig {
            name: name.to_string(),
            record_type: record_type.clone(),
            fields,
            identifier,
            duplicate_identifier: import.handle_duplicated_identifier.unwrap_or_default(),
            limit: ImportLimit {
                record_number: limit.record_number,
                file_size,
            },
            datetime_policy: import.invalid_datetime.unwrap_or_default(),
        })
    }

    fn bind_import_field(
        &self,
        record_type: &str,
        field: &ImportFieldDocument,
    ) -> Result<ImportField> {
        let label = field.label.clone().unwrap_or_else(|| field.name.clone());
        let schema_field = self.require_field(record_type, &field.name)?;

        if !schema_field.is_ref() {
            return Ok(ImportField {
                name: field.name.clone(),
                label,
                kind: Self::kind_of(record_type, &schema_field)?,
                reference: None,
            });
        }

        let target_alias = field
            .reference_target
            .as_deref()
            .or_else(|| schema_field.ref_target())
            .unwrap_or_default();
        let target_record_type = self.record_type_of(target_alias);
        let target_field = field.reference_field_name.clone().ok_or_else(|| {
            Error::Configuration(format!(
                "reference field \"{record_type}.{}\" requires reference_field_name",
                field.name
            ))
        })?;
        let target_schema_field = self.require_field(&target_record_type, &target_field)?;
        let target_kind = Self::kind_of(&target_record_type, &target_schema_field)?;

        Ok(ImportField {
            name: field.name.clone(),
            label,
            kind: FieldKind::Reference,
            reference: Some(ImportReference {
                target_record_type,
                target_field,
                target_kind,
                duplicates: field.handle_duplicated_reference.unwrap_or_default(),
            }),
        })
    }
}
