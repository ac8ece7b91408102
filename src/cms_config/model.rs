//! Bound, immutable configuration model.

use crate::codec::{DatetimePolicy, FieldFormat};
use crate::models::FieldKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Column layout for reference fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// All related values in one delimited cell.
    Grouped,
    /// One cell per target field per related record.
    Spread,
}

/// What to do when several records share a lookup value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Resolve to the first fetched match.
    #[default]
    UseFirst,
    /// Fail every row carrying the value.
    ThrowError,
}

/// How related records are found for a reference field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// The field stores the target id; fetched through the query include list.
    Direct,
    /// Target records point back at this record through `source_field`.
    BackReference {
        /// Reference field on the target record type.
        source_field: String,
    },
    /// A join record links this record to target records.
    Association {
        /// Join record type.
        record_type: String,
        /// Join field pointing at the exported record.
        self_field: String,
        /// Join field pointing at the target record.
        other_field: String,
    },
}

/// A target field surfaced by a reference column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetField {
    /// Field name on the target record type.
    pub name: String,
    /// Column label, may contain `{index}`.
    pub label: String,
    /// Codec kind.
    pub kind: FieldKind,
    /// Output format.
    pub format: FieldFormat,
}

/// Reference declaration of an export column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReference {
    /// How related records are found.
    pub kind: ReferenceKind,
    /// Record type of the related records.
    pub target_record_type: String,
    /// Fields rendered for each related record.
    pub target_fields: Vec<TargetField>,
    /// Column layout.
    pub display_mode: DisplayMode,
}

impl ExportReference {
    /// Returns whether a record may have several related records.
    #[must_use]
    pub const fn is_many(&self) -> bool {
        !matches!(self.kind, ReferenceKind::Direct)
    }
}

/// One export column (or column group for references).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportField {
    /// Field name on the exported record type.
    pub name: String,
    /// Column label.
    pub label: String,
    /// Codec kind.
    pub kind: FieldKind,
    /// Output format.
    pub format: FieldFormat,
    /// Reference declaration, for reference columns.
    pub reference: Option<ExportReference>,
}

/// A bound export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Job name.
    pub name: String,
    /// Exported record type.
    pub record_type: String,
    /// Columns in output order.
    pub fields: Vec<ExportField>,
}

impl ExportConfig {
    /// Names of direct reference fields, fetched through the include list.
    #[must_use]
    pub fn direct_reference_fields(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.reference.as_ref().is_some_and(|r| !r.is_many()))
            .map(|f| f.name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Back-reference and association fields, resolved with extra queries.
    pub fn many_reference_fields(&self) -> impl Iterator<Item = &ExportField> {
        self.fields
            .iter()
            .filter(|f| f.reference.as_ref().is_some_and(ExportReference::is_many))
    }
}

/// Reference declaration of an import column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReference {
    /// Referenced record type.
    pub target_record_type: String,
    /// Target field the column value is matched against.
    pub target_field: String,
    /// Codec kind of the target field.
    pub target_kind: FieldKind,
    /// Policy when several targets share a value.
    pub duplicates: DuplicatePolicy,
}

/// One import column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportField {
    /// Field name on the imported record type.
    pub name: String,
    /// Column label.
    pub label: String,
    /// Codec kind.
    pub kind: FieldKind,
    /// Reference declaration, for reference columns.
    pub reference: Option<ImportReference>,
}

/// Import limits, enforced while streaming rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportLimit {
    /// Maximum number of data rows.
    pub record_number: Option<usize>,
    /// Maximum file size in bytes.
    pub file_size: Option<u64>,
}

/// A bound import job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Job name.
    pub name: String,
    /// Imported record type.
    pub record_type: String,
    /// Columns read from the file.
    pub fields: Vec<ImportField>,
    /// Field matching rows to existing records.
    pub identifier: String,
    /// Policy when several records share the identifier value.
    pub duplicate_identifier: DuplicatePolicy,
    /// Row and size limits.
    pub limit: ImportLimit,
    /// Treatment of unparseable datetimes.
    pub datetime_policy: DatetimePolicy,
}

impl ImportConfig {
    /// The primary id field name.
    pub const PRIMARY_IDENTIFIER: &'static str = "_id";

    /// Returns whether rows are matched by a field other than `_id`.
    #[must_use]
    pub fn uses_custom_identifier(&self) -> bool {
        self.identifier != Self::PRIMARY_IDENTIFIER
    }

    /// Returns the identifier column, if it is declared.
    #[must_use]
    pub fn identifier_field(&self) -> Option<&ImportField> {
        self.fields.iter().find(|f| f.name == self.identifier)
    }

    /// Returns the reference columns.
    pub fn reference_fields(&self) -> impl Iterator<Item = (&ImportField, &ImportReference)> {
        self.fields
            .iter()
            .filter_map(|f| f.reference.as_ref().map(|r| (f, r)))
    }
}

/// A bound configuration snapshot. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmsConfig {
    exports: BTreeMap<String, Arc<ExportConfig>>,
    imports: BTreeMap<String, Arc<ImportConfig>>,
}

impl CmsConfig {
    /// Creates a snapshot from bound jobs.
    #[must_use]
    pub fn new(
        exports: impl IntoIterator<Item = ExportConfig>,
        imports: impl IntoIterator<Item = ImportConfig>,
    ) -> Self {
        Self {
            exports: exports
                .into_iter()
                .map(|e| (e.name.clone(), Arc::new(e)))
                .collect(),
            imports: imports
                .into_iter()
                .map(|i| (i.name.clone(), Arc::new(i)))
                .collect(),
        }
    }

    /// Looks up an export job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no export has that name.
    pub fn get_export(&self, name: &str) -> Result<Arc<ExportConfig>> {
        self.exports.get(name).cloned().ok_or_else(|| Error::NotFound {
            kind: "export",
            name: name.to_string(),
        })
    }

    /// Looks up an import job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no import has that name.
    pub fn get_import(&self, name: &str) -> Result<Arc<ImportConfig>> {
        self.imports.get(name).cloned().ok_or_else(|| Error::NotFound {
            kind: "import",
            name: name.to_string(),
        })
    }

    /// Export jobs in name order.
    pub fn exports(&self) -> impl Iterator<Item = &ExportConfig> {
        self.exports.values().map(AsRef::as_ref)
    }

    /// Import jobs in name order.
    pub fn imports(&self) -> impl Iterator<Item = &ImportConfig> {
        self.imports.values().map(AsRef::as_ref)
    }
}
