//! Record import service.
//!
//! Runs every row through four stages, in order: reference resolution, asset
//! resolution, value decoding and id assignment. Lookups are batched before
//! the first row is resolved: one backend query per looked-up field, never
//! one per row.

use crate::cms_config::{CmsConfig, DuplicatePolicy, ImportConfig};
use crate::codec;
use crate::io::formats::CsvImportSource;
use crate::io::identifier_map::{Lookup, RecordIdentifierMap};
use crate::io::report::{ImportReport, ImportResultItem};
use crate::io::traits::{ImportRow, ImportSource};
use crate::io::RowError;
use crate::models::{AssetRef, FieldKind, FieldValue, Predicate, Record, RecordId, RESERVED_FIELDS};
use crate::storage::{AssetRegistry, RecordQuery, RecordStore};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// An import run request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRequest {
    /// Import job name.
    pub name: String,
    /// All rows succeed or nothing is persisted.
    pub atomic: bool,
}

impl ImportRequest {
    /// Creates a non-atomic request for an import job.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            atomic: false,
        }
    }

    /// Enables or disables atomic mode.
    #[must_use]
    pub const fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }
}

/// A lookup after applying the duplicate policy.
enum Resolution {
    Id(RecordId),
    Missing,
    Duplicate,
}

impl Resolution {
    fn choose(lookup: Lookup, policy: DuplicatePolicy) -> Self {
        match (lookup, policy) {
            (Lookup::Found(id), _) => Self::Id(id),
            (Lookup::Missing, _) => Self::Missing,
            (Lookup::Duplicated(ids), DuplicatePolicy::UseFirst) => {
                ids.into_iter().next().map_or(Self::Missing, Self::Id)
            },
            (Lookup::Duplicated(_), DuplicatePolicy::ThrowError) => Self::Duplicate,
        }
    }
}

/// Resolves single rows against prefetched lookups.
struct RowResolver<'a> {
    import: &'a ImportConfig,
    identifiers: &'a RecordIdentifierMap,
    /// Asset cell text to stored asset name, `None` when nothing matched.
    assets: &'a HashMap<String, Option<String>>,
}

impl RowResolver<'_> {
    fn resolve(&self, row: &ImportRow) -> std::result::Result<Record, RowError> {
        let mut resolved = self.resolve_references(row)?;
        resolved.extend(self.resolve_assets(row)?);
        let fields = self.decode(row, resolved)?;
        let id = self.assign_id(row)?;
        Ok(Record { id, fields })
    }

    fn resolve_references(
        &self,
        row: &ImportRow,
    ) -> std::result::Result<BTreeMap<String, FieldValue>, RowError> {
        let mut values = BTreeMap::new();
        for (field, reference) in self.import.reference_fields() {
            let raw = row.cell(&field.name);
            let value = if raw.is_empty() {
                FieldValue::Null
            } else {
                let lookup = self.identifiers.lookup(
                    &reference.target_record_type,
                    &reference.target_field,
                    raw,
                );
                match Resolution::choose(lookup, reference.duplicates) {
                    Resolution::Id(id) => FieldValue::Reference(id),
                    Resolution::Missing => {
                        return Err(RowError::ReferenceNotFound {
                            field: field.name.clone(),
                            value: raw.to_string(),
                        });
                    },
                    Resolution::Duplicate => {
                        return Err(RowError::DuplicateReference {
                            field: field.name.clone(),
                            value: raw.to_string(),
                        });
                    },
                }
            };
            values.insert(field.name.clone(), value);
        }
        Ok(values)
    }

    fn resolve_assets(
        &self,
        row: &ImportRow,
    ) -> std::result::Result<BTreeMap<String, FieldValue>, RowError> {
        let mut values = BTreeMap::new();
        for field in self.import.fields.iter().filter(|f| f.kind == FieldKind::Asset) {
            let raw = row.cell(&field.name);
            let value = if raw.is_empty() {
                FieldValue::Null
            } else {
                match self.assets.get(raw) {
                    Some(Some(name)) => FieldValue::Asset(AssetRef(name.clone())),
                    _ => {
                        return Err(RowError::AssetNotFound {
                            field: field.name.clone(),
                            value: raw.to_string(),
                        });
                    },
                }
            };
            values.insert(field.name.clone(), value);
        }
        Ok(values)
    }

    fn decode(
        &self,
        row: &ImportRow,
        mut resolved: BTreeMap<String, FieldValue>,
    ) -> std::result::Result<Map<String, Value>, RowError> {
        let mut fields = Map::new();
        for field in &self.import.fields {
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                continue;
            }
            let value = match resolved.remove(&field.name) {
                Some(value) => value,
                None => codec::deserialize(
                    field.kind,
                    row.cell(&field.name),
                    self.import.datetime_policy,
                )
                .map_err(|e| RowError::InvalidValue {
                    field: field.name.clone(),
                    message: e.to_string(),
                })?,
            };
            fields.insert(field.name.clone(), value.to_wire());
        }
        Ok(fields)
    }

    fn assign_id(&self, row: &ImportRow) -> std::result::Result<RecordId, RowError> {
        let record_type = &self.import.record_type;
        let raw = row.cell(&self.import.identifier);
        if raw.is_empty() {
            return Ok(RecordId::generate(record_type));
        }
        if !self.import.uses_custom_identifier() {
            return Ok(RecordId::qualify(record_type, raw));
        }

        let lookup = self
            .identifiers
            .lookup(record_type, &self.import.identifier, raw);
        match Resolution::choose(lookup, self.import.duplicate_identifier) {
            Resolution::Id(id) => Ok(id),
            Resolution::Missing => Ok(RecordId::generate(record_type)),
            Resolution::Duplicate => Err(RowError::DuplicateIdentifier {
                value: raw.to_string(),
            }),
        }
    }
}

/// Collects the distinct lookup values of `columns`, in first-seen order.
///
/// Cells are deduplicated by canonical text, so `1` and `1.0` of a number
/// field are queried once.
fn distinct_query_values(kind: FieldKind, rows: &[ImportRow], columns: &[&str]) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for row in rows {
        for column in columns {
            let raw = row.cell(column);
            if raw.is_empty() || !seen.insert(RecordIdentifierMap::canonical(kind, raw)) {
                continue;
            }
            if let Some(value) = RecordIdentifierMap::query_value(kind, raw) {
                values.push(value);
            }
        }
    }
    values
}

/// Service for importing records from CSV.
pub struct ImportService {
    /// Backend the records are saved to.
    store: Arc<dyn RecordStore>,
    /// Staged file and asset lookups.
    assets: Arc<dyn AssetRegistry>,
}

impl ImportService {
    /// Creates a new import service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, assets: Arc<dyn AssetRegistry>) -> Self {
        Self { store, assets }
    }

    /// Imports records from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the import fails.
    pub fn import_from_file(
        &self,
        config: &CmsConfig,
        request: &ImportRequest,
        path: &Path,
    ) -> Result<ImportReport> {
        let file = std::fs::File::open(path).map_err(|e| Error::OperationFailed {
            operation: "open_import_file".to_string(),
            cause: e.to_string(),
        })?;
        self.import_from_reader(config, request, std::io::BufReader::new(file))
    }

    /// Imports records from a CSV reader.
    ///
    /// # Errors
    ///
    /// Request-fatal failures are returned as errors: unknown import name,
    /// missing column, exceeded limit, unreadable CSV, backend failure, and
    /// in atomic mode the first failed row as [`Error::RowFailed`]. Per-row
    /// failures of a non-atomic import are reported in the [`ImportReport`].
    pub fn import_from_reader<R: Read>(
        &self,
        config: &CmsConfig,
        request: &ImportRequest,
        reader: R,
    ) -> Result<ImportReport> {
        let import = config.get_import(&request.name)?;
        let rows = CsvImportSource::new(reader, &import)?.read_all()?;
        self.import_rows(&import, &rows, request.atomic)
    }

    /// Imports already-read rows.
    ///
    /// # Errors
    ///
    /// See [`Self::import_from_reader`].
    #[instrument(skip(self, import, rows), fields(import = %import.name, rows = rows.len()))]
    pub fn import_rows(
        &self,
        import: &ImportConfig,
        rows: &[ImportRow],
        atomic: bool,
    ) -> Result<ImportReport> {
        let start = Instant::now();
        let identifiers = self.build_identifier_map(import, rows)?;
        let assets = self.lookup_assets(import, rows)?;

        let resolver = RowResolver {
            import,
            identifiers: &identifiers,
            assets: &assets,
        };
        let outcomes = rows.iter().map(|row| resolver.resolve(row)).collect();
        let report = self.persist(outcomes, atomic)?;

        metrics::counter!("recordport_import_rows_total", "outcome" => "success")
            .increment(report.success_count as u64);
        metrics::counter!("recordport_import_rows_total", "outcome" => "error")
            .increment(report.error_count as u64);
        metrics::histogram!("recordport_import_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            success_count = report.success_count,
            error_count = report.error_count,
            atomic,
            "Import complete"
        );

        Ok(report)
    }

    /// Prefetches every value the rows look up, one query per field.
    fn build_identifier_map(
        &self,
        import: &ImportConfig,
        rows: &[ImportRow],
    ) -> Result<RecordIdentifierMap> {
        // (record type, field) -> (kind, columns read for it)
        let mut lookups: BTreeMap<(String, String), (FieldKind, Vec<&str>)> = BTreeMap::new();
        if import.uses_custom_identifier() {
            if let Some(field) = import.identifier_field() {
                lookups
                    .entry((import.record_type.clone(), field.name.clone()))
                    .or_insert_with(|| (field.kind, Vec::new()))
                    .1
                    .push(&field.name);
            }
        }
        for (field, reference) in import.reference_fields() {
            if reference.target_field == ImportConfig::PRIMARY_IDENTIFIER {
                continue;
            }
            lookups
                .entry((
                    reference.target_record_type.clone(),
                    reference.target_field.clone(),
                ))
                .or_insert_with(|| (reference.target_kind, Vec::new()))
                .1
                .push(&field.name);
        }

        let mut map = RecordIdentifierMap::new();
        for ((record_type, field), (kind, columns)) in lookups {
            map.register(&record_type, &field, kind);

            let values = distinct_query_values(kind, rows, &columns);
            if values.is_empty() {
                continue;
            }

            tracing::debug!(%record_type, %field, values = values.len(), "Prefetching lookup values");
            let query = RecordQuery::new(&record_type)
                .with_predicate(Predicate::any_eq(&field, values));
            for fetched in self.store.query(&query)? {
                if let Some(value) = fetched.record.get(&field) {
                    map.insert(&record_type, &field, &value, fetched.record.id);
                }
            }
        }
        Ok(map)
    }

    /// Looks up every distinct asset cell: staged files first, then stored assets.
    fn lookup_assets(
        &self,
        import: &ImportConfig,
        rows: &[ImportRow],
    ) -> Result<HashMap<String, Option<String>>> {
        let mut found = HashMap::new();
        for field in import.fields.iter().filter(|f| f.kind == FieldKind::Asset) {
            for row in rows {
                let raw = row.cell(&field.name);
                if raw.is_empty() || found.contains_key(raw) {
                    continue;
                }
                let asset = match self.assets.find_staged_file(raw)? {
                    Some(asset) => Some(asset),
                    None => self.assets.find_asset(raw)?,
                };
                found.insert(raw.to_string(), asset.map(|a| a.name));
            }
        }
        Ok(found)
    }

    /// Saves the resolved rows and merges failures back at their positions.
    fn persist(
        &self,
        outcomes: Vec<std::result::Result<Record, RowError>>,
        atomic: bool,
    ) -> Result<ImportReport> {
        if atomic {
            if let Some((row, error)) = outcomes
                .iter()
                .enumerate()
                .find_map(|(row, outcome)| outcome.as_ref().err().map(|e| (row, e.clone())))
            {
                tracing::warn!(row, error = %error, "Atomic import aborted");
                return Err(Error::RowFailed { row, error });
            }
        }

        let mut pending = Vec::new();
        let mut failures = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(record) => {
                    pending.push(record);
                    failures.push(None);
                },
                Err(error) => failures.push(Some(error)),
            }
        }

        let saved = if pending.is_empty() {
            Vec::new()
        } else {
            self.store.save(&pending, atomic)?
        };
        if saved.len() != pending.len() {
            return Err(Error::operation(
                "record_save",
                format!("{} results for {} records", saved.len(), pending.len()),
            ));
        }

        let mut saved = pending.into_iter().zip(saved);
        let mut items = Vec::with_capacity(failures.len());
        for (row, failure) in failures.into_iter().enumerate() {
            if let Some(error) = failure {
                items.push(ImportResultItem::failed(&error, None));
                continue;
            }
            let Some((record, outcome)) = saved.next() else {
                return Err(Error::operation("record_save", "missing save result"));
            };
            match outcome {
                Ok(stored) => items.push(ImportResultItem::saved(stored)),
                Err(backend) => {
                    let error = RowError::from(backend);
                    if atomic {
                        return Err(Error::RowFailed { row, error });
                    }
                    items.push(ImportResultItem::failed(&error, Some(record.id.to_string())));
                },
            }
        }

        Ok(ImportReport::from_items(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms_config::{ImportField, ImportLimit, ImportReference};
    use crate::codec::DatetimePolicy;
    use crate::schema::Schema;
    use crate::storage::{MemoryAssetRegistry, MemoryRecordStore, StoredAsset};
    use serde_json::json;

    fn field(name: &str, kind: FieldKind) -> ImportField {
        ImportField {
            name: name.to_string(),
            label: name.to_string(),
            kind,
            reference: None,
        }
    }

    fn import(fields: Vec<ImportField>) -> ImportConfig {
        ImportConfig {
            name: "users".to_string(),
            record_type: "user".to_string(),
            fields,
            identifier: "_id".to_string(),
            duplicate_identifier: DuplicatePolicy::UseFirst,
            limit: ImportLimit::default(),
            datetime_policy: DatetimePolicy::Error,
        }
    }

    fn schema() -> Schema {
        Schema::new()
            .with_record_type("user", [("name", "string"), ("avatar", "asset"), ("team", "ref(team)")])
            .with_record_type("team", [("code", "string")])
    }

    fn service(store: Arc<MemoryRecordStore>, assets: MemoryAssetRegistry) -> ImportService {
        ImportService::new(store, Arc::new(assets))
    }

    #[test]
    fn test_request_defaults() {
        let request = ImportRequest::new("users");
        assert!(!request.atomic);
        assert!(request.with_atomic(true).atomic);
    }

    #[test]
    fn test_primary_id_is_qualified() {
        let store = Arc::new(MemoryRecordStore::new(schema()));
        let service = service(Arc::clone(&store), MemoryAssetRegistry::new());
        let rows = [ImportRow::new(0).with_cell("_id", "u1").with_cell("name", "Ada")];
        let import = import(vec![field("_id", FieldKind::String), field("name", FieldKind::String)]);

        let report = service.import_rows(&import, &rows, false).unwrap();

        assert_eq!(report.success_count, 1);
        let saved = store.get(&RecordId::new("user", "u1")).unwrap();
        assert_eq!(saved.fields.get("name"), Some(&json!("Ada")));
        assert!(saved.fields.get("_id").is_none());
    }

    #[test]
    fn test_reference_resolved_by_target_field() {
        let store = Arc::new(
            MemoryRecordStore::new(schema())
                .with_records([Record::new(RecordId::new("team", "t1")).with_field("code", json!("ENG"))]),
        );
        let service = service(Arc::clone(&store), MemoryAssetRegistry::new());
        let mut team = field("team", FieldKind::Reference);
        team.reference = Some(ImportReference {
            target_record_type: "team".to_string(),
            target_field: "code".to_string(),
            target_kind: FieldKind::String,
            duplicates: DuplicatePolicy::UseFirst,
        });
        let import = import(vec![team]);
        let rows = [
            ImportRow::new(0).with_cell("team", "ENG"),
            ImportRow::new(1).with_cell("team", "OPS"),
            ImportRow::new(2).with_cell("team", ""),
        ];

        let report = service.import_rows(&import, &rows, false).unwrap();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.error_count, 1);
        assert!(report.result[1].is_error());
        assert_eq!(store.query_count("team"), 1);
        match &report.result[0] {
            ImportResultItem::Record { fields, .. } => {
                assert_eq!(fields.get("team"), Some(&json!({"$type": "ref", "$id": "team/t1"})));
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_asset_prefers_staged_file() {
        let store = Arc::new(MemoryRecordStore::new(schema()));
        let assets = MemoryAssetRegistry::new()
            .with_staged_file(
                "photo.png",
                StoredAsset {
                    name: "abc-photo.png".to_string(),
                    content_type: "image/png".to_string(),
                    size: 10,
                },
            )
            .with_asset(StoredAsset {
                name: "logo.png".to_string(),
                content_type: "image/png".to_string(),
                size: 5,
            });
        let service = service(Arc::clone(&store), assets);
        let import = import(vec![field("avatar", FieldKind::Asset)]);
        let rows = [
            ImportRow::new(0).with_cell("avatar", "photo.png"),
            ImportRow::new(1).with_cell("avatar", "logo.png"),
            ImportRow::new(2).with_cell("avatar", "missing.png"),
        ];

        let report = service.import_rows(&import, &rows, false).unwrap();

        assert_eq!(report.success_count, 2);
        let avatars: Vec<Option<&Value>> = report
            .result
            .iter()
            .map(|item| match item {
                ImportResultItem::Record { fields, .. } => fields.get("avatar"),
                ImportResultItem::Error { .. } => None,
            })
            .collect();
        assert_eq!(avatars[0], Some(&json!({"$type": "asset", "$name": "abc-photo.png"})));
        assert_eq!(avatars[1], Some(&json!({"$type": "asset", "$name": "logo.png"})));
        assert!(matches!(
            &report.result[2],
            ImportResultItem::Error { name, .. } if name == "AssetNotFound"
        ));
    }

    #[test]
    fn test_invalid_value_fails_row() {
        let store = Arc::new(MemoryRecordStore::new(
            Schema::new().with_record_type("user", [("age", "integer")]),
        ));
        let service = service(Arc::clone(&store), MemoryAssetRegistry::new());
        let import = import(vec![field("age", FieldKind::Integer)]);
        let rows = [ImportRow::new(0).with_cell("age", "old")];

        let report = service.import_rows(&import, &rows, false).unwrap();

        assert_eq!(report.error_count, 1);
        assert_eq!(store.save_calls(), 0);
    }

    #[test]
    fn test_atomic_failure_persists_nothing() {
        let store = Arc::new(MemoryRecordStore::new(
            Schema::new().with_record_type("user", [("age", "integer")]),
        ));
        let service = service(Arc::clone(&store), MemoryAssetRegistry::new());
        let import = import(vec![field("age", FieldKind::Integer)]);
        let rows = [
            ImportRow::new(0).with_cell("age", "1"),
            ImportRow::new(1).with_cell("age", "x"),
        ];

        let result = service.import_rows(&import, &rows, true);

        assert!(matches!(result, Err(Error::RowFailed { row: 1, .. })));
        assert_eq!(store.save_calls(), 0);
        assert!(store.records_of("user").is_empty());
    }

    #[test]
    fn test_equivalent_lookup_spellings_queried_once() {
        let rows = [
            ImportRow::new(0).with_cell("score", "1"),
            ImportRow::new(1).with_cell("score", "1.0"),
            ImportRow::new(2).with_cell("score", " 1"),
            ImportRow::new(3).with_cell("score", "2"),
            ImportRow::new(4).with_cell("score", ""),
        ];

        let values = distinct_query_values(FieldKind::Number, &rows, &["score"]);

        assert_eq!(values, vec![json!(1.0), json!(2.0)]);
    }

    #[test]
    fn test_many_distinct_lookup_values() {
        let rows: Vec<ImportRow> = (0..20_000)
            .map(|i| {
                ImportRow::new(i).with_cell("email", format!("user{}@example.com", i % 10_000))
            })
            .collect();

        let values = distinct_query_values(FieldKind::String, &rows, &["email"]);

        assert_eq!(values.len(), 10_000);
        assert_eq!(values[0], json!("user0@example.com"));
    }
}
