//! In-memory record store and asset registry.
//!
//! Non-persistent implementations of [`RecordStore`] and [`AssetRegistry`]
//! for tests and offline use. The record store keeps a log of every query so
//! callers can assert on round trips.

#![allow(clippy::significant_drop_tightening)]

use super::traits::{
    AssetRegistry, BackendError, RecordQuery, RecordStore, SaveOutcome, StoredAsset,
};
use crate::models::{CompareOp, FetchedRecord, Predicate, Record, RecordId};
use crate::schema::Schema;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

/// In-memory record store.
///
/// Uses `RwLock` for thread-safe access. Records are returned in insertion
/// order.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    schema: RwLock<Schema>,
    records: RwLock<Vec<Record>>,
    queries: RwLock<Vec<RecordQuery>>,
    save_calls: RwLock<usize>,
}

fn poisoned(operation: &str) -> Error {
    Error::operation(operation, "Lock poisoned")
}

impl MemoryRecordStore {
    /// Creates an empty store with the given schema.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: RwLock::new(schema),
            ..Self::default()
        }
    }

    /// Adds records, replacing any with the same id.
    #[must_use]
    pub fn with_records(self, records: impl IntoIterator<Item = Record>) -> Self {
        if let Ok(mut stored) = self.records.write() {
            for record in records {
                upsert(&mut stored, record);
            }
        }
        self
    }

    /// Replaces the schema.
    pub fn set_schema(&self, schema: Schema) {
        if let Ok(mut current) = self.schema.write() {
            *current = schema;
        }
    }

    /// Returns a stored record by id.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.iter().find(|r| &r.id == id).cloned())
    }

    /// Returns every stored record of a type, in insertion order.
    #[must_use]
    pub fn records_of(&self, record_type: &str) -> Vec<Record> {
        self.records
            .read()
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.record_type() == record_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns every query issued so far.
    #[must_use]
    pub fn query_log(&self) -> Vec<RecordQuery> {
        self.queries.read().map(|q| q.clone()).unwrap_or_default()
    }

    /// Returns the number of queries issued for a record type.
    #[must_use]
    pub fn query_count(&self, record_type: &str) -> usize {
        self.queries
            .read()
            .map(|q| q.iter().filter(|q| q.record_type == record_type).count())
            .unwrap_or(0)
    }

    /// Returns the number of save calls.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.save_calls.read().map(|c| *c).unwrap_or(0)
    }

    fn validate(schema: &Schema, record: &Record) -> std::result::Result<(), BackendError> {
        if schema.has_record_type(record.record_type()) {
            Ok(())
        } else {
            Err(BackendError {
                code: 110,
                name: "RecordTypeNotFound".to_string(),
                message: format!("record type \"{}\" does not exist", record.record_type()),
            })
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn fetch_schema(&self) -> Result<Schema> {
        self.schema
            .read()
            .map(|s| s.clone())
            .map_err(|_| poisoned("fetch_schema"))
    }

    fn query(&self, query: &RecordQuery) -> Result<Vec<FetchedRecord>> {
        self.queries
            .write()
            .map_err(|_| poisoned("record_query"))?
            .push(query.clone());

        let records = self.records.read().map_err(|_| poisoned("record_query"))?;
        let matched = records
            .iter()
            .filter(|r| r.record_type() == query.record_type)
            .filter(|r| query.predicate.as_ref().is_none_or(|p| evaluate(p, r)))
            .map(|record| {
                let included = query
                    .includes
                    .iter()
                    .filter_map(|name| {
                        let target = record
                            .get(name)
                            .and_then(|v| reference_id(&v).map(str::to_string))?;
                        let related = records.iter().find(|r| r.id.as_str() == target)?;
                        Some((name.clone(), related.clone()))
                    })
                    .collect::<BTreeMap<_, _>>();
                FetchedRecord {
                    record: record.clone(),
                    included,
                }
            })
            .collect();
        Ok(matched)
    }

    fn save(&self, records: &[Record], atomic: bool) -> Result<Vec<SaveOutcome>> {
        *self.save_calls.write().map_err(|_| poisoned("record_save"))? += 1;

        let schema = self.schema.read().map_err(|_| poisoned("record_save"))?;
        let outcomes: Vec<SaveOutcome> = records
            .iter()
            .map(|record| Self::validate(&schema, record).map(|()| record.clone()))
            .collect();

        if atomic {
            if let Some(Err(error)) = outcomes.iter().find(|o| o.is_err()) {
                return Err(Error::operation("record_save", error));
            }
        }

        let mut stored = self.records.write().map_err(|_| poisoned("record_save"))?;
        for record in outcomes.iter().filter_map(|o| o.as_ref().ok()) {
            upsert(&mut stored, record.clone());
        }
        Ok(outcomes)
    }
}

fn upsert(records: &mut Vec<Record>, record: Record) {
    if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
        for (key, value) in record.fields {
            existing.fields.insert(key, value);
        }
    } else {
        records.push(record);
    }
}

fn reference_id(value: &Value) -> Option<&str> {
    match value {
        Value::Object(object) => object.get("$id").and_then(Value::as_str),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Reduces `$type`-tagged values to their comparable scalar.
fn normalise(value: &Value) -> Value {
    let Value::Object(object) = value else {
        return value.clone();
    };
    let tagged = |key: &str| object.get(key).cloned().unwrap_or(Value::Null);
    match object.get("$type").and_then(Value::as_str) {
        Some("ref") => tagged("$id"),
        Some("date") => tagged("$date"),
        Some("asset") => tagged("$name"),
        _ => value.clone(),
    }
}

fn evaluate(predicate: &Predicate, record: &Record) -> bool {
    match predicate {
        Predicate::And(children) => children.iter().all(|p| evaluate(p, record)),
        Predicate::Or(children) => children.iter().any(|p| evaluate(p, record)),
        Predicate::Not(inner) => !evaluate(inner, record),
        Predicate::Compare { op, key, value } => {
            let actual = record.get(key).map_or(Value::Null, |v| normalise(&v));
            let expected = normalise(value);
            compare(*op, &actual, &expected)
        },
    }
}

fn compare(op: CompareOp, actual: &Value, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(actual, expected),
        CompareOp::Neq => !values_equal(actual, expected),
        CompareOp::Lt => order(actual, expected) == Some(Ordering::Less),
        CompareOp::Gt => order(actual, expected) == Some(Ordering::Greater),
        CompareOp::Lte => matches!(order(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gte => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Like => match (actual, expected) {
            (Value::String(s), Value::String(pattern)) => like(s, pattern),
            _ => false,
        },
        CompareOp::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|v| values_equal(actual, &normalise(v)))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL `LIKE` matching: `%` is any run, `_` is any single character.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            },
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            },
            _ => match backtrack {
                Some((bp, bt)) => {
                    p = bp + 1;
                    t = bt + 1;
                    backtrack = Some((bp, bt + 1));
                },
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

/// In-memory asset registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetRegistry {
    staged: BTreeMap<String, StoredAsset>,
    assets: BTreeMap<String, StoredAsset>,
}

#[derive(Debug, Deserialize)]
struct AssetManifest {
    #[serde(default)]
    staged_files: Vec<StagedFileEntry>,
    #[serde(default)]
    assets: Vec<StoredAsset>,
}

#[derive(Debug, Deserialize)]
struct StagedFileEntry {
    name: String,
    asset: StoredAsset,
}

impl MemoryAssetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a staged file under its upload name.
    #[must_use]
    pub fn with_staged_file(mut self, file_name: impl Into<String>, asset: StoredAsset) -> Self {
        self.staged.insert(file_name.into(), asset);
        self
    }

    /// Registers a stored asset.
    #[must_use]
    pub fn with_asset(mut self, asset: StoredAsset) -> Self {
        self.assets.insert(asset.name.clone(), asset);
        self
    }

    /// Loads a registry from a YAML manifest.
    ///
    /// ```yaml
    /// staged_files:
    ///   - name: photo.jpg
    ///     asset: {name: 2b1e-photo.jpg, content_type: image/jpeg, size: 5120}
    /// assets:
    ///   - {name: logo.png, content_type: image/png, size: 812}
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("failed to read asset manifest {}: {e}", path.display()))
        })?;
        let manifest: AssetManifest = serde_yaml_ng::from_str(&text).map_err(|e| {
            Error::InvalidInput(format!("invalid asset manifest {}: {e}", path.display()))
        })?;

        let registry = manifest
            .staged_files
            .into_iter()
            .fold(Self::new(), |r, entry| r.with_staged_file(entry.name, entry.asset));
        Ok(manifest.assets.into_iter().fold(registry, Self::with_asset))
    }
}

impl AssetRegistry for MemoryAssetRegistry {
    fn find_staged_file(&self, name: &str) -> Result<Option<StoredAsset>> {
        Ok(self.staged.get(name).cloned())
    }

    fn find_asset(&self, name: &str) -> Result<Option<StoredAsset>> {
        Ok(self.assets.get(name).cloned())
    }
}
