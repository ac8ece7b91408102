//! Related-record resolution for export.

use crate::cms_config::{ExportConfig, ReferenceKind};
use crate::models::{FetchedRecord, FieldValue, Predicate, Record};
use crate::storage::{RecordQuery, RecordStore};
use crate::Result;
use std::collections::BTreeMap;
use tracing::instrument;

/// Records reachable from one reference column.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// A direct reference, absent when unset or dangling.
    One(Option<Record>),
    /// Back-reference or association targets, in fetch order.
    Many(Vec<Record>),
}

impl Related {
    /// Number of related records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns whether there are no related records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the related records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        match self {
            Self::One(record) => record.as_slice(),
            Self::Many(records) => records,
        }
    }
}

/// A base record plus the records behind each of its reference columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    /// The exported record.
    pub base: Record,
    /// Related records keyed by reference field name.
    pub related: BTreeMap<String, Related>,
}

impl ResolvedRecord {
    /// Returns the related records of a reference column.
    #[must_use]
    pub fn related(&self, field: &str) -> Option<&Related> {
        self.related.get(field)
    }
}

/// Attaches related records to a fetched base record.
///
/// Direct references come from the query's include list; back-reference and
/// association columns each cost one query per base record.
///
/// # Errors
///
/// Returns an error if a backend query fails.
#[instrument(skip_all, fields(record_id = %fetched.record.id))]
pub fn resolve(
    store: &dyn RecordStore,
    export: &ExportConfig,
    fetched: FetchedRecord,
) -> Result<ResolvedRecord> {
    let FetchedRecord { record, included } = fetched;
    let self_ref = FieldValue::Reference(record.id.clone()).to_wire();
    let mut related = BTreeMap::new();

    for name in export.direct_reference_fields() {
        let record = included.get(&name).cloned();
        related.insert(name, Related::One(record));
    }

    for field in export.many_reference_fields() {
        let Some(reference) = &field.reference else {
            continue;
        };
        let records = match &reference.kind {
            ReferenceKind::Direct => continue,
            ReferenceKind::BackReference { source_field } => {
                let query = RecordQuery::new(&reference.target_record_type)
                    .with_predicate(Predicate::eq(source_field.as_str(), self_ref.clone()));
                store
                    .query(&query)?
                    .into_iter()
                    .map(|fetched| fetched.record)
                    .collect()
            },
            ReferenceKind::Association {
                record_type,
                self_field,
                other_field,
            } => {
                let query = RecordQuery::new(record_type)
                    .with_predicate(Predicate::eq(self_field.as_str(), self_ref.clone()))
                    .with_includes(vec![other_field.clone()]);
                store
                    .query(&query)?
                    .into_iter()
                    .filter_map(|mut link| link.included.remove(other_field))
                    .collect()
            },
        };
        related.insert(field.name.clone(), Related::Many(records));
    }

    Ok(ResolvedRecord {
        base: record,
        related,
    })
}
