//! Column layout of an export.
//!
//! Rendering takes two passes: [`ExportLayout::walk`] sees every resolved
//! record to size the spread column groups, then [`ExportLayout::header`]
//! and [`ExportLayout::row`] emit rows of identical width.

use super::related::{Related, ResolvedRecord};
use crate::cms_config::{DisplayMode, ExportConfig, ExportField, ExportReference, TargetField};
use crate::codec::{self, SpreadListSerializer};
use crate::models::Record;

#[derive(Debug, Clone)]
enum Column<'a> {
    /// A plain field, one cell.
    Scalar(&'a ExportField),
    /// All related values joined into one cell.
    Grouped(&'a ExportField, &'a ExportReference),
    /// A direct reference, one cell per target field.
    DirectSpread(&'a ExportField, &'a ExportReference),
    /// Many related records, one cell per target field per record.
    ManySpread(&'a ExportField, &'a ExportReference, SpreadListSerializer),
}

/// Fixed column layout for one export run.
#[derive(Debug, Clone)]
pub struct ExportLayout<'a> {
    columns: Vec<Column<'a>>,
}

fn target_values(targets: &[TargetField], record: &Record) -> Vec<String> {
    targets
        .iter()
        .map(|t| codec::serialize_wire(t.kind, record.get(&t.name).as_ref(), &t.format))
        .collect()
}

fn labels(targets: &[TargetField]) -> Vec<&str> {
    targets.iter().map(|t| t.label.as_str()).collect()
}

impl<'a> ExportLayout<'a> {
    /// Sizes the layout over every record of the export.
    #[must_use]
    pub fn walk(export: &'a ExportConfig, records: &[ResolvedRecord]) -> Self {
        let columns = export
            .fields
            .iter()
            .map(|field| match &field.reference {
                None => Column::Scalar(field),
                Some(reference) => match (reference.display_mode, reference.is_many()) {
                    (DisplayMode::Grouped, _) => Column::Grouped(field, reference),
                    (DisplayMode::Spread, false) => Column::DirectSpread(field, reference),
                    (DisplayMode::Spread, true) => {
                        let mut spread = SpreadListSerializer::new(reference.target_fields.len());
                        for record in records {
                            spread.walk(record.related(&field.name).map_or(0, Related::len));
                        }
                        Column::ManySpread(field, reference, spread)
                    },
                },
            })
            .collect();
        Self { columns }
    }

    /// Total number of cells per row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns
            .iter()
            .map(|column| match column {
                Column::Scalar(_) | Column::Grouped(..) => 1,
                Column::DirectSpread(_, reference) => reference.target_fields.len(),
                Column::ManySpread(_, _, spread) => spread.width(),
            })
            .sum()
    }

    /// Header row.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.width());
        for column in &self.columns {
            match column {
                Column::Scalar(field) | Column::Grouped(field, _) => {
                    header.push(field.label.clone());
                },
                Column::DirectSpread(_, reference) => header.extend(
                    reference
                        .target_fields
                        .iter()
                        .map(|t| t.label.replace("{index}", "0")),
                ),
                Column::ManySpread(_, reference, spread) => {
                    header.extend(spread.header(&labels(&reference.target_fields)));
                },
            }
        }
        header
    }

    /// Data row for one record.
    #[must_use]
    pub fn row(&self, record: &ResolvedRecord) -> Vec<String> {
        let mut row = Vec::with_capacity(self.width());
        for column in &self.columns {
            match column {
                Column::Scalar(field) => row.push(codec::serialize_wire(
                    field.kind,
                    record.base.get(&field.name).as_ref(),
                    &field.format,
                )),
                Column::Grouped(field, reference) => {
                    row.push(grouped_cell(record.related(&field.name), reference));
                },
                Column::DirectSpread(field, reference) => {
                    match record.related(&field.name).and_then(|r| r.records().first()) {
                        Some(target) => row.extend(target_values(&reference.target_fields, target)),
                        None => row.extend(reference.target_fields.iter().map(|_| String::new())),
                    }
                },
                Column::ManySpread(field, reference, spread) => {
                    let values: Vec<Vec<String>> = record
                        .related(&field.name)
                        .map(Related::records)
                        .unwrap_or_default()
                        .iter()
                        .map(|r| target_values(&reference.target_fields, r))
                        .collect();
                    row.extend(spread.serialize(&values));
                },
            }
        }
        row
    }
}

fn grouped_cell(related: Option<&Related>, reference: &ExportReference) -> String {
    let Some(related) = related else {
        return String::new();
    };
    let values: Vec<String> = related
        .records()
        .iter()
        .flat_map(|r| target_values(&reference.target_fields, r))
        .collect();
    match (related, values.as_slice()) {
        (Related::One(_), [single]) => single.clone(),
        _ => codec::serialize_grouped(&values),
    }
}
