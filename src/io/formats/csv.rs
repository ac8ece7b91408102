//! CSV format adapter for import/export.
//!
//! Import columns are located by header: a field's label first, then its
//! name. Cells are taken verbatim; short rows yield empty cells.

use crate::cms_config::{ImportConfig, ImportLimit};
use crate::io::traits::{ExportSink, ImportRow, ImportSource};
use crate::{Error, Result};
use std::io::{Read, Write};

/// Maps configured field names to CSV column indices.
#[derive(Debug, Default)]
struct ColumnMap {
    columns: Vec<(String, usize)>,
}

impl ColumnMap {
    /// Creates a column map from CSV headers.
    fn from_headers(headers: &csv::StringRecord, import: &ImportConfig) -> Result<Self> {
        let position = |wanted: &str| headers.iter().position(|h| h.trim() == wanted);

        let columns = import
            .fields
            .iter()
            .map(|field| {
                position(&field.label)
                    .or_else(|| position(&field.name))
                    .map(|idx| (field.name.clone(), idx))
                    .ok_or_else(|| Error::ColumnNotFound {
                        column: field.label.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns })
    }

    fn project(&self, index: usize, record: &csv::StringRecord) -> ImportRow {
        let mut row = ImportRow::new(index);
        for (name, idx) in &self.columns {
            let raw = record.get(*idx).unwrap_or_default();
            row.cells.insert(name.clone(), raw.to_string());
        }
        row
    }
}

fn read_error(operation: &str, error: &csv::Error) -> Error {
    if error.is_io_error() {
        Error::operation(operation, error)
    } else {
        Error::InvalidInput(format!("unreadable CSV: {error}"))
    }
}

/// CSV import source.
///
/// Enforces the job's row and byte limits while reading.
pub struct CsvImportSource<R: Read> {
    /// CSV reader.
    reader: csv::Reader<R>,
    /// Column indices for each configured field.
    column_map: ColumnMap,
    limit: ImportLimit,
    rows_read: usize,
}

impl<R: Read> CsvImportSource<R> {
    /// Creates a CSV import source for an import job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if a configured field has no column,
    /// or an error if the header cannot be read.
    pub fn new(reader: R, import: &ImportConfig) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| read_error("read_csv_headers", &e))?
            .clone();
        let column_map = ColumnMap::from_headers(&headers, import)?;

        let source = Self {
            reader: csv_reader,
            column_map,
            limit: import.limit,
            rows_read: 0,
        };
        source.check_file_size()?;
        Ok(source)
    }

    fn check_file_size(&self) -> Result<()> {
        let consumed = self.reader.position().byte();
        match self.limit.file_size {
            Some(max) if consumed > max => Err(Error::LimitExceeded(format!(
                "file is larger than {max} bytes"
            ))),
            _ => Ok(()),
        }
    }
}

impl<R: Read> ImportSource for CsvImportSource<R> {
    fn next_row(&mut self) -> Result<Option<ImportRow>> {
        let mut record = csv::StringRecord::new();

        let has_record = self
            .reader
            .read_record(&mut record)
            .map_err(|e| read_error("read_csv", &e))?;
        self.check_file_size()?;
        if !has_record {
            return Ok(None);
        }

        if let Some(max) = self.limit.record_number {
            if self.rows_read >= max {
                return Err(Error::LimitExceeded(format!(
                    "file has more than {max} records"
                )));
            }
        }

        let row = self.column_map.project(self.rows_read, &record);
        self.rows_read += 1;
        Ok(Some(row))
    }
}

/// CSV export sink.
///
/// Writes the header and rows exactly as given; the caller owns the layout.
pub struct CsvExportSink<W: Write> {
    /// CSV writer.
    writer: csv::Writer<W>,
}

impl<W: Write> CsvExportSink<W> {
    /// Creates a new CSV export sink.
    #[must_use]
    pub fn new(writer: W) -> Self {
        let csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        Self { writer: csv_writer }
    }

    fn write(&mut self, cells: &[String]) -> Result<()> {
        self.writer
            .write_record(cells)
            .map_err(|e| Error::operation("write_csv", e))
    }
}

impl<W: Write> ExportSink for CsvExportSink<W> {
    fn write_header(&mut self, labels: &[String]) -> Result<()> {
        self.write(labels)
    }

    fn write_row(&mut self, cells: &[String]) -> Result<()> {
        self.write(cells)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_csv", e))
    }
}
