//! Core traits for import/export operations.
//!
//! Defines the [`ImportSource`] and [`ExportSink`] traits that format adapters
//! implement. The services only see projected rows and cell vectors, never
//! the file format.

use crate::Result;
use std::collections::BTreeMap;

/// One data row of an import file, projected onto the configured fields.
///
/// | Field | Meaning |
/// |-------|---------|
/// | `index` | Zero-based position among data rows |
/// | `cells` | Raw cell text keyed by field name |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    /// Zero-based data row index.
    pub index: usize,
    /// Raw cell text keyed by field name. Missing cells are empty strings.
    pub cells: BTreeMap<String, String>,
}

impl ImportRow {
    /// Creates an empty row.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            cells: BTreeMap::new(),
        }
    }

    /// Sets a cell.
    #[must_use]
    pub fn with_cell(mut self, field: impl Into<String>, raw: impl Into<String>) -> Self {
        self.cells.insert(field.into(), raw.into());
        self
    }

    /// Returns a cell's raw text, empty when absent.
    #[must_use]
    pub fn cell(&self, field: &str) -> &str {
        self.cells.get(field).map_or("", String::as_str)
    }
}

/// Source of import rows.
///
/// Implementations read rows incrementally and enforce the job's limits
/// while reading, so an oversized file fails before it is fully buffered.
pub trait ImportSource {
    /// Returns the next row, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is unreadable or a limit is exceeded.
    fn next_row(&mut self) -> Result<Option<ImportRow>>;

    /// Reads all remaining rows.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by [`Self::next_row`].
    fn read_all(&mut self) -> Result<Vec<ImportRow>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Destination for exported rows.
pub trait ExportSink {
    /// Writes the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_header(&mut self, labels: &[String]) -> Result<()>;

    /// Writes one data row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_row(&mut self, cells: &[String]) -> Result<()>;

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn finish(&mut self) -> Result<()>;
}
