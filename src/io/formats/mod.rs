//! Format adapters for import/export.
//!
//! CSV is the only wire format; the adapter implements both [`ImportSource`]
//! and [`ExportSink`].
//!
//! [`ImportSource`]: super::traits::ImportSource
//! [`ExportSink`]: super::traits::ExportSink

pub mod csv;

pub use self::csv::{CsvExportSink, CsvImportSource};
