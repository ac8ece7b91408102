//! CSV import and export.
//!
//! # Architecture
//!
//! - **Format adapter**: [`CsvImportSource`] and [`CsvExportSink`] implement
//!   [`ImportSource`] and [`ExportSink`]
//! - **Services**: [`ExportService`] and [`ImportService`] drive the backend
//!   through [`RecordStore`](crate::storage::RecordStore)
//! - **Lookups**: [`RecordIdentifierMap`] holds the batched identifier and
//!   reference prefetch of one import run
//!
//! # Import Row Stages
//!
//! | Stage | Failure |
//! |-------|---------|
//! | Reference resolution | `ReferenceNotFound`, `DuplicateReference` |
//! | Asset resolution | `AssetNotFound` |
//! | Value decoding | `InvalidValue` |
//! | Id assignment | `DuplicateIdentifier` |
//! | Save | backend error |
//!
//! # Examples
//!
//! ## Export to CSV
//!
//! ```rust,ignore
//! use recordport::io::{ExportRequest, ExportService};
//!
//! let service = ExportService::new(store);
//! let file = std::fs::File::create("users.csv")?;
//! let result = service.export_to_writer(&config, &ExportRequest::new("users"), file)?;
//! println!("Exported {} records", result.exported);
//! ```
//!
//! ## Import from CSV
//!
//! ```rust,ignore
//! use recordport::io::{ImportRequest, ImportService};
//!
//! let service = ImportService::new(store, assets);
//! let file = std::fs::File::open("users.csv")?;
//! let report = service.import_from_reader(&config, &ImportRequest::new("users").with_atomic(true), file)?;
//! ```

pub mod formats;
pub mod identifier_map;
mod report;
mod row;
pub mod services;
pub mod traits;

pub use formats::{CsvExportSink, CsvImportSource};
pub use identifier_map::{Lookup, RecordIdentifierMap};
pub use report::{ImportReport, ImportResultItem};
pub use row::RowError;
pub use services::{
    CSV_CONTENT_TYPE, ExportLayout, ExportRequest, ExportResult, ExportService, ImportRequest,
    ImportService, Related, ResolvedRecord,
};
pub use traits::{ExportSink, ImportRow, ImportSource};
