//! Import and export service implementations.
//!
//! Orchestrates CSV parsing, reference resolution and backend operations.

pub mod export;
pub mod import;
mod layout;
mod related;

pub use export::{CSV_CONTENT_TYPE, ExportRequest, ExportResult, ExportService};
pub use import::{ImportRequest, ImportService};
pub use layout::ExportLayout;
pub use related::{Related, ResolvedRecord};
