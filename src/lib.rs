//! # Recordport
//!
//! Schema-driven CSV import and export for remote record backends.
//!
//! Operators describe, per record type, which fields an export or import job
//! covers and how reference fields expand into CSV columns. The schema itself
//! lives in the backend and is fetched, never owned: configuration is bound
//! against the live field catalogue when it is (re)loaded.
//!
//! ## Features
//!
//! - Typed value codec shared by export and import
//! - Three reference shapes: direct, back-reference and association record
//! - Grouped (single cell) and spread (fixed-width columns) reference layouts
//! - Batched identifier resolution on import (one query per field, not per row)
//! - Atomic and non-atomic bulk imports with order-preserving row reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use recordport::io::{ImportRequest, ImportService};
//!
//! let service = ImportService::new(store, assets);
//! let config = config_store.current()?;
//! let report = service.import_from_reader(&config, &ImportRequest::new("users"), file)?;
//! println!("{} imported, {} failed", report.success_count, report.error_count);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod cms_config;
pub mod codec;
pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod schema;
pub mod storage;

pub use cms_config::{CmsConfig, ConfigSource, ConfigStore, ExportConfig, ImportConfig};
pub use config::RecordportConfig;
pub use io::{
    ExportRequest, ExportResult, ExportService, ImportReport, ImportRequest, ImportService,
    RowError,
};
pub use models::{FieldKind, FieldValue, Predicate, Record, RecordId};
pub use storage::{AssetRegistry, RecordStore};

/// Error type for recordport operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Status |
/// |---------|-------------|--------|
/// | `Configuration` | Config document invalid, field missing from schema | 500 |
/// | `UnsupportedFieldType` | Backend field type has no codec | 500 |
/// | `NotFound` | Unknown export or import name | 404 |
/// | `InvalidInput` | Malformed predicate, unreadable CSV | 400 |
/// | `ColumnNotFound` | Configured import column absent from the CSV header | 400 |
/// | `LimitExceeded` | Import row count or file size over the configured limit | 413 |
/// | `RowFailed` | A row failed during an atomic import | 400 |
/// | `OperationFailed` | Backend unreachable, non-2xx responses, I/O errors | 502 |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The configuration document could not be loaded or bound.
    ///
    /// Raised at configuration (re)load time, never per request.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A schema field has a type the codec cannot handle.
    #[error("field \"{record_type}.{field}\" has unsupported field type \"{type_name}\"")]
    UnsupportedFieldType {
        /// Record type owning the field.
        record_type: String,
        /// Field name.
        field: String,
        /// Backend type name.
        type_name: String,
    },

    /// No export or import is configured under the requested name.
    #[error("{kind} config \"{name}\" not found")]
    NotFound {
        /// Either `export` or `import`.
        kind: &'static str,
        /// Requested name.
        name: String,
    },

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A caller-supplied predicate is not valid JSON or not a known operator
    /// - The CSV stream cannot be decoded
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configured import field has no matching CSV column.
    #[error("column \"{column}\" not found in CSV header")]
    ColumnNotFound {
        /// The label (or name) that was looked up.
        column: String,
    },

    /// The uploaded file exceeds a configured limit.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// A row failed while importing atomically; nothing was persisted.
    #[error("row {row} failed: {error}")]
    RowFailed {
        /// Zero-based data row index.
        row: usize,
        /// The row failure.
        error: io::RowError,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - The backend is unreachable or answers with an error
    /// - Reading or writing a stream fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// HTTP-equivalent status code for the error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Configuration(_) | Self::UnsupportedFieldType { .. } => 500,
            Self::NotFound { .. } => 404,
            Self::InvalidInput(_) | Self::ColumnNotFound { .. } | Self::RowFailed { .. } => 400,
            Self::LimitExceeded(_) => 413,
            Self::OperationFailed { .. } => 502,
        }
    }

    /// Stable error name for reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::UnsupportedFieldType { .. } => "UnsupportedFieldType",
            Self::NotFound { .. } => "NotFound",
            Self::InvalidInput(_) => "InvalidInput",
            Self::ColumnNotFound { .. } => "ColumnNotFound",
            Self::LimitExceeded(_) => "LimitExceeded",
            Self::RowFailed { .. } => "RowFailed",
            Self::OperationFailed { .. } => "OperationFailed",
        }
    }

    /// Shorthand for an `OperationFailed` error.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for recordport operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad predicate".to_string());
        assert_eq!(err.to_string(), "invalid input: bad predicate");

        let err = Error::OperationFailed {
            operation: "record_query".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 'record_query' failed: connection refused"
        );

        let err = Error::NotFound {
            kind: "export",
            name: "users".to_string(),
        };
        assert_eq!(err.to_string(), "export config \"users\" not found");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::ColumnNotFound {
                column: "Email".to_string()
            }
            .status_code(),
            400
        );
        assert_eq!(Error::LimitExceeded("rows".to_string()).status_code(), 413);
        assert_eq!(Error::Configuration("x".to_string()).status_code(), 500);
        assert_eq!(Error::operation("save", "timeout").status_code(), 502);
    }

    #[test]
    fn test_row_failed_wraps_row_error() {
        let err = Error::RowFailed {
            row: 3,
            error: io::RowError::ReferenceNotFound {
                field: "manager".to_string(),
                value: "bob".to_string(),
            },
        };
        let display = err.to_string();
        assert!(display.starts_with("row 3 failed"));
        assert!(display.contains("bob"));
        assert_eq!(err.name(), "RowFailed");
    }
}
