//! Record export service.
//!
//! Queries the export's record type, resolves each record's references and
//! streams the CSV through an [`ExportSink`].

use super::layout::ExportLayout;
use super::related::{self, ResolvedRecord};
use crate::cms_config::CmsConfig;
use crate::io::formats::CsvExportSink;
use crate::io::traits::ExportSink;
use crate::models::Predicate;
use crate::storage::{RecordQuery, RecordStore};
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Content type of every export.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// An export run request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRequest {
    /// Export job name.
    pub name: String,
    /// Optional predicate as JSON text, in the backend's predicate form.
    pub predicate: Option<String>,
}

impl ExportRequest {
    /// Creates a request for an export job.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicate: None,
        }
    }

    /// Sets the predicate JSON.
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    fn parse_predicate(&self) -> Result<Option<Predicate>> {
        self.predicate.as_deref().map(Predicate::parse_json).transpose()
    }
}

/// Result of an export operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Number of data rows written.
    pub exported: usize,
    /// Suggested download name, `<export name>.csv`.
    pub file_name: String,
    /// Always [`CSV_CONTENT_TYPE`].
    pub content_type: &'static str,
    /// Output path (if file export).
    pub output_path: Option<String>,
}

impl ExportResult {
    /// Creates an empty result for an export job.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            exported: 0,
            file_name: format!("{name}.csv"),
            content_type: CSV_CONTENT_TYPE,
            output_path: None,
        }
    }

    /// Returns whether any records were exported.
    #[must_use]
    pub const fn has_exports(&self) -> bool {
        self.exported > 0
    }
}

/// Service for exporting records to CSV.
pub struct ExportService {
    /// Backend the records are read from.
    store: Arc<dyn RecordStore>,
}

impl ExportService {
    /// Creates a new export service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Exports records to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or export fails.
    pub fn export_to_file(
        &self,
        config: &CmsConfig,
        request: &ExportRequest,
        path: &Path,
    ) -> Result<ExportResult> {
        let file = std::fs::File::create(path).map_err(|e| Error::OperationFailed {
            operation: "create_export_file".to_string(),
            cause: e.to_string(),
        })?;
        let writer = std::io::BufWriter::new(file);

        let mut result = self.export_to_writer(config, request, writer)?;
        result.output_path = Some(path.display().to_string());
        Ok(result)
    }

    /// Exports records to a writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown export, [`Error::InvalidInput`]
    /// for a malformed predicate, or an error if a query or write fails.
    pub fn export_to_writer<W: Write>(
        &self,
        config: &CmsConfig,
        request: &ExportRequest,
        writer: W,
    ) -> Result<ExportResult> {
        let mut sink = CsvExportSink::new(writer);
        let result = self.export_to_sink(config, request, &mut sink)?;
        sink.finish()?;
        Ok(result)
    }

    /// Exports records to a sink.
    ///
    /// # Errors
    ///
    /// See [`Self::export_to_writer`].
    #[instrument(skip(self, config, sink), fields(export = %request.name))]
    pub fn export_to_sink(
        &self,
        config: &CmsConfig,
        request: &ExportRequest,
        sink: &mut dyn ExportSink,
    ) -> Result<ExportResult> {
        let start = Instant::now();
        let export = config.get_export(&request.name)?;

        let mut query =
            RecordQuery::new(&export.record_type).with_includes(export.direct_reference_fields());
        if let Some(predicate) = request.parse_predicate()? {
            query = query.with_predicate(predicate);
        }

        let records = self
            .store
            .query(&query)?
            .into_iter()
            .map(|fetched| related::resolve(self.store.as_ref(), &export, fetched))
            .collect::<Result<Vec<ResolvedRecord>>>()?;

        let layout = ExportLayout::walk(&export, &records);
        sink.write_header(&layout.header())?;

        let mut result = ExportResult::new(&export.name);
        for record in &records {
            sink.write_row(&layout.row(record))?;
            result.exported += 1;
        }

        metrics::counter!("recordport_export_rows_total", "export" => export.name.clone())
            .increment(result.exported as u64);
        metrics::histogram!("recordport_export_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            exported = result.exported,
            columns = layout.width(),
            "Export complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms_config::{ExportConfig, ExportField};
    use crate::codec::FieldFormat;
    use crate::models::{FieldKind, Record, RecordId};
    use crate::schema::Schema;
    use crate::storage::MemoryRecordStore;
    use serde_json::json;

    fn config() -> CmsConfig {
        let field = |name: &str, label: &str, kind| ExportField {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            format: FieldFormat::Default,
            reference: None,
        };
        CmsConfig::new(
            [ExportConfig {
                name: "users".to_string(),
                record_type: "user".to_string(),
                fields: vec![
                    field("_id", "ID", FieldKind::String),
                    field("name", "Name", FieldKind::String),
                    field("age", "Age", FieldKind::Integer),
                ],
            }],
            [],
        )
    }

    fn store() -> Arc<MemoryRecordStore> {
        let schema = Schema::new().with_record_type("user", [("name", "string"), ("age", "integer")]);
        Arc::new(MemoryRecordStore::new(schema).with_records([
            Record::new(RecordId::new("user", "1"))
                .with_field("name", json!("Ada"))
                .with_field("age", json!(36)),
            Record::new(RecordId::new("user", "2")).with_field("name", json!("Bob")),
        ]))
    }

    #[test]
    fn test_export_result_defaults() {
        let result = ExportResult::new("users");
        assert_eq!(result.file_name, "users.csv");
        assert_eq!(result.content_type, "text/csv");
        assert!(!result.has_exports());
    }

    #[test]
    fn test_export_scalar_fields() {
        let service = ExportService::new(store());
        let mut out = Vec::new();
        let result = service
            .export_to_writer(&config(), &ExportRequest::new("users"), &mut out)
            .unwrap();

        assert_eq!(result.exported, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "ID,Name,Age\n1,Ada,36\n2,Bob,\n");
    }

    #[test]
    fn test_export_with_predicate() {
        let service = ExportService::new(store());
        let mut out = Vec::new();
        let request = ExportRequest::new("users").with_predicate(r#"["eq", {"$type": "keypath", "$val": "name"}, "Bob"]"#);
        let result = service.export_to_writer(&config(), &request, &mut out).unwrap();

        assert_eq!(result.exported, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "ID,Name,Age\n2,Bob,\n");
    }

    #[test]
    fn test_unknown_export() {
        let service = ExportService::new(store());
        let result = service.export_to_writer(&config(), &ExportRequest::new("nope"), Vec::new());
        assert!(matches!(result, Err(Error::NotFound { kind: "export", .. })));
    }

    #[test]
    fn test_malformed_predicate() {
        let service = ExportService::new(store());
        let request = ExportRequest::new("users").with_predicate("not json");
        let result = service.export_to_writer(&config(), &request, Vec::new());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
