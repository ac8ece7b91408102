//! Import CLI command.

use super::{CliContext, write_line};
use crate::io::{ImportReport, ImportRequest, ImportService};
use crate::{Error, Result};
use std::io::Write;
use std::path::PathBuf;

/// Import command handler.
#[derive(Debug, Clone)]
pub struct ImportCommand {
    /// Import job name.
    pub name: String,
    /// CSV file to read.
    pub file: PathBuf,
    /// All rows succeed or nothing is saved.
    pub atomic: bool,
}

impl ImportCommand {
    /// Creates a non-atomic import command.
    #[must_use]
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            atomic: false,
        }
    }

    /// Runs the import and writes the JSON report.
    ///
    /// # Errors
    ///
    /// Returns request-fatal import errors; per-row failures are part of the report.
    pub fn run(&self, ctx: &CliContext, out: &mut dyn Write) -> Result<ImportReport> {
        let config = ctx.config_store.current()?;
        let service = ImportService::new(ctx.store.clone(), ctx.assets.clone());
        let request = ImportRequest::new(&self.name).with_atomic(self.atomic);

        let report = service.import_from_file(&config, &request, &self.file)?;
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::operation("serialize_report", e))?;
        write_line(out, &json)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms_config::{ConfigSource, ConfigStore};
    use crate::schema::Schema;
    use crate::storage::{MemoryAssetRegistry, MemoryRecordStore};
    use std::sync::Arc;

    #[test]
    fn test_import_prints_report() {
        let store = Arc::new(MemoryRecordStore::new(
            Schema::new().with_record_type("user", [("email", "string")]),
        ));
        let document = "imports:\n  users:\n    record_type: user\n    fields:\n      - name: _id\n      - name: email\n";
        let config_store = ConfigStore::new(ConfigSource::Inline(document.to_string()), store.clone());
        let ctx = CliContext::new(store.clone(), Arc::new(MemoryAssetRegistry::new()), config_store);

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("users.csv");
        std::fs::write(&file, "_id,email\nu1,a@x.io\n").unwrap();

        let mut out = Vec::new();
        let report = ImportCommand::new("users", &file).run(&ctx, &mut out).unwrap();

        assert_eq!(report.success_count, 1);
        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["result"][0]["_id"], "user/u1");
        assert_eq!(store.records_of("user").len(), 1);
    }
}
