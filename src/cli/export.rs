//! Export CLI command.

use super::{CliContext, write_line};
use crate::io::{ExportRequest, ExportResult, ExportService};
use crate::Result;
use std::io::Write;
use std::path::PathBuf;

/// Export command handler.
#[derive(Debug, Clone)]
pub struct ExportCommand {
    /// Export job name.
    pub name: String,
    /// Predicate JSON.
    pub predicate: Option<String>,
    /// Output file; `-` writes the CSV to the command output.
    pub output: Option<PathBuf>,
}

impl ExportCommand {
    /// Creates an export command writing to `<name>.csv`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicate: None,
            output: None,
        }
    }

    /// Runs the export.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the export fails.
    pub fn run(&self, ctx: &CliContext, out: &mut dyn Write) -> Result<ExportResult> {
        let config = ctx.config_store.current()?;
        let service = ExportService::new(ctx.store.clone());
        let mut request = ExportRequest::new(&self.name);
        if let Some(predicate) = &self.predicate {
            request = request.with_predicate(predicate);
        }

        let path = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.csv", self.name)));
        if path.as_os_str() == "-" {
            return service.export_to_writer(&config, &request, out);
        }

        let result = service.export_to_file(&config, &request, &path)?;
        write_line(
            out,
            &format!("Exported {} records to {}", result.exported, path.display()),
        )?;
        Ok(result)
    }
}
