//! Config CLI command.

use super::{CliContext, write_line};
use crate::config::RecordportConfig;
use crate::Result;
use std::io::Write;

/// Config command handler.
pub struct ConfigCommand;

impl ConfigCommand {
    /// Loads and binds the configuration document, listing its jobs.
    ///
    /// # Errors
    ///
    /// Returns the load or bind error when the document is invalid.
    pub fn validate(ctx: &CliContext, out: &mut dyn Write) -> Result<()> {
        let config = ctx.config_store.reload()?;
        write_line(out, "Configuration OK")?;
        for export in config.exports() {
            write_line(
                out,
                &format!(
                    "  export {} ({}): {} columns",
                    export.name,
                    export.record_type,
                    export.fields.len()
                ),
            )?;
        }
        for import in config.imports() {
            write_line(
                out,
                &format!(
                    "  import {} ({}): {} fields, identifier {}",
                    import.name,
                    import.record_type,
                    import.fields.len(),
                    import.identifier
                ),
            )?;
        }
        Ok(())
    }

    /// Prints the effective process configuration with secrets redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn show(config: &RecordportConfig, out: &mut dyn Write) -> Result<()> {
        write_line(out, config.to_redacted_toml()?.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms_config::{ConfigSource, ConfigStore};
    use crate::schema::Schema;
    use crate::storage::{MemoryAssetRegistry, MemoryRecordStore};
    use crate::Error;
    use std::sync::Arc;

    fn context(document: &str) -> CliContext {
        let store = Arc::new(MemoryRecordStore::new(
            Schema::new().with_record_type("user", [("email", "string")]),
        ));
        let config_store = ConfigStore::new(ConfigSource::Inline(document.to_string()), store.clone());
        CliContext::new(store, Arc::new(MemoryAssetRegistry::new()), config_store)
    }

    #[test]
    fn test_validate_lists_jobs() {
        let ctx = context("exports:\n  users:\n    record_type: user\n    fields:\n      - name: email\n");
        let mut out = Vec::new();
        ConfigCommand::validate(&ctx, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("export users (user): 1 columns"));
    }

    #[test]
    fn test_validate_reports_unknown_field() {
        let ctx = context("exports:\n  users:\n    record_type: user\n    fields:\n      - name: phone\n");
        let result = ConfigCommand::validate(&ctx, &mut Vec::new());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_show_redacts() {
        let mut config = RecordportConfig::new();
        config.backend.api_key = Some(secrecy::SecretString::from("k".to_string()));
        let mut out = Vec::new();
        ConfigCommand::show(&config, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("***REDACTED***"));
    }
}
