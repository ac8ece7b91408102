//! Schema CLI command.

use super::{CliContext, write_line};
use crate::{Error, Result};
use std::io::Write;

/// Schema command handler.
pub struct SchemaCommand;

impl SchemaCommand {
    /// Fetches the backend schema and prints it as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be fetched or written.
    pub fn run(ctx: &CliContext, out: &mut dyn Write) -> Result<()> {
        let schema = ctx.store.fetch_schema()?;
        let yaml =
            serde_yaml_ng::to_string(&schema).map_err(|e| Error::operation("serialize_schema", e))?;
        write_line(out, yaml.trim_end())
    }
}
