//! CLI command implementations.
//!
//! Each submodule implements one command. Commands write their output to a
//! caller-supplied writer so that the binary owns stdout.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `export` | Export records as CSV |
//! | `import` | Import a CSV file and print the JSON report |
//! | `config validate` | Load and bind the configuration document |
//! | `config show` | Print the effective process configuration |
//! | `schema` | Print the backend's field catalogue |
//!
//! # Example Usage
//!
//! ```bash
//! # Export the "users" job to users.csv
//! recordport export users --output users.csv
//!
//! # Import atomically
//! recordport import users users.csv --atomic
//!
//! # Check the configuration document against the live schema
//! recordport config validate
//! ```

mod config;
mod context;
mod export;
mod import;
mod schema;

pub use config::ConfigCommand;
pub use context::CliContext;
pub use export::ExportCommand;
pub use import::ImportCommand;
pub use schema::SchemaCommand;

use crate::{Error, Result};
use std::io::Write;

/// Writes a line, mapping I/O failures.
pub(crate) fn write_line(out: &mut dyn Write, line: &str) -> Result<()> {
    writeln!(out, "{line}").map_err(|e| Error::operation("write_output", e))
}
