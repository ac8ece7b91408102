//! Binary entry point for recordport.
//!
//! This binary provides the CLI interface for schema-driven CSV import and
//! export against a record backend.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use recordport::cli::{CliContext, ConfigCommand, ExportCommand, ImportCommand, SchemaCommand};
use recordport::config::RecordportConfig;
use recordport::observability;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Recordport - schema-driven CSV import and export for record backends.
#[derive(Parser)]
#[command(name = "recordport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "RECORDPORT_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Export records as CSV.
    Export {
        /// Export job name.
        name: String,

        /// Predicate JSON, e.g. '["eq", {"$type": "keypath", "$val": "active"}, true]'.
        #[arg(short, long)]
        predicate: Option<String>,

        /// Output file (default: <name>.csv, `-` for stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import records from a CSV file.
    Import {
        /// Import job name.
        name: String,

        /// CSV file to import.
        file: PathBuf,

        /// Save nothing unless every row succeeds.
        #[arg(long)]
        atomic: bool,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the backend schema.
    Schema,
}

/// Config subcommands.
#[derive(Subcommand)]
enum ConfigAction {
    /// Load and bind the configuration document against the live schema.
    Validate,
    /// Show the effective process configuration.
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RecordportConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(config.logging.to_logging_config(cli.verbose)) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, name = e.name(), "Command failed");
            eprintln!("{}: {e}", e.name());
            ExitCode::FAILURE
        },
    }
}

fn run(command: Commands, config: &RecordportConfig) -> recordport::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Config {
            action: ConfigAction::Show,
        } => ConfigCommand::show(config, &mut out),
        Commands::Config {
            action: ConfigAction::Validate,
        } => ConfigCommand::validate(&CliContext::from_config(config)?, &mut out),
        Commands::Schema => SchemaCommand::run(&CliContext::from_config(config)?, &mut out),
        Commands::Export {
            name,
            predicate,
            output,
        } => {
            let command = ExportCommand {
                name,
                predicate,
                output,
            };
            command
                .run(&CliContext::from_config(config)?, &mut out)
                .map(|_| ())
        },
        Commands::Import { name, file, atomic } => {
            let command = ImportCommand { name, file, atomic };
            command
                .run(&CliContext::from_config(config)?, &mut out)
                .map(|_| ())
        },
    }?;

    out.flush()
        .map_err(|e| recordport::Error::operation("write_output", e))
}
