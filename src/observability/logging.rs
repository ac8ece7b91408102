//! Structured logging settings.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter.
    pub filter: EnvFilter,
    /// Line format.
    pub format: LogFormat,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds a configuration from a filter directive.
    ///
    /// An unparseable directive falls back to `info`.
    #[must_use]
    pub fn new(directive: &str, format: LogFormat, file: Option<PathBuf>) -> Self {
        let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
        Self {
            filter,
            format,
            file,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info", LogFormat::Pretty, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("other"), LogFormat::Pretty);
    }

    #[test]
    fn test_directive_kept() {
        let config = LoggingConfig::new("recordport=debug", LogFormat::Json, None);
        assert_eq!(config.filter.to_string(), "recordport=debug");
        assert_eq!(config.format, LogFormat::Json);
    }
}
