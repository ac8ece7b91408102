//! Process configuration.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, then `RECORDPORT_*` environment variables (a `.env` file is read
//! first when present).
//!
//! ```toml
//! [backend]
//! endpoint = "https://records.example.com/"
//! api_key = "master-key"
//! timeout_secs = 30
//! database_id = "_public"
//!
//! [cms]
//! source = "https://cdn.example.com/cms-config.yaml"
//! cache_bust = true
//! asset_manifest = "assets.yaml"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! file = "/var/log/recordport.log"
//! ```

use crate::cms_config::ConfigSource;
use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backend endpoint override.
pub const ENV_ENDPOINT: &str = "RECORDPORT_ENDPOINT";
/// Backend API key override.
pub const ENV_API_KEY: &str = "RECORDPORT_API_KEY";
/// Configuration document source override.
pub const ENV_CMS_CONFIG: &str = "RECORDPORT_CMS_CONFIG";
/// Log filter override.
pub const ENV_LOG: &str = "RECORDPORT_LOG";
/// Configuration file path.
pub const ENV_CONFIG_PATH: &str = "RECORDPORT_CONFIG_PATH";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DATABASE_ID: &str = "_public";

/// Main configuration for recordport.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordportConfig {
    /// Record backend connection.
    pub backend: BackendConfig,
    /// Configuration document location.
    pub cms: CmsSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Record backend connection settings.
#[derive(Debug, Clone, Serialize)]
pub struct BackendConfig {
    /// Base URL of the backend's action API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// API key sent with every request.
    #[serde(
        serialize_with = "secret_serde::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<SecretString>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Database queried and saved to.
    pub database_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            database_id: DEFAULT_DATABASE_ID.to_string(),
        }
    }
}

impl BackendConfig {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration document settings.
#[derive(Debug, Clone, Serialize)]
pub struct CmsSettings {
    /// URL or file path of the YAML configuration document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Append a random `rand` query parameter when fetching by URL.
    pub cache_bust: bool,
    /// YAML manifest of staged files and stored assets, for CLI imports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_manifest: Option<PathBuf>,
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            source: None,
            cache_bust: true,
            asset_manifest: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `recordport=debug`.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
    /// Append logs to this file instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingSettings {
    /// Builds the logging configuration, raising the level when verbose.
    #[must_use]
    pub fn to_logging_config(&self, verbose: bool) -> LoggingConfig {
        let level = if verbose { "debug" } else { self.level.as_str() };
        LoggingConfig::new(level, LogFormat::parse(&self.format), self.file.clone())
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Backend section.
    pub backend: Option<ConfigFileBackend>,
    /// Configuration document section.
    pub cms: Option<ConfigFileCms>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Backend section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileBackend {
    /// Endpoint URL.
    pub endpoint: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Database id.
    pub database_id: Option<String>,
}

/// CMS section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileCms {
    /// Document URL or path.
    pub source: Option<String>,
    /// Cache-busting flag.
    pub cache_bust: Option<bool>,
    /// Asset manifest path.
    pub asset_manifest: Option<String>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// Output format.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl RecordportConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration the way the binary does.
    ///
    /// Reads `.env`, then the file named by `explicit_path`, else by
    /// `RECORDPORT_CONFIG_PATH`, else the default location, then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();

        let env_path = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
        let mut config = match explicit_path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/recordport/` on macOS)
    /// 2. XDG config dir (`~/.config/recordport/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("recordport").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("recordport")
                .join("config.toml"),
        ];
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring config file"),
            }
        }

        Self::default()
    }

    /// Applies `RECORDPORT_*` overrides read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.backend.endpoint = Some(endpoint);
        }
        if let Some(api_key) = non_empty(ENV_API_KEY) {
            self.backend.api_key = Some(SecretString::from(api_key));
        }
        if let Some(source) = non_empty(ENV_CMS_CONFIG) {
            self.cms.source = Some(source);
        }
        if let Some(level) = non_empty(ENV_LOG) {
            self.logging.level = level;
        }
    }

    /// Returns where the configuration document is loaded from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no source is configured.
    pub fn cms_source(&self) -> Result<ConfigSource> {
        self.cms
            .source
            .as_deref()
            .map(ConfigSource::parse)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no configuration document source; set cms.source or {ENV_CMS_CONFIG}"
                ))
            })
    }

    /// Renders the effective configuration as TOML with secrets redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_redacted_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::operation("serialize_config", e))
    }

    /// Converts a `ConfigFile` to `RecordportConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(backend) = file.backend {
            config.backend.endpoint = backend.endpoint;
            config.backend.api_key = backend.api_key.map(SecretString::from);
            if let Some(timeout) = backend.timeout_secs {
                config.backend.timeout_secs = timeout;
            }
            if let Some(database_id) = backend.database_id {
                config.backend.database_id = database_id;
            }
        }
        if let Some(cms) = file.cms {
            config.cms.source = cms.source;
            if let Some(cache_bust) = cms.cache_bust {
                config.cms.cache_bust = cache_bust;
            }
            config.cms.asset_manifest = cms.asset_manifest.map(PathBuf::from);
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config
    }
}

/// Serde helper that never writes the secret itself.
mod secret_serde {
    use secrecy::SecretString;
    use serde::Serializer;

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match secret {
            Some(_) => serializer.serialize_str("***REDACTED***"),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RecordportConfig::new();
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.backend.database_id, "_public");
        assert!(config.cms.cache_bust);
        assert_eq!(config.logging.level, "info");
        assert!(config.cms_source().is_err());
    }

    #[test]
    fn test_load_from_file_merges_onto_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[backend]
endpoint = "https://records.example.com/"
api_key = "secret"

[cms]
source = "cms.yaml"
cache_bust = false
"#
        )
        .unwrap();

        let config = RecordportConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.backend.endpoint.as_deref(), Some("https://records.example.com/"));
        assert_eq!(
            config.backend.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("secret".to_string())
        );
        assert_eq!(config.backend.timeout_secs, 30);
        assert!(!config.cms.cache_bust);
        assert_eq!(config.cms_source().unwrap(), ConfigSource::Path(PathBuf::from("cms.yaml")));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = RecordportConfig::from_toml("[server]\nport = 1\n");
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_ENDPOINT, "https://env.example.com/"),
            (ENV_API_KEY, "env-key"),
            (ENV_CMS_CONFIG, "https://cdn.example.com/cms.yaml"),
            (ENV_LOG, ""),
        ]
        .into_iter()
        .collect();

        let mut config = RecordportConfig::new();
        config.apply_env_overrides(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.backend.endpoint.as_deref(), Some("https://env.example.com/"));
        assert_eq!(config.logging.level, "info");
        assert!(matches!(config.cms_source().unwrap(), ConfigSource::Url(_)));
    }

    #[test]
    fn test_redacted_toml_hides_api_key() {
        let mut config = RecordportConfig::new();
        config.backend.api_key = Some(SecretString::from("top-secret".to_string()));

        let rendered = config.to_redacted_toml().unwrap();

        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("***REDACTED***"));
    }
}
