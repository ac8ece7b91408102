//! Snapshot store for the bound configuration.

use super::{CmsConfig, ConfigDocument};
use crate::schema;
use crate::storage::{RecordStore, build_http_client};
use crate::{Error, Result};
use arc_swap::ArcSwapOption;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::instrument;

/// Where the configuration document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Fetched over HTTP(S).
    Url(String),
    /// Read from a local file.
    Path(PathBuf),
    /// Held in memory.
    Inline(String),
}

impl ConfigSource {
    /// Interprets a string as a URL when it has an http(s) scheme, else a path.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::Url(source.to_string())
        } else {
            Self::Path(PathBuf::from(source))
        }
    }
}

/// Holds the current [`CmsConfig`] snapshot.
///
/// The snapshot is built lazily on first use and rebuilt on the first read
/// after [`ConfigStore::invalidate`]. Readers get an `Arc` to an immutable
/// snapshot, so a request that started before a reload keeps a consistent
/// view for its whole duration.
pub struct ConfigStore {
    source: ConfigSource,
    backend: Arc<dyn RecordStore>,
    cache_bust: bool,
    snapshot: ArcSwapOption<CmsConfig>,
    stale: AtomicBool,
}

impl ConfigStore {
    const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a store reading from `source` and binding against `backend`'s schema.
    #[must_use]
    pub fn new(source: ConfigSource, backend: Arc<dyn RecordStore>) -> Self {
        Self {
            source,
            backend,
            cache_bust: true,
            snapshot: ArcSwapOption::empty(),
            stale: AtomicBool::new(false),
        }
    }

    /// Enables or disables the random `rand` query parameter on URL fetches.
    #[must_use]
    pub const fn with_cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }

    /// Returns the configuration source.
    #[must_use]
    pub const fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Returns the current snapshot, building it if absent or invalidated.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched, parsed or bound.
    pub fn current(&self) -> Result<Arc<CmsConfig>> {
        let stale = self.stale.swap(false, Ordering::AcqRel);
        if !stale {
            if let Some(snapshot) = self.snapshot.load_full() {
                return Ok(snapshot);
            }
        }
        self.reload().inspect_err(|_| {
            if stale {
                self.stale.store(true, Ordering::Release);
            }
        })
    }

    /// Fetches the document and schema, binds them and swaps the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched, parsed or bound.
    /// The previous snapshot stays in place on failure.
    #[instrument(skip(self), fields(source = ?self.source))]
    pub fn reload(&self) -> Result<Arc<CmsConfig>> {
        let text = self.fetch_document()?;
        let document = ConfigDocument::from_yaml(&text)?;
        let schema = self.backend.fetch_schema()?;
        let config = Arc::new(schema::bind(&document, &schema)?);

        tracing::info!(
            exports = config.exports().count(),
            imports = config.imports().count(),
            "Configuration loaded"
        );
        self.snapshot.store(Some(Arc::clone(&config)));
        Ok(config)
    }

    /// Marks the snapshot stale, e.g. after a backend schema change.
    pub fn invalidate(&self) {
        tracing::debug!("Configuration invalidated");
        self.stale.store(true, Ordering::Release);
    }

    fn fetch_document(&self) -> Result<String> {
        match &self.source {
            ConfigSource::Inline(text) => Ok(text.clone()),
            ConfigSource::Path(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::Configuration(format!(
                    "failed to read configuration file {}: {e}",
                    path.display()
                ))
            }),
            ConfigSource::Url(url) => self.fetch_url(url),
        }
    }

    fn fetch_url(&self, url: &str) -> Result<String> {
        let mut request = build_http_client(Self::FETCH_TIMEOUT)?.get(url);
        if self.cache_bust {
            request = request.query(&[("rand", cache_bust_token())]);
        }

        let response = request.send().map_err(|e| {
            tracing::error!(error = %e, url, "Failed to fetch configuration document");
            Error::Configuration(format!("failed to fetch configuration document: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, url, "Configuration document request failed");
            return Err(Error::Configuration(format!(
                "failed to fetch configuration document: HTTP {status}"
            )));
        }

        response.text().map_err(|e| {
            Error::Configuration(format!("failed to read configuration document: {e}"))
        })
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("source", &self.source)
            .field("cache_bust", &self.cache_bust)
            .field("loaded", &self.snapshot.load().is_some())
            .finish_non_exhaustive()
    }
}

fn cache_bust_token() -> String {
    uuid::Uuid::new_v4().simple().to_string().chars().take(6).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::storage::MemoryRecordStore;

    const DOCUMENT: &str = r"
exports:
  users:
    record_type: user
    fields:
      - name: email
";

    fn store(document: &str) -> (ConfigStore, Arc<MemoryRecordStore>) {
        let backend = Arc::new(MemoryRecordStore::new(
            Schema::new().with_record_type("user", [("email", "string")]),
        ));
        let store = ConfigStore::new(ConfigSource::Inline(document.to_string()), backend.clone());
        (store, backend)
    }

    #[test]
    fn test_snapshot_cached_until_invalidated() {
        let (store, _) = store(DOCUMENT);
        let first = store.current().unwrap();
        let second = store.current().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        store.invalidate();
        let third = store.current().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(first.get_export("users").is_ok());
    }

    #[test]
    fn test_invalidate_rebinds_against_new_schema() {
        let (store, backend) = store(DOCUMENT);
        let before = store.current().unwrap();

        backend.set_schema(Schema::new().with_record_type("user", [("name", "string")]));
        store.invalidate();
        let err = store.current().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        // Old holders keep their snapshot; the store retries on the next read.
        assert!(before.get_export("users").is_ok());
        assert!(store.current().is_err());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let backend = Arc::new(MemoryRecordStore::new(Schema::new()));
        let store = ConfigStore::new(
            ConfigSource::Path(PathBuf::from("/nonexistent/recordport.yaml")),
            backend,
        );
        assert!(matches!(store.current(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            ConfigSource::parse("https://example.com/cms.yaml"),
            ConfigSource::Url("https://example.com/cms.yaml".to_string())
        );
        assert_eq!(
            ConfigSource::parse("cms.yaml"),
            ConfigSource::Path(PathBuf::from("cms.yaml"))
        );
    }

    #[test]
    fn test_cache_bust_token_shape() {
        let token = cache_bust_token();
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unreachable_url_is_configuration_error() {
        let backend = Arc::new(MemoryRecordStore::new(Schema::new()));
        let source = ConfigSource::Url("http://127.0.0.1:9/cms.yaml".to_string());
        let store = ConfigStore::new(source, backend).with_cache_bust(false);

        assert!(matches!(store.current(), Err(Error::Configuration(_))));
        assert!(matches!(store.current(), Err(Error::Configuration(_))));
    }
}
