//! Backend wiring shared by commands.

use crate::cms_config::ConfigStore;
use crate::config::RecordportConfig;
use crate::storage::{AssetRegistry, HttpRecordStore, MemoryAssetRegistry, RecordStore};
use crate::{Error, Result};
use std::sync::Arc;

/// Backends and configuration snapshot store for one CLI invocation.
pub struct CliContext {
    /// Record backend.
    pub store: Arc<dyn RecordStore>,
    /// Staged file and asset lookups.
    pub assets: Arc<dyn AssetRegistry>,
    /// Bound configuration document.
    pub config_store: ConfigStore,
}

impl CliContext {
    /// Assembles a context from explicit parts.
    #[must_use]
    pub const fn new(
        store: Arc<dyn RecordStore>,
        assets: Arc<dyn AssetRegistry>,
        config_store: ConfigStore,
    ) -> Self {
        Self {
            store,
            assets,
            config_store,
        }
    }

    /// Builds the HTTP backend and asset registry described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the endpoint, API key or document
    /// source is missing, or the asset manifest cannot be loaded.
    pub fn from_config(config: &RecordportConfig) -> Result<Self> {
        let store = Self::record_store(config)?;
        let assets: Arc<dyn AssetRegistry> = match &config.cms.asset_manifest {
            Some(path) => Arc::new(MemoryAssetRegistry::from_manifest(path)?),
            None => Arc::new(MemoryAssetRegistry::new()),
        };
        let config_store = ConfigStore::new(config.cms_source()?, Arc::clone(&store))
            .with_cache_bust(config.cms.cache_bust);
        Ok(Self::new(store, assets, config_store))
    }

    fn record_store(config: &RecordportConfig) -> Result<Arc<dyn RecordStore>> {
        let backend = &config.backend;
        let endpoint = backend.endpoint.clone().ok_or_else(|| {
            Error::Configuration("no backend endpoint; set backend.endpoint".to_string())
        })?;
        let api_key = backend.api_key.clone().ok_or_else(|| {
            Error::Configuration("no backend API key; set backend.api_key".to_string())
        })?;
        tracing::debug!(%endpoint, database_id = %backend.database_id, "Using HTTP record store");
        Ok(Arc::new(
            HttpRecordStore::new(endpoint, api_key)?
                .with_database_id(backend.database_id.clone())
                .with_timeout(backend.timeout())?,
        ))
    }
}
