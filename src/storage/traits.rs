//! Backend collaborator traits.

use crate::Result;
use crate::models::{FetchedRecord, Predicate, Record};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A record query: type, optional filter and eagerly included references.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    /// Record type to query.
    pub record_type: String,
    /// Filter; `None` matches every record.
    pub predicate: Option<Predicate>,
    /// Reference fields whose targets are returned alongside each record.
    pub includes: Vec<String>,
}

impl RecordQuery {
    /// Creates an unfiltered query.
    #[must_use]
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: None,
            includes: Vec::new(),
        }
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Sets the include list.
    #[must_use]
    pub fn with_includes(mut self, includes: Vec<String>) -> Self {
        self.includes = includes;
        self
    }
}

/// An error the backend reported for a single saved record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{name}: {message}")]
pub struct BackendError {
    /// Backend error code.
    pub code: u32,
    /// Backend error name.
    pub name: String,
    /// Human-readable message.
    pub message: String,
}

/// Per-record result of a batch save, in input order.
pub type SaveOutcome = std::result::Result<Record, BackendError>;

/// The remote record store.
///
/// Implementations must return save outcomes in input order. Transport
/// failures are returned as `Err` and never retried by callers.
pub trait RecordStore: Send + Sync {
    /// Fetches the field catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or answers with an error.
    fn fetch_schema(&self) -> Result<Schema>;

    /// Returns the records matching `query`, in backend order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or answers with an error.
    fn query(&self, query: &RecordQuery) -> Result<Vec<FetchedRecord>>;

    /// Saves records in one batch.
    ///
    /// With `atomic` set, either every record is saved or none is and an
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, or if an atomic batch
    /// was rejected.
    fn save(&self, records: &[Record], atomic: bool) -> Result<Vec<SaveOutcome>>;
}

/// A stored asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    /// Stored asset name, as referenced by asset fields.
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub content_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// Lookups used to resolve asset cells on import.
pub trait AssetRegistry: Send + Sync {
    /// Looks up a staged (previously uploaded for import) file by its file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be queried.
    fn find_staged_file(&self, name: &str) -> Result<Option<StoredAsset>>;

    /// Looks up a stored asset by its name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be queried.
    fn find_asset(&self, name: &str) -> Result<Option<StoredAsset>>;
}
