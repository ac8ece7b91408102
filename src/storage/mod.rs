//! Backend abstraction.
//!
//! The backend owns records, schema and assets; this crate only talks to it
//! through two traits:
//! - [`RecordStore`]: schema fetch, filtered queries with includes, batch save
//! - [`AssetRegistry`]: staged-file and stored-asset lookups used on import
//!
//! [`HttpRecordStore`] speaks the backend's JSON action API;
//! [`MemoryRecordStore`] and [`MemoryAssetRegistry`] back tests and offline use.

mod http;
mod memory;
mod traits;

pub(crate) use http::build_http_client;
pub use http::HttpRecordStore;
pub use memory::{MemoryAssetRegistry, MemoryRecordStore};
pub use traits::{
    AssetRegistry, BackendError, RecordQuery, RecordStore, SaveOutcome, StoredAsset,
};
