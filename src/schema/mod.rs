//! Backend schema and configuration binding.
//!
//! The backend owns the schema; [`Schema`] is the fetched field catalogue.
//! [`bind`] validates a configuration document against it once per
//! (re)load and classifies every field as a scalar or one of the three
//! reference kinds.

mod binder;
mod catalogue;

pub use binder::bind;
pub use catalogue::{Schema, SchemaField};
