//! Data models for records, field kinds and query predicates.
//!
//! # Record Identifiers
//!
//! Backend record ids are qualified by their record type (`user/4f1c...`).
//! [`RecordId`] keeps the qualified form and exposes the bare key used in CSV
//! cells.
//!
//! # Field Values
//!
//! [`FieldKind`] is the closed set of field types the codec understands.
//! [`FieldValue`] is the typed value of one field, convertible to and from the
//! backend's `$type`-tagged JSON wire format.

mod field;
mod predicate;
mod record;

pub use field::{AssetRef, FieldKind, FieldValue, GeoPoint};
pub use predicate::{CompareOp, Predicate};
pub use record::{FetchedRecord, Record, RecordId, RESERVED_FIELDS};
