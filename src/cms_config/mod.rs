//! Import/export job configuration.
//!
//! Jobs are declared in a YAML [`ConfigDocument`]:
//!
//! ```yaml
//! records:
//!   skill:
//!     record_type: skill
//! association_records:
//!   user_has_skill:
//!     fields:
//!       - name: user
//!         reference_target: user
//!       - name: skill
//!         reference_target: skill
//! exports:
//!   users:
//!     record_type: user
//!     fields:
//!       - name: email
//!         label: Email
//!       - name: skills
//!         reference_via_association_record: user_has_skill
//!         reference_target: skill
//!         reference_field_name: name
//! imports:
//!   users:
//!     record_type: user
//!     identifier: email
//!     handle_duplicated_identifier: throw_error
//!     fields:
//!       - name: email
//! ```
//!
//! The document is bound against the backend schema into an immutable
//! [`CmsConfig`] snapshot, held by a [`ConfigStore`].

mod document;
mod model;
mod store;

pub use document::{
    AssociationDocument, AssociationFieldDocument, ConfigDocument, ExportDocument,
    ExportFieldDocument, ImportDocument, ImportFieldDocument, LimitDocument, RecordAliasDocument,
    TargetFieldDocument, parse_file_size,
};
pub use model::{
    CmsConfig, DisplayMode, DuplicatePolicy, ExportConfig, ExportField, ExportReference,
    ImportConfig, ImportField, ImportLimit, ImportReference, ReferenceKind, TargetField,
};
pub use store::{ConfigSource, ConfigStore};
