//! Per-row import failures.

use crate::storage::BackendError;
use thiserror::Error;

/// Why a single import row failed.
///
/// Row errors never abort a non-atomic import; they are reported at the
/// row's position in the result list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// No target record has the referenced value.
    #[error("reference \"{value}\" for field \"{field}\" not found")]
    ReferenceNotFound {
        /// Reference column.
        field: String,
        /// Raw cell value.
        value: String,
    },

    /// Several target records have the referenced value.
    #[error("duplicate reference value \"{value}\" for field \"{field}\"")]
    DuplicateReference {
        /// Reference column.
        field: String,
        /// Raw cell value.
        value: String,
    },

    /// Several existing records have the row's identifier value.
    #[error("duplicate identifier value \"{value}\"")]
    DuplicateIdentifier {
        /// Raw identifier value.
        value: String,
    },

    /// Neither a staged file nor a stored asset has the name.
    #[error("asset \"{value}\" for field \"{field}\" not found")]
    AssetNotFound {
        /// Asset column.
        field: String,
        /// Raw cell value.
        value: String,
    },

    /// The cell cannot be decoded for the field's kind.
    #[error("invalid value for field \"{field}\": {message}")]
    InvalidValue {
        /// Column.
        field: String,
        /// Decoder message.
        message: String,
    },

    /// The backend rejected the record on save.
    #[error("{name}: {message}")]
    Backend {
        /// Backend error code.
        code: u32,
        /// Backend error name.
        name: String,
        /// Backend message.
        message: String,
    },
}

impl RowError {
    /// Stable numeric code.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::InvalidValue { .. } => 108,
            Self::DuplicateReference { .. } | Self::DuplicateIdentifier { .. } => 109,
            Self::ReferenceNotFound { .. } | Self::AssetNotFound { .. } => 110,
            Self::Backend { code, .. } => *code,
        }
    }

    /// Stable error name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ReferenceNotFound { .. } => "ReferenceNotFound",
            Self::DuplicateReference { .. } => "DuplicateReference",
            Self::DuplicateIdentifier { .. } => "DuplicateIdentifier",
            Self::AssetNotFound { .. } => "AssetNotFound",
            Self::InvalidValue { .. } => "InvalidValue",
            Self::Backend { name, .. } => name,
        }
    }
}

impl From<BackendError> for RowError {
    fn from(error: BackendError) -> Self {
        Self::Backend {
            code: error.code,
            name: error.name,
            message: error.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_names() {
        let err = RowError::DuplicateIdentifier {
            value: "a@example.com".to_string(),
        };
        assert_eq!(err.code(), 109);
        assert_eq!(err.name(), "DuplicateIdentifier");
        assert_eq!(err.to_string(), "duplicate identifier value \"a@example.com\"");
    }

    #[test]
    fn test_backend_error_keeps_code() {
        let err = RowError::from(BackendError {
            code: 107,
            name: "PermissionDenied".to_string(),
            message: "write not allowed".to_string(),
        });
        assert_eq!(err.code(), 107);
        assert_eq!(err.name(), "PermissionDenied");
    }
}
