//! Import report returned to callers.

use super::RowError;
use crate::models::Record;
use serde::Serialize;
use serde_json::{Map, Value};

/// One entry of the import result list, at its input row position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename_all = "snake_case")]
pub enum ImportResultItem {
    /// The row was saved.
    Record {
        /// Qualified record id.
        #[serde(rename = "_id")]
        id: String,
        /// Saved field values.
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    /// The row failed.
    Error {
        /// Stable error code.
        code: u32,
        /// Human-readable message.
        message: String,
        /// Stable error name.
        name: String,
        /// Record id, when one was assigned before the failure.
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ImportResultItem {
    /// Builds a success entry.
    #[must_use]
    pub fn saved(record: Record) -> Self {
        Self::Record {
            id: record.id.to_string(),
            fields: record.fields,
        }
    }

    /// Builds a failure entry.
    #[must_use]
    pub fn failed(error: &RowError, id: Option<String>) -> Self {
        Self::Error {
            code: error.code(),
            message: error.to_string(),
            name: error.name().to_string(),
            id,
        }
    }

    /// Returns whether the entry is a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Outcome of a non-atomic (or successful atomic) import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Rows saved.
    pub success_count: usize,
    /// Rows failed.
    pub error_count: usize,
    /// One entry per input row, in input order.
    pub result: Vec<ImportResultItem>,
}

impl ImportReport {
    /// Builds a report from entries in input order.
    #[must_use]
    pub fn from_items(result: Vec<ImportResultItem>) -> Self {
        let error_count = result.iter().filter(|item| item.is_error()).count();
        Self {
            success_count: result.len() - error_count,
            error_count,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;
    use serde_json::json;

    #[test]
    fn test_report_json_shape() {
        let saved = Record::new(RecordId::new("user", "1")).with_field("email", json!("a@x.io"));
        let error = RowError::ReferenceNotFound {
            field: "manager".to_string(),
            value: "bob".to_string(),
        };
        let report = ImportReport::from_items(vec![
            ImportResultItem::saved(saved),
            ImportResultItem::failed(&error, None),
        ]);

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "success_count": 1,
                "error_count": 1,
                "result": [
                    {"_type": "record", "_id": "user/1", "email": "a@x.io"},
                    {
                        "_type": "error",
                        "code": 110,
                        "message": "reference \"bob\" for field \"manager\" not found",
                        "name": "ReferenceNotFound"
                    }
                ]
            })
        );
    }
}
