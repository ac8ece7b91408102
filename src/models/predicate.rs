//! Query predicates in the backend's list-based wire format.
//!
//! A predicate is encoded as a JSON array whose first element is the operator:
//!
//! ```text
//! ["eq", {"$type": "keypath", "$val": "email"}, "a@example.com"]
//! ["or", <predicate>, <predicate>, ...]
//! ["not", <predicate>]
//! ```

use crate::{Error, Result};
use serde_json::{Value, json};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Less than or equal.
    Lte,
    /// Greater than or equal.
    Gte,
    /// SQL-style pattern match (`%` and `_` wildcards).
    Like,
    /// Membership in a list.
    In,
}

impl CompareOp {
    /// Returns the wire operator name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Lte => "lte",
            Self::Gte => "gte",
            Self::Like => "like",
            Self::In => "in",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "lt" => Some(Self::Lt),
            "gt" => Some(Self::Gt),
            "lte" => Some(Self::Lte),
            "gte" => Some(Self::Gte),
            "like" => Some(Self::Like),
            "in" => Some(Self::In),
            _ => None,
        }
    }
}

/// A query predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Compares a field (key path) with a value.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Field name.
        key: String,
        /// Wire value to compare with.
        value: Value,
    },
    /// All sub-predicates hold.
    And(Vec<Predicate>),
    /// Any sub-predicate holds.
    Or(Vec<Predicate>),
    /// The sub-predicate does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Builds an equality predicate.
    #[must_use]
    pub fn eq(key: impl Into<String>, value: Value) -> Self {
        Self::Compare {
            op: CompareOp::Eq,
            key: key.into(),
            value,
        }
    }

    /// Builds an OR of equality predicates, one per value.
    ///
    /// This is how batched "value IN (...)" lookups are expressed.
    #[must_use]
    pub fn any_eq(key: &str, values: impl IntoIterator<Item = Value>) -> Self {
        Self::Or(values.into_iter().map(|v| Self::eq(key, v)).collect())
    }

    /// Parses a caller-supplied predicate from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string is not valid JSON or not a
    /// well-formed predicate.
    pub fn parse_json(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| Error::InvalidInput(format!("invalid predicate: {e}")))?;
        Self::from_wire(&value)
    }

    /// Decodes a predicate from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown operators or malformed operands.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| invalid("predicate must be an array"))?;
        let (op, operands) = items
            .split_first()
            .ok_or_else(|| invalid("predicate is empty"))?;
        let op = op
            .as_str()
            .ok_or_else(|| invalid("predicate operator must be a string"))?;

        match op {
            "and" | "or" => {
                let children = operands
                    .iter()
                    .map(Self::from_wire)
                    .collect::<Result<Vec<_>>>()?;
                Ok(if op == "and" {
                    Self::And(children)
                } else {
                    Self::Or(children)
                })
            },
            "not" => match operands {
                [inner] => Ok(Self::Not(Box::new(Self::from_wire(inner)?))),
                _ => Err(invalid("\"not\" takes exactly one operand")),
            },
            other => {
                let op = CompareOp::parse(other)
                    .ok_or_else(|| invalid(&format!("unknown operator \"{other}\"")))?;
                let [key, value] = operands else {
                    return Err(invalid(&format!("\"{other}\" takes two operands")));
                };
                let key = key
                    .as_object()
                    .filter(|o| o.get("$type").and_then(Value::as_str) == Some("keypath"))
                    .and_then(|o| o.get("$val"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("first operand must be a keypath"))?;
                Ok(Self::Compare {
                    op,
                    key: key.to_string(),
                    value: value.clone(),
                })
            },
        }
    }

    /// Encodes the predicate in its wire form.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Compare { op, key, value } => {
                json!([op.as_str(), {"$type": "keypath", "$val": key}, value])
            },
            Self::And(children) | Self::Or(children) => {
                let op = if matches!(self, Self::And(_)) {
                    "and"
                } else {
                    "or"
                };
                let mut items = vec![Value::String(op.to_string())];
                items.extend(children.iter().map(Self::to_wire));
                Value::Array(items)
            },
            Self::Not(inner) => json!(["not", inner.to_wire()]),
        }
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput(format!("invalid predicate: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_wire_format() {
        let p = Predicate::eq("email", json!("a@example.com"));
        assert_eq!(
            p.to_wire(),
            json!(["eq", {"$type": "keypath", "$val": "email"}, "a@example.com"])
        );
    }

    #[test]
    fn test_any_eq_builds_or() {
        let p = Predicate::any_eq("code", [json!("a"), json!("b")]);
        assert!(matches!(&p, Predicate::Or(children) if children.len() == 2));
    }

    #[test]
    fn test_parse_round_trip() {
        let raw = r#"["and", ["gt", {"$type": "keypath", "$val": "age"}, 18],
                     ["not", ["eq", {"$type": "keypath", "$val": "banned"}, true]]]"#;
        let p = Predicate::parse_json(raw).unwrap();
        assert_eq!(Predicate::from_wire(&p.to_wire()).unwrap(), p);
    }

    #[test]
    fn test_malformed_predicates_rejected() {
        assert!(Predicate::parse_json("{not json").is_err());
        assert!(Predicate::parse_json(r#"{"eq": 1}"#).is_err());
        assert!(Predicate::parse_json(r#"["between", {"$type": "keypath", "$val": "a"}, 1]"#).is_err());
        assert!(Predicate::parse_json(r#"["eq", "a", 1]"#).is_err());
        assert!(Predicate::parse_json(r#"["not"]"#).is_err());
    }
}
