//! Error and warning types for SQL generation.

use std::fmt;

use serde_json::{Value, json};
use thiserror::Error;

/// Validation errors raised while turning an inbound payload into SQL.
///
/// Every variant maps to a 400-class response at the HTTP layer, carrying the
/// [`help`](GenerationError::help) text and an [`example`](GenerationError::example) body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Record must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Record for table {table} has no columns besides tableName")]
    EmptyRecord { table: String },

    #[error("Input array is empty")]
    EmptyArray,

    #[error("Input array contains no valid records (expected JSON objects)")]
    NoValidRecords,

    #[error("Unsupported input: expected an object or an array, got {0}")]
    UnsupportedInput(&'static str),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Fields {first:?} and {second:?} both map to column {column}")]
    DuplicateColumn {
        column: String,
        first: String,
        second: String,
    },

    #[error("Invalid procedure name format: {0:?}")]
    InvalidProcedureName(String),

    #[error("Procedure entry {index} is missing procedureName")]
    MissingProcedureName { index: usize },

    #[error("Procedure list is empty")]
    EmptyProcedureList,

    #[error("Procedure parameters must be a JSON object, got {0}")]
    InvalidParameters(&'static str),
}

impl GenerationError {
    /// Short remediation hint returned to the caller next to the error.
    pub fn help(&self) -> &'static str {
        match self {
            Self::NotAnObject(_)
            | Self::EmptyRecord { .. }
            | Self::UnsupportedInput(_)
            | Self::InvalidIdentifier(_)
            | Self::DuplicateColumn { .. } => {
                "Send a JSON object with a tableName field and one key per column, \
                 or an array of such objects"
            }
            Self::EmptyArray | Self::NoValidRecords => {
                "Send a non-empty array of JSON objects, each with a tableName field"
            }
            Self::InvalidProcedureName(_) => {
                "procedureName must be 1 to 3 dot-separated identifiers \
                 (letters, digits, _, $, #), e.g. SCHEMA.PACKAGE.PROCEDURE"
            }
            Self::MissingProcedureName { .. } | Self::EmptyProcedureList => {
                "Every procedure entry needs a procedureName and an optional parameters object"
            }
            Self::InvalidParameters(_) => {
                "parameters must be an object mapping parameter names to values"
            }
        }
    }

    /// A valid request body illustrating the expected shape.
    pub fn example(&self) -> Value {
        match self {
            Self::InvalidProcedureName(_)
            | Self::MissingProcedureName { .. }
            | Self::EmptyProcedureList
            | Self::InvalidParameters(_) => json!({
                "procedureName": "HR.PKG_EMPLOYEES.HIRE",
                "parameters": { "p_name": "Juan", "p_salary": 1500 }
            }),
            Self::EmptyArray | Self::NoValidRecords => json!([
                { "tableName": "usuarios", "id": 1, "nombre": "Juan" },
                { "tableName": "usuarios", "id": 2, "nombre": "Ana" }
            ]),
            _ => json!({ "tableName": "usuarios", "id": 1, "nombre": "Juan" }),
        }
    }
}

/// Result alias for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Category of a non-fatal generation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Records in one batch carry different column sets.
    InconsistentColumns,
    /// A table or column name had characters stripped or was replaced.
    SanitizedIdentifier,
    /// A value looked like a date but is not a valid calendar date.
    DateParseFallback,
    /// An array element was not a JSON object and was ignored.
    SkippedRecord,
}

/// A recovered generation issue. Generation continues after one is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl GenerationWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Name of a JSON value's type, used in error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_errors_use_procedure_example() {
        let err = GenerationError::InvalidProcedureName("a..b".into());
        assert!(err.example().get("procedureName").is_some());
        assert!(err.help().contains("dot-separated"));
    }

    #[test]
    fn test_array_errors_use_array_example() {
        assert!(GenerationError::EmptyArray.example().is_array());
    }

    #[test]
    fn test_duplicate_column_display() {
        let err = GenerationError::DuplicateColumn {
            column: "firstname".into(),
            first: "first name".into(),
            second: "firstname".into(),
        };
        assert_eq!(
            err.to_string(),
            r#"Fields "first name" and "firstname" both map to column firstname"#
        );
        assert!(err.help().contains("tableName"));
    }

    #[test]
    fn test_error_display() {
        let err = GenerationError::MissingProcedureName { index: 2 };
        assert_eq!(
            err.to_string(),
            "Procedure entry 2 is missing procedureName"
        );
    }
}
