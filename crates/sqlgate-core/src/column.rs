//! Oracle column types inferred from JSON values.

use std::fmt;

use serde_json::Value;

/// Strings longer than this many characters are stored as CLOB.
pub const LONG_STRING_THRESHOLD: usize = 100;

/// Column types emitted in generated DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Integers that fit in ten digits.
    Integer,
    /// Integers beyond ten digits.
    BigInteger,
    Decimal,
    /// Booleans stored as `'Y'`/`'N'`.
    Flag,
    /// Objects, arrays and long strings.
    Clob,
    Varchar,
}

impl ColumnType {
    /// Infers the column type for a sample value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i.unsigned_abs() < 10_000_000_000 {
                        Self::Integer
                    } else {
                        Self::BigInteger
                    }
                } else if n.is_u64() {
                    Self::BigInteger
                } else {
                    Self::Decimal
                }
            }
            Value::Bool(_) => Self::Flag,
            Value::Array(_) | Value::Object(_) => Self::Clob,
            Value::String(s) if s.chars().count() > LONG_STRING_THRESHOLD => Self::Clob,
            Value::String(_) | Value::Null => Self::Varchar,
        }
    }

    /// The Oracle type token used in `CREATE TABLE`.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "NUMBER(10)",
            Self::BigInteger => "NUMBER(19)",
            Self::Decimal => "NUMBER(15,4)",
            Self::Flag => "CHAR(1)",
            Self::Clob => "CLOB",
            Self::Varchar => "VARCHAR2(255)",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}
