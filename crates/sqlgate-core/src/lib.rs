//! Oracle SQL generation from arbitrary JSON records.
//!
//! This crate turns inbound JSON payloads into Oracle-dialect SQL. It does no
//! I/O: every function here is a pure transformation of its inputs.
//!
//! # Components
//!
//! - [`ValueFormatter`] - renders a JSON value as a SQL literal (with date detection)
//! - [`ColumnType`] - infers an Oracle column type for DDL
//! - [`SqlGenerator`] - INSERT, INSERT ALL, CREATE TABLE and PL/SQL call blocks
//! - [`group_records`] - partitions record arrays by sanitized table name
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use sqlgate_core::SqlGenerator;
//!
//! let generator = SqlGenerator::new();
//! let generation = generator
//!     .generate(&json!({"tableName": "usuarios", "id": 1, "nombre": "Juan"}))
//!     .unwrap();
//! assert_eq!(
//!     generation.sql.statements(),
//!     vec!["INSERT INTO usuarios (id, nombre) VALUES (1, 'Juan');"]
//! );
//! ```

mod column;
mod error;
mod grouping;
pub mod identifier;
mod input;
mod procedure;
mod statement;
mod value;

pub use column::{ColumnType, LONG_STRING_THRESHOLD};
pub use error::{GenerationError, GenerationWarning, Result, WarningKind};
pub use grouping::{Grouped, TableGroup, group_records};
pub use input::{
    GeneratedSql, Generation, InputType, PROCEDURES_FIELD, ProcedureSummary, TableSql,
    error_response,
};
pub use procedure::{ProcedureCall, ProcedureRequest, parse_qualified_name};
pub use statement::{SqlGenerator, Statement};
pub use value::{DEFAULT_DATE_TOKENS, DateClass, ValueFormatter, quote};
