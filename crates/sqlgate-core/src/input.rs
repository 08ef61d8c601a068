//! Classification of inbound payloads and the consolidated generation result.

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{GenerationError, GenerationWarning, Result, WarningKind, json_kind};
use crate::grouping::group_records;
use crate::identifier::{DEFAULT_TABLE, PROCEDURE_FIELD, TABLE_FIELD, clean_identifier};
use crate::procedure::ProcedureRequest;
use crate::statement::SqlGenerator;

/// Key of an object wrapping several call descriptors.
pub const PROCEDURES_FIELD: &str = "procedures";

/// Shape of the inbound body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    Object,
    Array,
    Procedure,
    MultipleProcedures,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::Procedure => "procedure",
            Self::MultipleProcedures => "multiple-procedures",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQL generated for one table of an array input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSql {
    pub table_name: String,
    pub record_count: usize,
    pub inserts: Vec<String>,
    pub batch_insert: String,
}

/// Summary of one call inside a multi-procedure block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureSummary {
    pub procedure_name: String,
    pub parameter_count: usize,
}

/// SQL generated for one inbound body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedSql {
    Object {
        table_name: String,
        insert: String,
    },
    Array {
        tables: Vec<TableSql>,
        total_records: usize,
    },
    Procedure {
        procedure_name: String,
        call: String,
    },
    MultipleProcedures {
        procedures: Vec<ProcedureSummary>,
        call: String,
    },
}

impl GeneratedSql {
    pub fn input_type(&self) -> InputType {
        match self {
            Self::Object { .. } => InputType::Object,
            Self::Array { .. } => InputType::Array,
            Self::Procedure { .. } => InputType::Procedure,
            Self::MultipleProcedures { .. } => InputType::MultipleProcedures,
        }
    }

    /// Executable statements: the insert, one `INSERT ALL` per table, or the call block.
    pub fn statements(&self) -> Vec<&str> {
        match self {
            Self::Object { insert, .. } => vec![insert.as_str()],
            Self::Array { tables, .. } => tables.iter().map(|t| t.batch_insert.as_str()).collect(),
            Self::Procedure { call, .. } | Self::MultipleProcedures { call, .. } => {
                vec![call.as_str()]
            }
        }
    }

    /// All statements joined by newlines.
    pub fn sql(&self) -> String {
        self.statements().join("\n")
    }

    /// Tables written by the statements, empty for procedure calls.
    pub fn table_names(&self) -> Vec<&str> {
        match self {
            Self::Object { table_name, .. } => vec![table_name.as_str()],
            Self::Array { tables, .. } => tables.iter().map(|t| t.table_name.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Procedures called, empty for inserts.
    pub fn procedure_names(&self) -> Vec<&str> {
        match self {
            Self::Procedure { procedure_name, .. } => vec![procedure_name.as_str()],
            Self::MultipleProcedures { procedures, .. } => {
                procedures.iter().map(|p| p.procedure_name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The success body returned to the caller.
    pub fn to_response(&self) -> Value {
        match self {
            Self::Object { table_name, insert } => json!({
                "success": true,
                "inputType": InputType::Object,
                "tableName": table_name,
                "insert": insert,
            }),
            Self::Array {
                tables,
                total_records,
            } => json!({
                "success": true,
                "inputType": InputType::Array,
                "tables": tables,
                "summary": {
                    "totalTables": tables.len(),
                    "totalRecords": total_records,
                },
            }),
            Self::Procedure {
                procedure_name,
                call,
            } => json!({
                "success": true,
                "inputType": InputType::Procedure,
                "procedureName": procedure_name,
                "call": call,
            }),
            Self::MultipleProcedures { procedures, call } => json!({
                "success": true,
                "inputType": InputType::MultipleProcedures,
                "procedures": procedures,
                "call": call,
            }),
        }
    }
}

/// Generated SQL plus the warnings recovered along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub sql: GeneratedSql,
    pub warnings: Vec<GenerationWarning>,
}

impl Generation {
    pub fn input_type(&self) -> InputType {
        self.sql.input_type()
    }
}

/// The 400 body for a failed generation.
pub fn error_response(error: &GenerationError) -> Value {
    json!({
        "success": false,
        "error": error.to_string(),
        "help": error.help(),
        "example": error.example(),
    })
}

impl SqlGenerator {
    /// Generates SQL for any supported inbound body.
    ///
    /// - object with `procedureName` → single call block
    /// - object with a `procedures` array → multi-call block
    /// - any other object → single insert
    /// - array whose first object has `procedureName` → multi-call block
    /// - any other array → grouped inserts
    pub fn generate(&self, payload: &Value) -> Result<Generation> {
        match payload {
            Value::Object(map) => {
                if map.contains_key(PROCEDURE_FIELD) {
                    self.generate_procedure(payload)
                } else if let Some(Value::Array(items)) = map.get(PROCEDURES_FIELD) {
                    self.generate_procedures(items)
                } else {
                    self.generate_object(payload)
                }
            }
            Value::Array(items) => {
                let first_object = items.iter().find(|v| v.is_object());
                if first_object.is_some_and(ProcedureRequest::is_descriptor) {
                    self.generate_procedures(items)
                } else {
                    self.generate_array(items)
                }
            }
            other => Err(GenerationError::UnsupportedInput(json_kind(other))),
        }
    }

    fn generate_object(&self, payload: &Value) -> Result<Generation> {
        let mut warnings = Vec::new();
        let declared = match payload.get(TABLE_FIELD) {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                warnings.push(GenerationWarning::new(
                    WarningKind::SanitizedIdentifier,
                    format!(
                        "non-string tableName ({}); using {DEFAULT_TABLE}",
                        json_kind(other)
                    ),
                ));
                DEFAULT_TABLE
            }
            None => DEFAULT_TABLE,
        };

        let cleaned = clean_identifier(declared.trim());
        let table_name = if cleaned.name.is_empty() {
            warnings.push(GenerationWarning::new(
                WarningKind::SanitizedIdentifier,
                format!("table name {declared:?} has no legal characters; using {DEFAULT_TABLE}"),
            ));
            DEFAULT_TABLE.to_string()
        } else {
            if cleaned.altered {
                warnings.push(GenerationWarning::new(
                    WarningKind::SanitizedIdentifier,
                    format!("table name {declared:?} sanitized to {}", cleaned.name),
                ));
            }
            cleaned.name
        };

        let statement = self.single_insert(payload, &table_name)?;
        warnings.extend(statement.warnings);

        Ok(Generation {
            sql: GeneratedSql::Object {
                table_name,
                insert: statement.sql,
            },
            warnings,
        })
    }

    fn generate_array(&self, items: &[Value]) -> Result<Generation> {
        let grouped = group_records(items)?;
        let total_records = grouped.total_records();
        let mut warnings = grouped.warnings;
        let mut tables = Vec::with_capacity(grouped.groups.len());

        for group in &grouped.groups {
            let mut inserts = Vec::with_capacity(group.records.len());
            for record in &group.records {
                inserts.push(self.insert_record(record, &group.table_name)?.sql);
            }
            // The batch repeats every per-record warning, so only its list is kept.
            let batch = self.batch_insert(&group.records, &group.table_name)?;
            warnings.extend(batch.warnings);
            tables.push(TableSql {
                table_name: group.table_name.clone(),
                record_count: group.records.len(),
                inserts,
                batch_insert: batch.sql,
            });
        }

        Ok(Generation {
            sql: GeneratedSql::Array {
                tables,
                total_records,
            },
            warnings,
        })
    }

    fn generate_procedure(&self, payload: &Value) -> Result<Generation> {
        let request = ProcedureRequest::from_value(payload);
        let name = request
            .procedure_name
            .as_deref()
            .ok_or(GenerationError::MissingProcedureName { index: 0 })?;
        let statement = self.procedure_call(name, &request.parameters)?;
        Ok(Generation {
            sql: GeneratedSql::Procedure {
                procedure_name: statement.target,
                call: statement.sql,
            },
            warnings: statement.warnings,
        })
    }

    fn generate_procedures(&self, items: &[Value]) -> Result<Generation> {
        let requests: Vec<ProcedureRequest> =
            items.iter().map(ProcedureRequest::from_value).collect();
        let (statement, calls) = self.multi_procedure_call(&requests)?;
        let procedures = calls
            .iter()
            .map(|c| ProcedureSummary {
                procedure_name: c.qualified_name.clone(),
                parameter_count: c.parameters.len(),
            })
            .collect();
        Ok(Generation {
            sql: GeneratedSql::MultipleProcedures {
                procedures,
                call: statement.sql,
            },
            warnings: statement.warnings,
        })
    }
}
