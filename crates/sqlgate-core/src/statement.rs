//! Oracle statement generation: INSERT, INSERT ALL, CREATE TABLE and PL/SQL blocks.

use serde_json::{Map, Value};

use crate::column::ColumnType;
use crate::error::{GenerationError, GenerationWarning, Result, WarningKind, json_kind};
use crate::identifier::{TABLE_FIELD, clean_column, is_table_reference};
use crate::procedure::{ProcedureCall, ProcedureRequest};
use crate::value::ValueFormatter;

/// A generated SQL text and what it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    /// Table or procedure name(s) the statement writes to.
    pub target: String,
    pub warnings: Vec<GenerationWarning>,
}

/// Column of a record after the routing field is removed.
struct Column<'a> {
    name: String,
    key: &'a str,
    value: &'a Value,
}

/// Generates Oracle SQL from JSON records and call descriptors.
#[derive(Debug, Clone, Default)]
pub struct SqlGenerator {
    formatter: ValueFormatter,
}

impl SqlGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formatter(formatter: ValueFormatter) -> Self {
        Self { formatter }
    }

    /// `INSERT INTO <table> (<cols>) VALUES (<values>);`
    pub fn single_insert(&self, record: &Value, table: &str) -> Result<Statement> {
        let record = record
            .as_object()
            .ok_or_else(|| GenerationError::NotAnObject(json_kind(record)))?;
        self.insert_record(record, table)
    }

    /// [`single_insert`](Self::single_insert) for a record already known to be an object.
    pub fn insert_record(&self, record: &Map<String, Value>, table: &str) -> Result<Statement> {
        let mut warnings = Vec::new();
        let sql = format!(
            "{};",
            self.insert_clause("INSERT INTO", record, table, &mut warnings)?
        );
        Ok(Statement {
            sql,
            target: table.to_string(),
            warnings,
        })
    }

    /// `CREATE TABLE` with one column per field of the sample record.
    pub fn create_table(&self, sample: &Value, table: &str) -> Result<Statement> {
        let record = sample
            .as_object()
            .ok_or_else(|| GenerationError::NotAnObject(json_kind(sample)))?;
        check_table(table)?;
        let mut warnings = Vec::new();
        let columns = columns(record, table, &mut warnings)?;

        let definitions = columns
            .iter()
            .map(|c| {
                let column_type = ColumnType::infer(c.value);
                format!("  {} {column_type}", c.name.to_uppercase())
            })
            .collect::<Vec<_>>()
            .join(",\n");

        Ok(Statement {
            sql: format!("CREATE TABLE {table} (\n{definitions}\n);"),
            target: table.to_string(),
            warnings,
        })
    }

    /// `INSERT ALL` block with one `INTO` clause per record.
    ///
    /// Records whose column sets differ from the first one are still emitted
    /// with their own columns; a warning is recorded once.
    pub fn batch_insert(&self, records: &[&Map<String, Value>], table: &str) -> Result<Statement> {
        let Some(first) = records.first() else {
            return Err(GenerationError::EmptyArray);
        };
        let mut warnings = Vec::new();

        let reference = column_keys(first);
        if records.iter().skip(1).any(|r| column_keys(r) != reference) {
            warnings.push(GenerationWarning::new(
                WarningKind::InconsistentColumns,
                format!(
                    "records for {table} have inconsistent columns; each INTO clause uses its own"
                ),
            ));
        }

        let mut sql = String::from("INSERT ALL\n");
        for record in records {
            sql.push_str("  ");
            sql.push_str(&self.insert_clause("INTO", record, table, &mut warnings)?);
            sql.push('\n');
        }
        sql.push_str("SELECT * FROM dual;");

        Ok(Statement {
            sql,
            target: table.to_string(),
            warnings,
        })
    }

    /// Anonymous PL/SQL block calling one procedure.
    pub fn procedure_call(&self, name: &str, parameters: &Value) -> Result<Statement> {
        let mut warnings = Vec::new();
        let call = ProcedureCall::build(name, parameters, &self.formatter, &mut warnings)?;
        Ok(Statement {
            sql: format!("BEGIN\n  {}\nEND;", call.statement_line()),
            target: call.qualified_name,
            warnings,
        })
    }

    /// One block calling every procedure in order, then `COMMIT`.
    pub fn multi_procedure_call(
        &self,
        requests: &[ProcedureRequest],
    ) -> Result<(Statement, Vec<ProcedureCall>)> {
        if requests.is_empty() {
            return Err(GenerationError::EmptyProcedureList);
        }
        let mut warnings = Vec::new();
        let calls = requests
            .iter()
            .enumerate()
            .map(|(index, request)| {
                let name = request
                    .procedure_name
                    .as_deref()
                    .ok_or(GenerationError::MissingProcedureName { index })?;
                ProcedureCall::build(name, &request.parameters, &self.formatter, &mut warnings)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sql = String::from("BEGIN\n");
        for call in &calls {
            sql.push_str("  ");
            sql.push_str(&call.statement_line());
            sql.push('\n');
        }
        sql.push_str("  COMMIT;\nEND;");

        let target = calls
            .iter()
            .map(|c| c.qualified_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Ok((
            Statement {
                sql,
                target,
                warnings,
            },
            calls,
        ))
    }

    /// `<keyword> <table> (<cols>) VALUES (<values>)` without terminator.
    fn insert_clause(
        &self,
        keyword: &str,
        record: &Map<String, Value>,
        table: &str,
        warnings: &mut Vec<GenerationWarning>,
    ) -> Result<String> {
        check_table(table)?;
        let columns = columns(record, table, warnings)?;

        let names = columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let values = columns
            .iter()
            .map(|c| {
                let (literal, warning) = self.formatter.render(c.value, Some(c.key));
                warnings.extend(warning);
                literal
            })
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("{keyword} {table} ({names}) VALUES ({values})"))
    }
}

fn check_table(table: &str) -> Result<()> {
    if is_table_reference(table) {
        Ok(())
    } else {
        Err(GenerationError::InvalidIdentifier(table.to_string()))
    }
}

fn column_keys(record: &Map<String, Value>) -> Vec<&str> {
    let mut keys: Vec<&str> = record
        .keys()
        .map(String::as_str)
        .filter(|k| *k != TABLE_FIELD)
        .collect();
    keys.sort_unstable();
    keys
}

/// Record fields minus the routing field, with cleaned column names.
///
/// Unquoted Oracle identifiers are case-insensitive, so two fields whose
/// cleaned names differ only in case are a collision.
fn columns<'a>(
    record: &'a Map<String, Value>,
    table: &str,
    warnings: &mut Vec<GenerationWarning>,
) -> Result<Vec<Column<'a>>> {
    let mut out: Vec<Column<'a>> = Vec::with_capacity(record.len());
    for (key, value) in record {
        if key == TABLE_FIELD {
            continue;
        }
        let cleaned = clean_column(key);
        if cleaned.name.is_empty() {
            return Err(GenerationError::InvalidIdentifier(key.clone()));
        }
        if let Some(existing) = out.iter().find(|c| c.name.eq_ignore_ascii_case(&cleaned.name)) {
            return Err(GenerationError::DuplicateColumn {
                column: cleaned.name,
                first: existing.key.to_string(),
                second: key.clone(),
            });
        }
        if cleaned.altered {
            warnings.push(GenerationWarning::new(
                WarningKind::SanitizedIdentifier,
                format!("column {key:?} sanitized to {}", cleaned.name),
            ));
        }
        out.push(Column {
            name: cleaned.name,
            key,
            value,
        });
    }
    if out.is_empty() {
        return Err(GenerationError::EmptyRecord {
            table: table.to_string(),
        });
    }
    Ok(out)
}
