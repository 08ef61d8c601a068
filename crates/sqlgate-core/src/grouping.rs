//! Partitioning of heterogeneous record arrays by target table.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{GenerationError, GenerationWarning, Result, WarningKind, json_kind};
use crate::identifier::{DEFAULT_TABLE, TABLE_FIELD, sanitize_table_name};

/// Records sharing one sanitized table name, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup<'a> {
    pub table_name: String,
    pub records: Vec<&'a Map<String, Value>>,
}

/// Output of [`group_records`].
#[derive(Debug, Clone, Default)]
pub struct Grouped<'a> {
    /// Groups in first-seen order.
    pub groups: Vec<TableGroup<'a>>,
    pub warnings: Vec<GenerationWarning>,
}

impl Grouped<'_> {
    pub fn total_records(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }
}

/// Groups records by their sanitized `tableName` (default `DATA_TABLE`).
///
/// Non-object elements are skipped with a warning. Fails when the input is
/// empty or holds no objects at all.
pub fn group_records(records: &[Value]) -> Result<Grouped<'_>> {
    if records.is_empty() {
        return Err(GenerationError::EmptyArray);
    }

    let mut by_table: IndexMap<String, Vec<&Map<String, Value>>> = IndexMap::new();
    let mut warnings = Vec::new();

    for (index, value) in records.iter().enumerate() {
        let Some(record) = value.as_object() else {
            warnings.push(GenerationWarning::new(
                WarningKind::SkippedRecord,
                format!(
                    "element {index} is {}, not an object; skipped",
                    json_kind(value)
                ),
            ));
            continue;
        };

        let declared = match record.get(TABLE_FIELD) {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                warnings.push(GenerationWarning::new(
                    WarningKind::SanitizedIdentifier,
                    format!(
                        "element {index} has a non-string tableName ({}); using {DEFAULT_TABLE}",
                        json_kind(other)
                    ),
                ));
                DEFAULT_TABLE
            }
            None => DEFAULT_TABLE,
        };

        let sanitized = sanitize_table_name(declared);
        if sanitized.altered {
            warnings.push(GenerationWarning::new(
                WarningKind::SanitizedIdentifier,
                format!("table name {declared:?} sanitized to {}", sanitized.name),
            ));
        }
        by_table.entry(sanitized.name).or_default().push(record);
    }

    if by_table.is_empty() {
        return Err(GenerationError::NoValidRecords);
    }

    let groups = by_table
        .into_iter()
        .map(|(table_name, records)| TableGroup {
            table_name,
            records,
        })
        .collect();

    Ok(Grouped { groups, warnings })
}
