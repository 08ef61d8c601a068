//! Identifier sanitization and validation.
//!
//! Table and column names come straight from client JSON, so nothing reaches
//! generated SQL without passing through this module.

/// Table used when a record does not declare one.
pub const DEFAULT_TABLE: &str = "DATA_TABLE";

/// Reserved key naming the target table of a record.
pub const TABLE_FIELD: &str = "tableName";

/// Reserved key naming the target procedure of a call descriptor.
pub const PROCEDURE_FIELD: &str = "procedureName";

/// Reserved key holding the named parameters of a call descriptor.
pub const PARAMETERS_FIELD: &str = "parameters";

/// Characters allowed in table and column identifiers.
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Non-empty and made only of identifier characters.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_identifier_char)
}

/// One or two dot-separated identifiers (`TABLE` or `SCHEMA.TABLE`).
pub fn is_table_reference(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() <= 2 && parts.iter().all(|p| is_identifier(p))
}

/// Part of a PL/SQL qualified name: starts with a letter or `_`, then
/// letters, digits, `_`, `$` or `#`.
pub fn is_procedure_part(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
}

fn strip_illegal(s: &str) -> String {
    s.chars().filter(|c| is_identifier_char(*c)).collect()
}

/// Outcome of sanitizing a raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub name: String,
    /// True when characters were dropped or the default was substituted.
    /// Case normalization alone does not count.
    pub altered: bool,
}

/// Normalizes a declared table name for grouping.
///
/// A name with exactly one `.` whose halves are both valid identifiers becomes
/// `SCHEMA.TABLE`. Anything else has illegal characters (dots included)
/// stripped. The result is uppercase; an empty result becomes [`DEFAULT_TABLE`].
pub fn sanitize_table_name(raw: &str) -> Sanitized {
    let trimmed = raw.trim();
    if let Some((schema, table)) = trimmed.split_once('.') {
        if !table.contains('.') && is_identifier(schema) && is_identifier(table) {
            return Sanitized {
                name: format!("{}.{}", schema.to_uppercase(), table.to_uppercase()),
                altered: trimmed.len() != raw.len(),
            };
        }
    }

    let stripped = strip_illegal(trimmed);
    if stripped.is_empty() {
        return Sanitized {
            name: DEFAULT_TABLE.to_string(),
            altered: true,
        };
    }
    Sanitized {
        altered: stripped.len() != raw.len(),
        name: stripped.to_uppercase(),
    }
}

/// Case-preserving variant used for single-record inserts and column names.
///
/// Keeps `SCHEMA.TABLE` form when both halves are valid, otherwise strips
/// illegal characters. Returns an empty name if nothing legal remains.
pub fn clean_identifier(raw: &str) -> Sanitized {
    if is_table_reference(raw) {
        return Sanitized {
            name: raw.to_string(),
            altered: false,
        };
    }
    if let Some((schema, table)) = raw.split_once('.') {
        if !table.contains('.') {
            let (schema, table) = (strip_illegal(schema), strip_illegal(table));
            if !schema.is_empty() && !table.is_empty() {
                return Sanitized {
                    name: format!("{schema}.{table}"),
                    altered: true,
                };
            }
        }
    }
    Sanitized {
        name: strip_illegal(raw),
        altered: true,
    }
}

/// Column names never carry a schema part.
pub fn clean_column(raw: &str) -> Sanitized {
    if is_identifier(raw) {
        return Sanitized {
            name: raw.to_string(),
            altered: false,
        };
    }
    Sanitized {
        name: strip_illegal(raw),
        altered: true,
    }
}
