//! Stored procedure call descriptors.

use serde_json::{Map, Value};

use crate::error::{GenerationError, GenerationWarning, Result, json_kind};
use crate::identifier::{PARAMETERS_FIELD, PROCEDURE_FIELD, is_procedure_part};
use crate::value::ValueFormatter;

/// A call descriptor as it arrives from the client, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureRequest {
    pub procedure_name: Option<String>,
    pub parameters: Value,
}

impl ProcedureRequest {
    pub fn new(name: impl Into<String>, parameters: Value) -> Self {
        Self {
            procedure_name: Some(name.into()),
            parameters,
        }
    }

    /// Reads `procedureName` and `parameters` from a JSON value.
    ///
    /// A missing, blank or non-string name yields `procedure_name: None`.
    pub fn from_value(value: &Value) -> Self {
        let procedure_name = value
            .get(PROCEDURE_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let parameters = value.get(PARAMETERS_FIELD).cloned().unwrap_or(Value::Null);
        Self {
            procedure_name,
            parameters,
        }
    }

    /// True when the value is an object carrying a `procedureName` key.
    pub fn is_descriptor(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|o| o.contains_key(PROCEDURE_FIELD))
    }
}

/// A validated call: uppercased qualified name and rendered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureCall {
    pub qualified_name: String,
    /// `(name, formatted literal)` in request order.
    pub parameters: Vec<(String, String)>,
}

impl ProcedureCall {
    /// Validates a name and formats its parameters.
    pub fn build(
        name: &str,
        parameters: &Value,
        formatter: &ValueFormatter,
        warnings: &mut Vec<GenerationWarning>,
    ) -> Result<Self> {
        let qualified_name = parse_qualified_name(name)?;
        let params = match parameters {
            Value::Null => Vec::new(),
            Value::Object(map) => format_parameters(map, formatter, warnings)?,
            other => return Err(GenerationError::InvalidParameters(json_kind(other))),
        };
        Ok(Self {
            qualified_name,
            parameters: params,
        })
    }

    /// `NAME(p => v, ...);`, or `NAME;` without parameters.
    pub fn statement_line(&self) -> String {
        if self.parameters.is_empty() {
            return format!("{};", self.qualified_name);
        }
        let args = self
            .parameters
            .iter()
            .map(|(name, value)| format!("{name} => {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({});", self.qualified_name, args)
    }
}

/// Validates `proc`, `schema.proc` or `schema.package.proc` and uppercases it.
pub fn parse_qualified_name(name: &str) -> Result<String> {
    let name = name.trim();
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || !parts.iter().all(|p| is_procedure_part(p)) {
        return Err(GenerationError::InvalidProcedureName(name.to_string()));
    }
    Ok(parts
        .iter()
        .map(|p| p.to_uppercase())
        .collect::<Vec<_>>()
        .join("."))
}

fn format_parameters(
    map: &Map<String, Value>,
    formatter: &ValueFormatter,
    warnings: &mut Vec<GenerationWarning>,
) -> Result<Vec<(String, String)>> {
    map.iter()
        .map(|(name, value)| {
            if !is_procedure_part(name) {
                return Err(GenerationError::InvalidIdentifier(name.clone()));
            }
            let (literal, warning) = formatter.render(value, Some(name));
            warnings.extend(warning);
            Ok((name.clone(), literal))
        })
        .collect()
}
