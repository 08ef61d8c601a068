//! Declarative payload transforms applied before a request is forwarded.
//!
//! A transform is data, not code: one of a closed set of shapes selected in
//! configuration. Template bodies substitute whole-string `$placeholder`
//! values; a leading `$$` emits a literal `$`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlgate_core::{Generation, InputType};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const PLACEHOLDERS: &[&str] = &[
    "sql",
    "statements",
    "payload",
    "result",
    "inputType",
    "tableName",
    "tableNames",
    "procedureName",
    "procedureNames",
    "timestamp",
    "source",
];

const INPUT_TYPES: [InputType; 4] = [
    InputType::Object,
    InputType::Array,
    InputType::Procedure,
    InputType::MultipleProcedures,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("unknown placeholder ${0}")]
    UnknownPlaceholder(String),

    #[error("${placeholder} is not available for {input_type} input")]
    Unavailable {
        placeholder: &'static str,
        input_type: InputType,
    },

    #[error("no transform case for {0} input")]
    NoCase(InputType),

    #[error("unknown input type {0:?} in by_input_type cases")]
    UnknownCase(String),
}

fn default_sql_field() -> String {
    "sql".to_string()
}

/// How the outbound body is built from a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    /// `{timestamp, source, data, sql}` where `sql` is the generation result.
    Envelope {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// `{<field>: "<all statements joined by newlines>"}`.
    Sql {
        #[serde(default = "default_sql_field")]
        field: String,
    },
    /// An arbitrary JSON body with placeholders.
    Template { body: Value },
    /// Picks a nested transform by input type.
    ByInputType {
        cases: IndexMap<String, TransformSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<TransformSpec>>,
    },
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self::Envelope { source: None }
    }
}

/// Everything a transform may read.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub generation: &'a Generation,
    pub payload: &'a Value,
    pub source: &'a str,
    pub timestamp: OffsetDateTime,
}

impl<'a> TransformContext<'a> {
    pub fn new(generation: &'a Generation, payload: &'a Value, source: &'a str) -> Self {
        Self {
            generation,
            payload,
            source,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    fn timestamp(&self) -> String {
        self.timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string())
    }
}

impl TransformSpec {
    /// Checks placeholders and case keys without a generation at hand.
    pub fn validate(&self) -> Result<(), TransformError> {
        match self {
            Self::Envelope { .. } | Self::Sql { .. } => Ok(()),
            Self::Template { body } => validate_template(body),
            Self::ByInputType { cases, fallback } => {
                for (key, spec) in cases {
                    case_input_type(key).ok_or_else(|| TransformError::UnknownCase(key.clone()))?;
                    spec.validate()?;
                }
                fallback.as_deref().map_or(Ok(()), TransformSpec::validate)
            }
        }
    }

    /// Builds the outbound body.
    pub fn apply(&self, ctx: &TransformContext<'_>) -> Result<Value, TransformError> {
        match self {
            Self::Envelope { source } => Ok(json!({
                "timestamp": ctx.timestamp(),
                "source": source.as_deref().unwrap_or(ctx.source),
                "data": ctx.payload,
                "sql": ctx.generation.sql.to_response(),
            })),
            Self::Sql { field } => {
                let mut body = Map::new();
                body.insert(field.clone(), Value::String(ctx.generation.sql.sql()));
                Ok(Value::Object(body))
            }
            Self::Template { body } => render(body, ctx),
            Self::ByInputType { cases, fallback } => {
                let input_type = ctx.generation.input_type();
                cases
                    .iter()
                    .find(|(key, _)| case_input_type(key) == Some(input_type))
                    .map(|(_, spec)| spec)
                    .or(fallback.as_deref())
                    .ok_or(TransformError::NoCase(input_type))?
                    .apply(ctx)
            }
        }
    }
}

fn case_input_type(key: &str) -> Option<InputType> {
    let key = key.trim().to_ascii_lowercase().replace('_', "-");
    INPUT_TYPES.into_iter().find(|t| t.as_str() == key)
}

enum Token<'a> {
    Literal(String),
    Placeholder(&'a str),
    Plain,
}

fn tokenize(s: &str) -> Token<'_> {
    if let Some(rest) = s.strip_prefix("$$") {
        Token::Literal(format!("${rest}"))
    } else if let Some(name) = s.strip_prefix('$') {
        Token::Placeholder(name)
    } else {
        Token::Plain
    }
}

fn validate_template(value: &Value) -> Result<(), TransformError> {
    match value {
        Value::String(s) => match tokenize(s) {
            Token::Placeholder(name) if !PLACEHOLDERS.contains(&name) => {
                Err(TransformError::UnknownPlaceholder(name.to_string()))
            }
            _ => Ok(()),
        },
        Value::Array(items) => items.iter().try_for_each(validate_template),
        Value::Object(map) => map.values().try_for_each(validate_template),
        _ => Ok(()),
    }
}

fn render(value: &Value, ctx: &TransformContext<'_>) -> Result<Value, TransformError> {
    match value {
        Value::String(s) => match tokenize(s) {
            Token::Literal(text) => Ok(Value::String(text)),
            Token::Placeholder(name) => placeholder(name, ctx),
            Token::Plain => Ok(value.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(|v| render(v, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), render(v, ctx)?)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        _ => Ok(value.clone()),
    }
}

fn placeholder(name: &str, ctx: &TransformContext<'_>) -> Result<Value, TransformError> {
    let sql = &ctx.generation.sql;
    let input_type = sql.input_type();
    let single = |placeholder: &'static str, names: Vec<&str>| match names.as_slice() {
        [one] => Ok(Value::String((*one).to_string())),
        _ => Err(TransformError::Unavailable {
            placeholder,
            input_type,
        }),
    };

    match name {
        "sql" => Ok(Value::String(sql.sql())),
        "statements" => Ok(json!(sql.statements())),
        "payload" => Ok(ctx.payload.clone()),
        "result" => Ok(sql.to_response()),
        "inputType" => Ok(Value::String(input_type.as_str().to_string())),
        "tableName" if input_type == InputType::Object => single("tableName", sql.table_names()),
        "tableName" => Err(TransformError::Unavailable {
            placeholder: "tableName",
            input_type,
        }),
        "tableNames" => Ok(json!(sql.table_names())),
        "procedureName" if input_type == InputType::Procedure => {
            single("procedureName", sql.procedure_names())
        }
        "procedureName" => Err(TransformError::Unavailable {
            placeholder: "procedureName",
            input_type,
        }),
        "procedureNames" => Ok(json!(sql.procedure_names())),
        "timestamp" => Ok(Value::String(ctx.timestamp())),
        "source" => Ok(Value::String(ctx.source.to_string())),
        other => Err(TransformError::UnknownPlaceholder(other.to_string())),
    }
}
