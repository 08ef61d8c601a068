//! Rendering of JSON values as Oracle SQL literals.
//!
//! Strings that look like dates are turned into `TO_DATE(...)` calls. The
//! classification is a best-effort heuristic driven by two signals: the field
//! name (does it contain a date token such as `fecha`?) and the string shape
//! (`DD-MM-YYYY`, `YYYY-MM-DD`, `DD/MM/YYYY`). Shape alone is enough, so a
//! code like `"01-02-2023"` in a field called `codigo` is still rendered as a
//! date. [`ValueFormatter::classify_date`] exposes the decision on its own.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use time::{Date, Month};

use crate::error::{GenerationWarning, WarningKind};

static DMY_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})-(\d{2})-(\d{4})$").expect("valid regex"));
static YMD_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"));
static DMY_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid regex"));
// Only consulted when the field name already says "date".
static ISO_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[T ]\S").expect("valid regex"));

/// Default field-name tokens marking a date column.
pub const DEFAULT_DATE_TOKENS: &[&str] = &["fecha", "date"];

/// Result of running the date heuristic on a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateClass {
    /// Neither the field name nor the shape suggests a date.
    NotADate,
    /// Recognized and valid calendar date.
    Date(Date),
    /// Looked like a date but did not parse; rendered as a plain string.
    Unparseable,
}

/// Formats JSON values as SQL literals.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    date_tokens: Vec<String>,
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self::with_date_tokens(DEFAULT_DATE_TOKENS.iter().copied())
    }
}

impl ValueFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom set of field-name tokens (matched case-insensitively).
    pub fn with_date_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            date_tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Whether a field name contains one of the date tokens.
    pub fn is_date_field(&self, hint: Option<&str>) -> bool {
        let Some(hint) = hint else {
            return false;
        };
        let hint = hint.to_lowercase();
        self.date_tokens.iter().any(|t| hint.contains(t.as_str()))
    }

    /// Runs the date heuristic on a string value.
    pub fn classify_date(&self, value: &str, hint: Option<&str>) -> DateClass {
        let value = value.trim();
        let by_name = self.is_date_field(hint);

        let dmy = DMY_DASH
            .captures(value)
            .or_else(|| DMY_SLASH.captures(value));
        let parts = if let Some(c) = dmy {
            Some((c[3].to_string(), c[2].to_string(), c[1].to_string()))
        } else if let Some(c) = YMD_DASH.captures(value) {
            Some((c[1].to_string(), c[2].to_string(), c[3].to_string()))
        } else if by_name {
            ISO_TIMESTAMP
                .captures(value)
                .map(|c| (c[1].to_string(), c[2].to_string(), c[3].to_string()))
        } else {
            None
        };

        match parts {
            Some((year, month, day)) => match calendar_date(&year, &month, &day) {
                Some(date) => DateClass::Date(date),
                None => DateClass::Unparseable,
            },
            None if by_name => DateClass::Unparseable,
            None => DateClass::NotADate,
        }
    }

    /// Renders a value as a SQL literal.
    pub fn format(&self, value: &Value, hint: Option<&str>) -> String {
        self.render(value, hint).0
    }

    /// Like [`format`](Self::format) but also reports a recovered date-parse failure.
    pub fn render(&self, value: &Value, hint: Option<&str>) -> (String, Option<GenerationWarning>) {
        match value {
            Value::Null => ("NULL".to_string(), None),
            Value::Bool(b) => (if *b { "'Y'" } else { "'N'" }.to_string(), None),
            Value::Number(n) => (n.to_string(), None),
            Value::String(s) => match self.classify_date(s, hint) {
                DateClass::Date(date) => (to_date(date), None),
                DateClass::Unparseable => (
                    quote(s),
                    Some(GenerationWarning::new(
                        WarningKind::DateParseFallback,
                        format!(
                            "value {s:?} for field {} is not a valid date, kept as text",
                            hint.unwrap_or("?")
                        ),
                    )),
                ),
                DateClass::NotADate => (quote(s), None),
            },
            Value::Array(_) | Value::Object(_) => (quote(&value.to_string()), None),
        }
    }
}

/// Single-quoted literal with embedded quotes doubled.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn to_date(date: Date) -> String {
    format!(
        "TO_DATE('{:02}-{:02}-{:04}','DD-MM-YYYY')",
        date.day(),
        u8::from(date.month()),
        date.year()
    )
}

fn calendar_date(year: &str, month: &str, day: &str) -> Option<Date> {
    let year: i32 = year.parse().ok()?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    let day: u8 = day.parse().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}
