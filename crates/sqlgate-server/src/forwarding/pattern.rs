//! Wildcard patterns matched against destination URLs and request paths.
//!
//! Syntax is deliberately small: `*` matches any run of characters (including
//! `/`), everything else is literal. Matching is case-insensitive and
//! unanchored, so `localhost:*` matches `http://localhost:3000/foo`.

use std::fmt;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern must not be empty")]
    Empty,

    #[error("pattern {pattern:?} does not compile: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob once; the regex is reused for every match.
    pub fn compile(glob: &str) -> Result<Self, PatternError> {
        if glob.is_empty() {
            return Err(PatternError::Empty);
        }
        let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| PatternError::Invalid {
            pattern: glob.to_string(),
            source,
        })?;
        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    /// True when the pattern occurs anywhere in `candidate`.
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// Literal pieces are escaped wholesale, which covers `.` and `?` along with
// every other metacharacter.
fn glob_to_regex(glob: &str) -> String {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?i){body}")
}
