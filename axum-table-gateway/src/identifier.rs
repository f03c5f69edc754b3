//! SQL identifier validation
//!
//! Table and column names cannot be sent as bind parameters, so they end up in
//! the statement text. This module is the only gate they pass through on the
//! way there.

use std::fmt;

/// Returns `true` if `candidate` matches `^[A-Za-z_][A-Za-z0-9_]*$`
///
/// Anything else (empty strings, whitespace, quotes, semicolons, dots,
/// parentheses, non-ASCII letters) is rejected.
pub fn is_valid_identifier(candidate: &str) -> bool {
    let mut bytes = candidate.bytes();

    match bytes.next() {
        Some(first) if first == b'_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }

    bytes.all(|byte| byte == b'_' || byte.is_ascii_alphanumeric())
}

/// A table or column name that passed [`is_valid_identifier`]
///
/// Only values of this type are ever written into statement text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `candidate`, returning `None` when it is not a safe identifier
    pub fn parse(candidate: &str) -> Option<Self> {
        is_valid_identifier(candidate).then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form used in statement text
    ///
    /// Quoting keeps the caller's casing intact on Postgres. Validated
    /// identifiers never contain `"`, so no escaping is required.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
