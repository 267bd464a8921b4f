//! Literal SQL fragments.

use std::fmt;

/// A string of literal SQL.
///
/// `Raw` values are emitted verbatim by the compiler: they are never quoted
/// and never bound as parameters. Use them for computed columns, function
/// calls and anything else the builder cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Raw(String);

impl Raw {
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_is_verbatim() {
        let raw = Raw::new("COUNT(*)");
        assert_eq!(raw.as_str(), "COUNT(*)");
        assert_eq!(raw.to_string(), "COUNT(*)");
    }
}
