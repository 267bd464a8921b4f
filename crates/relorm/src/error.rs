//! Error types for relorm

use thiserror::Error;

/// Result type alias for relorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for query building, execution and mapping
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement preparation or execution failed; carries the driver message
    #[error("Database error: {0}")]
    Database(String),

    /// The query builder was used out of order (e.g. `on` before `join`)
    #[error("Query builder misuse: {0}")]
    Misuse(String),

    /// A schema resource exists but could not be read or parsed
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The entity has no loaded record for an operation that needs one
    #[error("Entity not loaded: {0}")]
    NotLoaded(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a builder misuse error
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse(message.into())
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a builder misuse error
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::Misuse(_))
    }

    /// Check if this is a database error
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<rusqlite::Error> for OrmError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_keeps_message() {
        let err: OrmError = rusqlite::Error::InvalidQuery.into();
        assert!(err.is_database());
        assert!(err.to_string().starts_with("Database error: "));
    }

    #[test]
    fn misuse_display() {
        let err = OrmError::misuse("on() called before join()");
        assert!(err.is_misuse());
        assert_eq!(
            err.to_string(),
            "Query builder misuse: on() called before join()"
        );
    }
}
