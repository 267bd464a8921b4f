//! Connection and schema configuration.
//!
//! Configuration is plain serde data, usually read from TOML:
//!
//! ```toml
//! default_connection = "main"
//!
//! [connections.main]
//! dialect = "sqlite"
//! path = "app.db"
//! profile = true
//! slow_query_ms = 250
//!
//! [schema]
//! directory = "schema"
//! ```

use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::connection::SqliteConnection;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Identifier quoting dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Back-tick quoted identifiers.
    #[default]
    #[serde(alias = "mysql")]
    Backtick,
    /// Double-quote identifiers.
    #[serde(alias = "ansi")]
    Sqlite,
}

impl Dialect {
    pub fn quote(&self) -> char {
        match self {
            Dialect::Backtick => '`',
            Dialect::Sqlite => '"',
        }
    }
}

/// Settings of one named connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    /// Database file, or `:memory:`.
    pub path: String,
    /// Report every statement to a monitor.
    pub profile: bool,
    /// Statements slower than this are reported as slow.
    pub slow_query_ms: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            path: ":memory:".to_string(),
            profile: false,
            slow_query_ms: None,
        }
    }
}

/// Where schema resources live.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub directory: Option<PathBuf>,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Connection used when a schema descriptor names none.
    pub default_connection: String,
    pub connections: IndexMap<String, ConnectionConfig>,
    pub schema: SchemaConfig,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            default_connection: "default".to_string(),
            connections: IndexMap::new(),
            schema: SchemaConfig::default(),
        }
    }
}

impl OrmConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> OrmResult<Self> {
        toml::from_str(source).map_err(|e| OrmError::config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| OrmError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Settings of a named connection; an empty name means the default.
    pub fn connection(&self, name: &str) -> OrmResult<&ConnectionConfig> {
        let name = if name.is_empty() {
            self.default_connection.as_str()
        } else {
            name
        };
        self.connections
            .get(name)
            .ok_or_else(|| OrmError::config(format!("unknown connection '{name}'")))
    }
}

/// Produces a ready [`Database`] for a connection name.
pub trait ConnectionFactory {
    fn connect(&self, name: &str) -> OrmResult<Database>;

    /// Name used when a descriptor names no connection.
    fn default_name(&self) -> &str {
        "default"
    }
}

impl ConnectionFactory for OrmConfig {
    fn connect(&self, name: &str) -> OrmResult<Database> {
        let config = self.connection(name)?.clone();
        Ok(Database::new(Rc::new(SqliteConnection::new(config))))
    }

    fn default_name(&self) -> &str {
        &self.default_connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_toml() {
        let config = OrmConfig::from_toml_str(
            r#"
            default_connection = "main"

            [connections.main]
            dialect = "sqlite"
            profile = true

            [connections.legacy]
            dialect = "mysql"
            path = "legacy.db"

            [schema]
            directory = "schema"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_connection, "main");
        let main = config.connection("").unwrap();
        assert_eq!(main.dialect.quote(), '"');
        assert_eq!(main.path, ":memory:");
        assert!(main.profile);
        assert_eq!(config.connection("legacy").unwrap().dialect, Dialect::Backtick);
        assert_eq!(config.schema.directory, Some(PathBuf::from("schema")));
    }

    #[test]
    fn unknown_connection() {
        let config = OrmConfig::default();
        let err = config.connection("nope").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn factory_uses_dialect_quote() {
        let config = OrmConfig::from_toml_str(
            r#"
            [connections.default]
            dialect = "sqlite"
            "#,
        )
        .unwrap();
        let db = config.connect("").unwrap();
        assert_eq!(db.quote(), '"');
    }
}
