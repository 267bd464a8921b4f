//! Factory for mappers and entities.

use crate::config::{ConnectionFactory, OrmConfig};
use crate::database::Database;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::mapper::{Mapper, MapperFactory};
use crate::schema::Schema;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

struct OrmInner {
    schema: Rc<Schema>,
    factory: Box<dyn ConnectionFactory>,
    databases: RefCell<HashMap<String, Database>>,
}

/// Builds [`Mapper`]s and [`Entity`]s on the connection each entity's
/// descriptor names.
///
/// Databases are opened through the [`ConnectionFactory`] on first use and
/// cached by name. Cloning is cheap and clones share the cache.
///
/// ```ignore
/// let config = OrmConfig::from_path("relorm.toml")?;
/// let orm = Orm::from_config(config)?;
///
/// let mut user = orm.entity("user")?;
/// user.load(1)?;
/// ```
#[derive(Clone)]
pub struct Orm {
    inner: Rc<OrmInner>,
}

impl fmt::Debug for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.inner.databases.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Orm")
            .field("schema", &self.inner.schema)
            .field("databases", &names)
            .finish()
    }
}

impl Orm {
    pub fn new(schema: Schema, factory: impl ConnectionFactory + 'static) -> Self {
        Self {
            inner: Rc::new(OrmInner {
                schema: Rc::new(schema),
                factory: Box::new(factory),
                databases: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Schema from the configured directory, connections from the config.
    pub fn from_config(config: OrmConfig) -> OrmResult<Self> {
        let directory = config
            .schema
            .directory
            .clone()
            .ok_or_else(|| OrmError::config("schema.directory is not set"))?;
        Ok(Self::new(Schema::from_directory(directory), config))
    }

    pub fn schema(&self) -> &Rc<Schema> {
        &self.inner.schema
    }

    /// Register an already open database under `name`.
    pub fn attach(&self, name: impl Into<String>, database: Database) -> &Self {
        self.inner
            .databases
            .borrow_mut()
            .insert(name.into(), database);
        self
    }

    /// The database named `name`; an empty name means the default one.
    pub fn database(&self, name: &str) -> OrmResult<Database> {
        let name = if name.is_empty() {
            self.inner.factory.default_name()
        } else {
            name
        };
        if let Some(database) = self.inner.databases.borrow().get(name) {
            return Ok(database.clone());
        }

        let database = self.inner.factory.connect(name)?;
        tracing::debug!(target: "relorm", connection = name, "connected");
        self.inner
            .databases
            .borrow_mut()
            .insert(name.to_string(), database.clone());
        Ok(database)
    }

    /// A fresh root mapper for `name`.
    pub fn mapper(&self, name: &str) -> OrmResult<Mapper> {
        let database = match self.inner.schema.get(name)? {
            Some(descriptor) => self.database(&descriptor.database)?,
            None => self.database("")?,
        };
        Mapper::new(
            name,
            Rc::clone(&self.inner.schema),
            database,
            Rc::new(self.clone()),
        )
    }

    /// An unloaded entity for `name`.
    pub fn entity(&self, name: &str) -> OrmResult<Entity> {
        Ok(Entity::new(self.mapper(name)?))
    }
}

impl MapperFactory for Orm {
    fn mapper(&self, name: &str) -> OrmResult<Mapper> {
        Orm::mapper(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::schema::MemoryFinder;

    fn config() -> OrmConfig {
        let mut config = OrmConfig::default();
        config
            .connections
            .insert("default".to_string(), ConnectionConfig::default());
        config
    }

    #[test]
    fn databases_are_cached_by_name() {
        let orm = Orm::new(Schema::new(MemoryFinder::new()), config());
        let first = orm.database("").unwrap();
        let second = orm.database("default").unwrap();
        assert!(Rc::ptr_eq(first.connection(), second.connection()));
    }

    #[test]
    fn unknown_connection_is_config_error() {
        let finder = MemoryFinder::new().json("user", r#"{"database": "missing"}"#);
        let orm = Orm::new(Schema::new(finder), config());
        let err = orm.mapper("user").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn from_config_requires_schema_directory() {
        let err = Orm::from_config(config()).unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn mapper_without_resource_uses_entity_name() {
        let orm = Orm::new(Schema::new(MemoryFinder::new()), config());
        let mapper = orm.mapper("widget").unwrap();
        assert_eq!(mapper.table(), "widget");
        assert_eq!(mapper.alias(), "widget");
    }
}
