//! Entity descriptors: table, column types and relations.
//!
//! A descriptor is loaded once per entity name from a resource found by a
//! [`SchemaFinder`] and cached for the lifetime of the [`Schema`].
//!
//! Resources are JSON or TOML documents:
//!
//! ```json
//! {
//!   "database": "main",
//!   "table": "post",
//!   "columns": { "id": "int", "title": "string", "meta": "json" },
//!   "relations": {
//!     "author": ["user", "belongs", "user_id"],
//!     "comments": ["comment", "many", "post_id"],
//!     "tags": ["tag", "pivot", "post_tag", "post_id", "tag_id", ["weight"]]
//!   }
//! }
//! ```

use crate::error::{OrmError, OrmResult};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Declared type of a column; drives value coercion on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum ColumnType {
    Int,
    Float,
    Boolean,
    /// JSON text decoded to a structure.
    Json,
    /// JSON text decoded to a map or list.
    Array,
    #[default]
    String,
}

impl From<String> for ColumnType {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => ColumnType::Int,
            "float" | "double" => ColumnType::Float,
            "boolean" | "bool" => ColumnType::Boolean,
            "json" => ColumnType::Json,
            "array" => ColumnType::Array,
            _ => ColumnType::String,
        }
    }
}

impl ColumnType {
    /// Whether values are stored as JSON text.
    pub fn is_json(&self) -> bool {
        matches!(self, ColumnType::Json | ColumnType::Array)
    }
}

/// Kind tag of a [`Relation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Belongs,
    One,
    Many,
    Pivot,
    Set,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Belongs => "belongs",
            RelationKind::One => "one",
            RelationKind::Many => "many",
            RelationKind::Pivot => "pivot",
            RelationKind::Set => "set",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An association to another entity.
///
/// Encoded in resources as a positional list: `[target, kind, ...fields]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<JsonValue>")]
pub enum Relation {
    /// This entity holds `foreign_key` pointing at the target's id.
    Belongs { target: String, foreign_key: String },
    /// The target holds `foreign_key` pointing back; at most one row.
    One { target: String, foreign_key: String },
    /// The target holds `foreign_key` pointing back; any number of rows.
    Many { target: String, foreign_key: String },
    /// Junction rows reference both sides directly.
    Pivot {
        target: String,
        junction: String,
        local: String,
        remote: String,
        extra: Vec<String>,
    },
    /// Junction rows share a set id that the owner stores in `set_column`.
    Set {
        target: String,
        junction: String,
        set_column: String,
        remote: String,
        extra: Vec<String>,
    },
}

impl TryFrom<Vec<JsonValue>> for Relation {
    type Error = String;

    fn try_from(parts: Vec<JsonValue>) -> Result<Self, Self::Error> {
        let text = |idx: usize, what: &str| -> Result<String, String> {
            parts
                .get(idx)
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| format!("relation is missing {what} at position {idx}"))
        };
        let extra = || -> Result<Vec<String>, String> {
            match parts.get(5) {
                None | Some(JsonValue::Null) => Ok(Vec::new()),
                Some(JsonValue::Array(items)) => items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| "extra pivot columns must be strings".to_string())
                    })
                    .collect(),
                Some(_) => Err("extra pivot columns must be a list".to_string()),
            }
        };

        let target = text(0, "the target entity")?;
        let kind = text(1, "the relation kind")?;
        match kind.as_str() {
            "belongs" => Ok(Relation::Belongs {
                target,
                foreign_key: text(2, "the foreign key")?,
            }),
            "one" => Ok(Relation::One {
                target,
                foreign_key: text(2, "the foreign key")?,
            }),
            "many" => Ok(Relation::Many {
                target,
                foreign_key: text(2, "the foreign key")?,
            }),
            "pivot" => Ok(Relation::Pivot {
                target,
                junction: text(2, "the junction table")?,
                local: text(3, "the local junction column")?,
                remote: text(4, "the remote junction column")?,
                extra: extra()?,
            }),
            "set" => Ok(Relation::Set {
                target,
                junction: text(2, "the junction table")?,
                set_column: text(3, "the set id column")?,
                remote: text(4, "the remote junction column")?,
                extra: extra()?,
            }),
            other => Err(format!("unknown relation kind '{other}'")),
        }
    }
}

impl Relation {
    pub fn target(&self) -> &str {
        match self {
            Relation::Belongs { target, .. }
            | Relation::One { target, .. }
            | Relation::Many { target, .. }
            | Relation::Pivot { target, .. }
            | Relation::Set { target, .. } => target,
        }
    }

    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::Belongs { .. } => RelationKind::Belongs,
            Relation::One { .. } => RelationKind::One,
            Relation::Many { .. } => RelationKind::Many,
            Relation::Pivot { .. } => RelationKind::Pivot,
            Relation::Set { .. } => RelationKind::Set,
        }
    }

    /// `many`, `pivot` and `set` resolve to a list of records.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Relation::Many { .. } | Relation::Pivot { .. } | Relation::Set { .. }
        )
    }

    /// `pivot` and `set` relations go through a junction table.
    pub fn is_junction(&self) -> bool {
        matches!(self, Relation::Pivot { .. } | Relation::Set { .. })
    }

    /// Extra junction columns exposed as pivot values.
    pub fn extra(&self) -> &[String] {
        match self {
            Relation::Pivot { extra, .. } | Relation::Set { extra, .. } => extra,
            _ => &[],
        }
    }
}

/// Table, columns and relations of one entity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    /// Connection name; empty means the default connection.
    pub database: String,
    pub table: String,
    pub columns: IndexMap<String, ColumnType>,
    pub relations: IndexMap<String, Relation>,
}

impl Descriptor {
    /// An empty descriptor for an entity without a resource.
    pub fn empty(name: &str) -> Self {
        Self {
            table: name.to_string(),
            ..Self::default()
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }
}

/// A schema resource.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    Json(String),
    Toml(String),
    /// A `.json` or `.toml` file.
    Path(PathBuf),
}

impl SchemaSource {
    /// Parse the resource into a descriptor.
    pub fn parse(&self) -> OrmResult<Descriptor> {
        match self {
            SchemaSource::Json(text) => {
                serde_json::from_str(text).map_err(|e| OrmError::schema(e.to_string()))
            }
            SchemaSource::Toml(text) => {
                toml::from_str(text).map_err(|e| OrmError::schema(e.to_string()))
            }
            SchemaSource::Path(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| OrmError::schema(format!("{}: {e}", path.display())))?;
                let is_toml = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
                let parsed = if is_toml {
                    SchemaSource::Toml(text)
                } else {
                    SchemaSource::Json(text)
                };
                parsed
                    .parse()
                    .map_err(|e| OrmError::schema(format!("{}: {e}", path.display())))
            }
        }
    }
}

/// Resolves an entity name to a schema resource.
pub trait SchemaFinder {
    fn find(&self, name: &str) -> Option<SchemaSource>;
}

impl<F> SchemaFinder for F
where
    F: Fn(&str) -> Option<SchemaSource>,
{
    fn find(&self, name: &str) -> Option<SchemaSource> {
        self(name)
    }
}

/// Finds `<name>.json`, then `<name>.toml`, in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryFinder {
    directory: PathBuf,
}

impl DirectoryFinder {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl SchemaFinder for DirectoryFinder {
    fn find(&self, name: &str) -> Option<SchemaSource> {
        ["json", "toml"]
            .iter()
            .map(|ext| self.directory.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
            .map(SchemaSource::Path)
    }
}

/// In-memory resources keyed by lowercase entity name.
#[derive(Debug, Clone, Default)]
pub struct MemoryFinder {
    sources: HashMap<String, SchemaSource>,
}

impl MemoryFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, source: SchemaSource) -> &mut Self {
        self.sources.insert(name.to_lowercase(), source);
        self
    }

    pub fn json(mut self, name: &str, text: impl Into<String>) -> Self {
        self.insert(name, SchemaSource::Json(text.into()));
        self
    }

    pub fn toml(mut self, name: &str, text: impl Into<String>) -> Self {
        self.insert(name, SchemaSource::Toml(text.into()));
        self
    }
}

impl SchemaFinder for MemoryFinder {
    fn find(&self, name: &str) -> Option<SchemaSource> {
        self.sources.get(name).cloned()
    }
}

/// Loads and caches descriptors by entity name.
///
/// Names are case-insensitive. A loaded descriptor is never reloaded.
pub struct Schema {
    finder: Box<dyn SchemaFinder>,
    loaded: RefCell<HashMap<String, Rc<Descriptor>>>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.loaded.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Schema").field("loaded", &names).finish()
    }
}

impl Schema {
    pub fn new(finder: impl SchemaFinder + 'static) -> Self {
        Self {
            finder: Box::new(finder),
            loaded: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_directory(directory: impl Into<PathBuf>) -> Self {
        Self::new(DirectoryFinder::new(directory))
    }

    /// Descriptor of `name`, or `None` when no resource exists.
    ///
    /// A missing table name defaults to the lowercased entity name.
    pub fn get(&self, name: &str) -> OrmResult<Option<Rc<Descriptor>>> {
        let key = name.to_lowercase();
        if let Some(descriptor) = self.loaded.borrow().get(&key) {
            return Ok(Some(Rc::clone(descriptor)));
        }

        let Some(source) = self.finder.find(&key) else {
            tracing::trace!(target: "relorm", entity = %key, "no schema resource");
            return Ok(None);
        };

        let mut descriptor = source.parse()?;
        if descriptor.table.is_empty() {
            descriptor.table = key.clone();
        }
        tracing::debug!(
            target: "relorm",
            entity = %key,
            table = %descriptor.table,
            columns = descriptor.columns.len(),
            relations = descriptor.relations.len(),
            "loaded schema"
        );

        let descriptor = Rc::new(descriptor);
        self.loaded
            .borrow_mut()
            .insert(key, Rc::clone(&descriptor));
        Ok(Some(descriptor))
    }
}
