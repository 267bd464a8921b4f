//! # relorm
//!
//! A schema-driven SQL query compiler and relational mapper over SQLite.
//!
//! ## Features
//!
//! - **Query builder**: one mutable builder for SELECT, INSERT, UPDATE, DELETE
//!   and literal statements, compiled to SQL with positional `?` parameters
//! - **Schema descriptors**: tables, typed columns and relations loaded from
//!   JSON or TOML resources and cached per entity
//! - **Mapper**: filters, sorts, pagination and eager `with` joins per entity,
//!   with relation aliases derived from the traversal path
//! - **Records**: typed column access, lazy relation traversal, helpers
//! - **Entities**: staged writes, belongs foreign keys and junction sync
//! - **Query monitoring**: timing, tracing and per-group profiling
//!
//! ## Query builder
//!
//! ```ignore
//! use relorm::{Database, SqliteConnection, Dialect};
//! use std::rc::Rc;
//!
//! let db = Database::new(Rc::new(SqliteConnection::in_memory(Dialect::Sqlite)));
//!
//! let (sql, params) = db.insert("foo").set("bar", "baz").compile();
//! let id = db.insert("foo").set("bar", "baz").result()?.insert_id();
//!
//! let mut q = db.select();
//! q.from("foo").where_op("id", "IN", vec![4, 5, 6]).order("id", "desc");
//! for row in q.rows()? {
//!     println!("{row:?}");
//! }
//! ```
//!
//! ## Mapping
//!
//! ```ignore
//! use relorm::{Orm, OrmConfig, Schema};
//!
//! let orm = Orm::new(Schema::from_directory("schema"), OrmConfig::from_path("relorm.toml")?);
//!
//! let posts = orm.mapper("post")?;
//! posts.filter("status", "published").with("author").amount(10);
//! for mut post in posts.all()? {
//!     let author = post.value("author")?;
//!     let tags = post.value("tags")?;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod database;
pub mod entity;
pub mod error;
pub mod ident;
pub mod mapper;
pub mod monitor;
pub mod orm;
pub mod query;
pub mod raw;
pub mod record;
pub mod schema;
pub mod value;

pub use config::{ConnectionConfig, ConnectionFactory, Dialect, OrmConfig, SchemaConfig};
pub use connection::{Connection, Cursor, ExecResult, SqliteConnection};
pub use database::Database;
pub use entity::Entity;
pub use error::{OrmError, OrmResult};
pub use ident::{Ident, quote_identifier, quote_table};
pub use mapper::{Filter, Helper, Lookup, Mapper, MapperFactory, Records};
pub use monitor::{
    MonitorConfig, NoopMonitor, ProfileEntry, ProfileMonitor, QueryContext, QueryMonitor,
    QueryResult, QueryType, TracingMonitor,
};
pub use orm::Orm;
pub use query::{
    Assign, Condition, Conditions, Direction, Expr, JoinKind, Logic, Operand, Operator, Outcome,
    Query, QueryKind, SelectItem,
};
pub use raw::Raw;
pub use record::{Field, FieldId, Record};
pub use schema::{
    ColumnType, Descriptor, DirectoryFinder, MemoryFinder, Relation, RelationKind, Schema,
    SchemaFinder, SchemaSource,
};
pub use value::{Row, Value};
