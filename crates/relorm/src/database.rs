//! Database handle: the entry point for building statements.

use crate::connection::Connection;
use crate::query::{Query, QueryKind};
use crate::raw::Raw;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// A cheap clonable handle over one [`Connection`].
///
/// Every statement built from a `Database` quotes identifiers with the
/// connection's quote character and executes on that connection.
#[derive(Clone)]
pub struct Database {
    connection: Rc<dyn Connection>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("quote", &self.connection.quote())
            .finish()
    }
}

impl Database {
    pub fn new(connection: Rc<dyn Connection>) -> Self {
        Self { connection }
    }

    pub fn quote(&self) -> char {
        self.connection.quote()
    }

    pub fn connection(&self) -> &Rc<dyn Connection> {
        &self.connection
    }

    fn build(&self, kind: QueryKind) -> Query {
        Query::with_connection(kind, Rc::clone(&self.connection))
    }

    /// A literal statement with positional parameters.
    pub fn query(&self, sql: impl Into<String>, params: Vec<Value>) -> Query {
        let mut query = self.build(QueryKind::Query);
        query.query(sql, params);
        query
    }

    pub fn insert(&self, table: impl Into<String>) -> Query {
        let mut query = self.build(QueryKind::Insert);
        query.table(table);
        query
    }

    /// A SELECT; set the source with [`Query::from`].
    pub fn select(&self) -> Query {
        self.build(QueryKind::Select)
    }

    pub fn update(&self, table: impl Into<String>) -> Query {
        let mut query = self.build(QueryKind::Update);
        query.table(table);
        query
    }

    pub fn delete(&self, table: impl Into<String>) -> Query {
        let mut query = self.build(QueryKind::Delete);
        query.table(table);
        query
    }

    /// Mark `expr` as literal SQL.
    pub fn raw(&self, expr: impl Into<String>) -> Raw {
        Raw::new(expr)
    }
}
