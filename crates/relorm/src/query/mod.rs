//! Mutable statement builder and compiler.
//!
//! A [`Query`] accumulates clauses for one of five statement kinds and
//! compiles them into SQL text plus an ordered parameter list. Every `?` in
//! the compiled text corresponds, left to right, to one element of the list.
//!
//! # Usage
//!
//! ```ignore
//! use relorm::{Database, JoinKind};
//!
//! // INSERT
//! let (sql, params) = db.insert("foo").set("bar", "baz").compile();
//! assert_eq!(sql, "INSERT INTO `foo` (`bar`) VALUES (?)");
//!
//! // SELECT with a join and a nested group
//! let mut q = db.select();
//! q.from_as("post", "p")
//!     .join_as("user", "u", JoinKind::Left)
//!     .on("u.id", "p.user_id")?
//!     .where_("p.status", "published")
//!     .where_group(|g| {
//!         g.where_op("p.views", ">", 100).or_where("p.pinned", true);
//!     })
//!     .order("p.created", "desc")
//!     .limit(20);
//! let rows = q.rows()?;
//!
//! // DELETE
//! db.delete("foo").where_("id", 5).execute("id")?;
//! ```

mod compile;
mod condition;
mod execute;


pub use condition::{Condition, Conditions, Logic, Operand, Operator, resolve_operator};
pub use execute::Outcome;

use crate::connection::{Connection, ExecResult};
use crate::error::{OrmError, OrmResult};
use crate::raw::Raw;
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::rc::Rc;

/// Default identifier quote character.
pub const DEFAULT_QUOTE: char = '`';

/// Statement kind of a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Literal SQL with parameters, compiled as-is.
    Query,
    Insert,
    Select,
    Update,
    Delete,
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Outer,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Outer => "OUTER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// `DESC` (any case) is descending; everything else is ascending.
    pub fn parse(direction: &str) -> Self {
        if direction.eq_ignore_ascii_case("DESC") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A column reference or a raw expression, as used in select lists,
/// GROUP BY and ORDER BY.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Column(String),
    Raw(Raw),
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::Column(v.to_string())
    }
}

impl From<String> for Expr {
    fn from(v: String) -> Self {
        Expr::Column(v)
    }
}

impl From<&String> for Expr {
    fn from(v: &String) -> Self {
        Expr::Column(v.clone())
    }
}

impl From<Raw> for Expr {
    fn from(v: Raw) -> Self {
        Expr::Raw(v)
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

macro_rules! impl_select_item_from_expr {
    ($($t:ty),*) => {
        $(impl From<$t> for SelectItem {
            fn from(v: $t) -> Self {
                SelectItem {
                    expr: v.into(),
                    alias: None,
                }
            }
        })*
    };
}

impl_select_item_from_expr!(&str, String, &String, Raw);

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        SelectItem { expr, alias: None }
    }
}

impl<E: Into<Expr>> From<(E, &str)> for SelectItem {
    fn from((expr, alias): (E, &str)) -> Self {
        SelectItem {
            expr: expr.into(),
            alias: Some(alias.to_string()),
        }
    }
}

impl<E: Into<Expr>> From<(E, String)> for SelectItem {
    fn from((expr, alias): (E, String)) -> Self {
        SelectItem {
            expr: expr.into(),
            alias: Some(alias),
        }
    }
}

/// A value assigned in INSERT / UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum Assign {
    Value(Value),
    Raw(Raw),
}

macro_rules! impl_assign_from_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Assign {
            fn from(v: $t) -> Self {
                Assign::Value(Value::from(v))
            }
        })*
    };
}

impl_assign_from_value!(
    i8, i16, i32, i64, u8, u16, u32, f32, f64, bool, &str, String, &String, Value, &Value, JsonValue
);

impl<T: Into<Value>> From<Option<T>> for Assign {
    fn from(v: Option<T>) -> Self {
        Assign::Value(Value::from(v))
    }
}

impl From<Raw> for Assign {
    fn from(v: Raw) -> Self {
        Assign::Raw(v)
    }
}

/// FROM source.
#[derive(Debug, Clone)]
pub(crate) enum Source {
    Table(String),
    Query(Box<Query>),
}

#[derive(Debug, Clone)]
pub(crate) struct Join {
    pub(crate) table: String,
    pub(crate) alias: Option<String>,
    pub(crate) kind: JoinKind,
    pub(crate) on: Conditions,
    pub(crate) on_where: Conditions,
}

/// A mutable SQL statement builder.
#[derive(Clone)]
pub struct Query {
    pub(crate) kind: QueryKind,
    pub(crate) quote: char,
    connection: Option<Rc<dyn Connection>>,
    pub(crate) sql: String,
    pub(crate) params: Vec<Value>,
    pub(crate) source: Option<Source>,
    pub(crate) alias: Option<String>,
    pub(crate) distinct: bool,
    pub(crate) select: Vec<SelectItem>,
    pub(crate) values: IndexMap<String, Assign>,
    pub(crate) joins: Vec<Join>,
    pub(crate) wheres: Conditions,
    pub(crate) groups: Vec<Expr>,
    pub(crate) havings: Conditions,
    pub(crate) orders: IndexMap<Expr, Direction>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) unions: Vec<Query>,
    pub(crate) union_alls: Vec<Query>,
    result: Option<ExecResult>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.compile();
        f.debug_struct("Query")
            .field("kind", &self.kind)
            .field("sql", &sql)
            .field("params", &params)
            .field("executed", &self.result.is_some())
            .finish()
    }
}

impl Query {
    /// Create a detached builder that only compiles.
    pub fn new(kind: QueryKind, quote: char) -> Self {
        Self {
            kind,
            quote,
            connection: None,
            sql: String::new(),
            params: Vec::new(),
            source: None,
            alias: None,
            distinct: false,
            select: Vec::new(),
            values: IndexMap::new(),
            joins: Vec::new(),
            wheres: Conditions::new(),
            groups: Vec::new(),
            havings: Conditions::new(),
            orders: IndexMap::new(),
            limit: None,
            offset: None,
            unions: Vec::new(),
            union_alls: Vec::new(),
            result: None,
        }
    }

    /// Create a builder bound to a connection; it quotes with the connection's character.
    pub fn with_connection(kind: QueryKind, connection: Rc<dyn Connection>) -> Self {
        let mut query = Self::new(kind, connection.quote());
        query.connection = Some(connection);
        query
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    pub(crate) fn connection(&self) -> Option<&Rc<dyn Connection>> {
        self.connection.as_ref()
    }

    pub(crate) fn result_slot(&mut self) -> &mut Option<ExecResult> {
        &mut self.result
    }

    /// Turn the builder into a literal statement.
    pub fn query(&mut self, sql: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.kind = QueryKind::Query;
        self.sql = sql.into();
        self.params = params;
        self
    }

    /// Set the target table.
    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.source = Some(Source::Table(table.into()));
        self
    }

    /// Alias of [`Query::table`] that reads naturally for SELECT.
    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        self.table(table)
    }

    /// `FROM table AS alias`
    pub fn from_as(&mut self, table: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.source = Some(Source::Table(table.into()));
        self.alias = Some(alias.into());
        self
    }

    /// `FROM (sub-query) AS alias`
    pub fn from_query(&mut self, query: Query, alias: impl Into<String>) -> &mut Self {
        self.source = Some(Source::Query(Box::new(query)));
        self.alias = Some(alias.into());
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Append one select-list entry: a column, a [`Raw`], or an `(expr, alias)` pair.
    pub fn select(&mut self, item: impl Into<SelectItem>) -> &mut Self {
        self.select.push(item.into());
        self
    }

    /// Append several select-list entries.
    pub fn columns<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        self.select.extend(items.into_iter().map(Into::into));
        self
    }

    /// Assign a column; a later assignment to the same column keeps its first position.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Assign>) -> &mut Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Assign several columns.
    pub fn values<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Assign>,
    {
        for (column, value) in values {
            self.values.insert(column.into(), value.into());
        }
        self
    }

    pub fn join(&mut self, table: impl Into<String>, kind: JoinKind) -> &mut Self {
        self.joins.push(Join {
            table: table.into(),
            alias: None,
            kind,
            on: Conditions::new(),
            on_where: Conditions::new(),
        });
        self
    }

    pub fn join_as(
        &mut self,
        table: impl Into<String>,
        alias: impl Into<String>,
        kind: JoinKind,
    ) -> &mut Self {
        self.join(table, kind);
        if let Some(join) = self.joins.last_mut() {
            join.alias = Some(alias.into());
        }
        self
    }

    fn last_join(&mut self, method: &str) -> OrmResult<&mut Join> {
        self.joins
            .last_mut()
            .ok_or_else(|| OrmError::misuse(format!("{method}() called before join()")))
    }

    /// `ON first = second`, both sides identifiers.
    pub fn on(&mut self, first: impl Into<String>, second: &str) -> OrmResult<&mut Self> {
        self.last_join("on")?.on.on(first, second);
        Ok(self)
    }

    /// `ON first <op> second`, both sides identifiers.
    pub fn on_op(&mut self, first: impl Into<String>, op: &str, second: &str) -> OrmResult<&mut Self> {
        self.last_join("on")?.on.on_op(first, op, second);
        Ok(self)
    }

    pub fn or_on(&mut self, first: impl Into<String>, second: &str) -> OrmResult<&mut Self> {
        self.last_join("or_on")?.on.or_on(first, second);
        Ok(self)
    }

    pub fn or_on_op(
        &mut self,
        first: impl Into<String>,
        op: &str,
        second: &str,
    ) -> OrmResult<&mut Self> {
        self.last_join("or_on")?.on.or_on_op(first, op, second);
        Ok(self)
    }

    pub fn on_group(&mut self, build: impl FnOnce(&mut Conditions)) -> OrmResult<&mut Self> {
        self.last_join("on")?.on.group(build);
        Ok(self)
    }

    /// Join condition comparing against a bound value.
    pub fn on_where(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Operand>,
    ) -> OrmResult<&mut Self> {
        self.last_join("on_where")?.on_where.where_(column, value);
        Ok(self)
    }

    pub fn on_where_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> OrmResult<&mut Self> {
        self.last_join("on_where")?.on_where.where_op(column, op, value);
        Ok(self)
    }

    pub fn or_on_where(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Operand>,
    ) -> OrmResult<&mut Self> {
        self.last_join("or_on_where")?.on_where.or_where(column, value);
        Ok(self)
    }

    pub fn or_on_where_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> OrmResult<&mut Self> {
        self.last_join("or_on_where")?
            .on_where
            .or_where_op(column, op, value);
        Ok(self)
    }

    pub fn on_where_group(&mut self, build: impl FnOnce(&mut Conditions)) -> OrmResult<&mut Self> {
        self.last_join("on_where")?.on_where.group(build);
        Ok(self)
    }

    pub fn where_(&mut self, column: impl Into<String>, value: impl Into<Operand>) -> &mut Self {
        self.wheres.where_(column, value);
        self
    }

    pub fn where_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.wheres.where_op(column, op, value);
        self
    }

    pub fn or_where(&mut self, column: impl Into<String>, value: impl Into<Operand>) -> &mut Self {
        self.wheres.or_where(column, value);
        self
    }

    pub fn or_where_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.wheres.or_where_op(column, op, value);
        self
    }

    pub fn where_group(&mut self, build: impl FnOnce(&mut Conditions)) -> &mut Self {
        self.wheres.group(build);
        self
    }

    pub fn or_where_group(&mut self, build: impl FnOnce(&mut Conditions)) -> &mut Self {
        self.wheres.or_group(build);
        self
    }

    /// Direct access to the WHERE tree.
    pub fn wheres_mut(&mut self) -> &mut Conditions {
        &mut self.wheres
    }

    pub fn group_by(&mut self, expr: impl Into<Expr>) -> &mut Self {
        self.groups.push(expr.into());
        self
    }

    pub fn having(&mut self, column: impl Into<String>, value: impl Into<Operand>) -> &mut Self {
        self.havings.where_(column, value);
        self
    }

    pub fn having_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.havings.where_op(column, op, value);
        self
    }

    pub fn or_having(&mut self, column: impl Into<String>, value: impl Into<Operand>) -> &mut Self {
        self.havings.or_where(column, value);
        self
    }

    pub fn or_having_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.havings.or_where_op(column, op, value);
        self
    }

    pub fn having_group(&mut self, build: impl FnOnce(&mut Conditions)) -> &mut Self {
        self.havings.group(build);
        self
    }

    pub fn or_having_group(&mut self, build: impl FnOnce(&mut Conditions)) -> &mut Self {
        self.havings.or_group(build);
        self
    }

    /// Add an ORDER BY entry; `direction` is `DESC` (any case) or ascending.
    pub fn order(&mut self, expr: impl Into<Expr>, direction: &str) -> &mut Self {
        self.order_by(expr, Direction::parse(direction))
    }

    pub fn order_by(&mut self, expr: impl Into<Expr>, direction: Direction) -> &mut Self {
        self.orders.insert(expr.into(), direction);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn union(&mut self, query: Query) -> &mut Self {
        self.unions.push(query);
        self
    }

    pub fn union_all(&mut self, query: Query) -> &mut Self {
        self.union_alls.push(query);
        self
    }
}
