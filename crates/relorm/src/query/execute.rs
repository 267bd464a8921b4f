//! Executing a [`Query`] and reading its result.

use super::{Query, QueryKind};
use crate::connection::{Cursor, ExecResult};
use crate::error::{OrmError, OrmResult};
use crate::value::{Row, Value};
use indexmap::IndexMap;

/// Materialized result of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Id generated by an insert.
    InsertId(i64),
    /// Rows changed by an update, delete or other statement.
    Affected(u64),
    /// Fetched rows, in order.
    Rows(Vec<Row>),
    /// Fetched rows keyed by a column; later rows win on duplicate keys.
    Keyed(IndexMap<String, Row>),
    /// One column keyed by another; later rows win on duplicate keys.
    Pairs(IndexMap<String, Value>),
}

impl Outcome {
    pub fn insert_id(&self) -> Option<i64> {
        match self {
            Outcome::InsertId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            Outcome::Affected(n) => Some(*n),
            _ => None,
        }
    }

    /// The fetched rows; scalar outcomes have none.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Outcome::Rows(rows) => rows,
            Outcome::Keyed(rows) => rows.into_values().collect(),
            _ => Vec::new(),
        }
    }
}

impl Query {
    /// Compile and run the statement, keeping its raw result.
    ///
    /// `id_column` names the generated key read back after an insert.
    pub fn execute(&mut self, id_column: &str) -> OrmResult<&mut Self> {
        let connection = self
            .connection()
            .cloned()
            .ok_or_else(|| OrmError::Connection("query has no connection".to_string()))?;
        let (sql, params) = self.compile();
        let result = connection.execute(&sql, &params, self.kind, id_column)?;
        *self.result_slot() = Some(result);
        Ok(self)
    }

    fn ensure_executed(&mut self, id_column: &str) -> OrmResult<()> {
        if self.result_slot().is_none() {
            self.execute(id_column)?;
        }
        Ok(())
    }

    /// The statement's result, executing it first if needed.
    ///
    /// A cursor is drained: reading the result a second time yields no rows.
    pub fn result(&mut self) -> OrmResult<Outcome> {
        self.ensure_executed("id")?;
        Ok(match self.result_slot() {
            Some(ExecResult::InsertId(id)) => Outcome::InsertId(*id),
            Some(ExecResult::Affected(n)) => Outcome::Affected(*n),
            Some(ExecResult::Cursor(cursor)) => Outcome::Rows(cursor.by_ref().collect()),
            None => Outcome::Rows(Vec::new()),
        })
    }

    /// The result re-keyed by `key`, optionally reduced to the `value` column.
    ///
    /// For inserts, `key` names the generated-key column and the id is returned.
    pub fn result_by(&mut self, key: &str, value: Option<&str>) -> OrmResult<Outcome> {
        let id_column = if self.kind == QueryKind::Insert { key } else { "id" };
        self.ensure_executed(id_column)?;

        let cursor = match self.result_slot() {
            Some(ExecResult::InsertId(id)) => return Ok(Outcome::InsertId(*id)),
            Some(ExecResult::Affected(n)) => return Ok(Outcome::Affected(*n)),
            Some(ExecResult::Cursor(cursor)) => cursor,
            None => return Ok(Outcome::Rows(Vec::new())),
        };

        let key_of = |row: &Row| row.get(key).map(Value::to_key).unwrap_or_default();
        match value {
            Some(column) => {
                let mut pairs = IndexMap::new();
                for row in cursor.by_ref() {
                    let v = row.get(column).cloned().unwrap_or_default();
                    pairs.insert(key_of(&row), v);
                }
                Ok(Outcome::Pairs(pairs))
            }
            None => {
                let mut keyed = IndexMap::new();
                for row in cursor.by_ref() {
                    keyed.insert(key_of(&row), row);
                }
                Ok(Outcome::Keyed(keyed))
            }
        }
    }

    /// Take the single-pass cursor, executing first if needed.
    ///
    /// Scalar results yield an empty cursor.
    pub fn cursor(&mut self) -> OrmResult<Cursor> {
        self.ensure_executed("id")?;
        Ok(match self.result_slot().take() {
            Some(ExecResult::Cursor(cursor)) => cursor,
            Some(other) => {
                *self.result_slot() = Some(other);
                Cursor::default()
            }
            None => Cursor::default(),
        })
    }

    /// All fetched rows.
    pub fn rows(&mut self) -> OrmResult<Vec<Row>> {
        Ok(self.result()?.into_rows())
    }

    /// First column of the first row.
    pub fn scalar(&mut self) -> OrmResult<Option<Value>> {
        Ok(self
            .rows()?
            .into_iter()
            .next()
            .and_then(|row| row.into_values().next()))
    }
}
