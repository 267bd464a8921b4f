//! Connection abstraction and the SQLite implementation.
//!
//! A [`Connection`] executes one compiled statement and classifies what came
//! back: a row cursor for reads, the generated id for inserts, or the number
//! of affected rows for everything else.

use crate::config::{ConnectionConfig, Dialect};
use crate::error::{OrmError, OrmResult};
use crate::monitor::{MonitorConfig, QueryContext, QueryMonitor, QueryResult, TracingMonitor};
use crate::query::QueryKind;
use crate::value::{Row, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// What the caller gets back from [`Connection::execute`].
#[derive(Debug, Clone)]
pub enum ExecResult {
    /// Rows of a read statement.
    Cursor(Cursor),
    /// Id generated by an insert.
    InsertId(i64),
    /// Rows changed by any other statement.
    Affected(u64),
}

/// How a statement's result is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Cursor,
    InsertId,
    Affected,
}

impl ResultShape {
    /// `select` statements, or literal statements starting with `SELECT`, yield
    /// a cursor; `insert` statements, or literal statements starting with
    /// `INSERT`, yield the generated id; everything else yields a row count.
    pub fn classify(kind: QueryKind, sql: &str) -> Self {
        let head = sql.trim_start().get(..6).unwrap_or("");
        match kind {
            QueryKind::Select => ResultShape::Cursor,
            QueryKind::Insert => ResultShape::InsertId,
            QueryKind::Query if head.eq_ignore_ascii_case("SELECT") => ResultShape::Cursor,
            QueryKind::Query if head.eq_ignore_ascii_case("INSERT") => ResultShape::InsertId,
            _ => ResultShape::Affected,
        }
    }
}

/// A single-pass, forward-only row cursor.
///
/// Rows are handed out once; after the cursor is exhausted it stays empty.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    columns: Vec<String>,
    rows: VecDeque<Row>,
}

impl Cursor {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch the next row.
    pub fn fetch(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetch()
    }
}

/// A database handle able to execute compiled statements.
pub trait Connection {
    /// Identifier quote character of this connection's dialect.
    fn quote(&self) -> char;

    /// Execute `sql` with positional `params`.
    ///
    /// `id_column` names the generated key of an insert for drivers that
    /// need it; SQLite reads the rowid and ignores it.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        kind: QueryKind,
        id_column: &str,
    ) -> OrmResult<ExecResult>;
}

/// A [`Connection`] backed by rusqlite.
///
/// The underlying handle is opened lazily on first execution.
pub struct SqliteConnection {
    config: ConnectionConfig,
    handle: RefCell<Option<rusqlite::Connection>>,
    monitor: Option<Arc<dyn QueryMonitor>>,
    monitor_config: MonitorConfig,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("config", &self.config)
            .field("open", &self.handle.borrow().is_some())
            .field("monitor_config", &self.monitor_config)
            .finish()
    }
}

impl SqliteConnection {
    /// Create a connection from config.
    ///
    /// When the config enables profiling, executions are reported to a
    /// [`TracingMonitor`] unless another monitor is attached.
    pub fn new(config: ConnectionConfig) -> Self {
        let monitor_config = MonitorConfig::from_connection(&config);
        let monitor: Option<Arc<dyn QueryMonitor>> = if config.profile {
            Some(Arc::new(TracingMonitor::new()))
        } else {
            None
        };
        Self {
            config,
            handle: RefCell::new(None),
            monitor,
            monitor_config,
        }
    }

    /// An in-memory database with the given dialect.
    pub fn in_memory(dialect: Dialect) -> Self {
        Self::new(ConnectionConfig {
            dialect,
            ..ConnectionConfig::default()
        })
    }

    /// Attach a monitor and enable profiling.
    pub fn with_monitor(mut self, monitor: impl QueryMonitor + 'static) -> Self {
        self.monitor = Some(Arc::new(monitor));
        self.monitor_config = self.monitor_config.enable_monitoring();
        self
    }

    /// Attach a shared monitor and enable profiling.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self.monitor_config = self.monitor_config.enable_monitoring();
        self
    }

    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn open(&self) -> OrmResult<()> {
        if self.handle.borrow().is_some() {
            return Ok(());
        }
        let conn = if self.config.path.is_empty() || self.config.path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&self.config.path)
        }
        .map_err(|e| OrmError::Connection(e.to_string()))?;
        tracing::debug!(target: "relorm", path = %self.config.path, "opened sqlite connection");
        *self.handle.borrow_mut() = Some(conn);
        Ok(())
    }

    fn run(&self, sql: &str, params: &[Value], shape: ResultShape) -> OrmResult<ExecResult> {
        self.open()?;
        let guard = self.handle.borrow();
        let conn = guard
            .as_ref()
            .ok_or_else(|| OrmError::Connection("connection is not open".to_string()))?;

        let mut stmt = conn.prepare(sql)?;
        let bound = rusqlite::params_from_iter(params.iter().map(Value::to_sqlite));

        match shape {
            ResultShape::Cursor => {
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(str::to_string).collect();
                let mut rows = stmt.query(bound)?;
                let mut fetched = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = Row::with_capacity(columns.len());
                    for (idx, name) in columns.iter().enumerate() {
                        values.insert(name.clone(), Value::from_sqlite(row.get_ref(idx)?));
                    }
                    fetched.push(values);
                }
                Ok(ExecResult::Cursor(Cursor::new(columns, fetched)))
            }
            ResultShape::InsertId => {
                stmt.execute(bound)?;
                Ok(ExecResult::InsertId(conn.last_insert_rowid()))
            }
            ResultShape::Affected => {
                let affected = stmt.execute(bound)?;
                Ok(ExecResult::Affected(affected as u64))
            }
        }
    }
}

impl Connection for SqliteConnection {
    fn quote(&self) -> char {
        self.config.dialect.quote()
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        kind: QueryKind,
        id_column: &str,
    ) -> OrmResult<ExecResult> {
        let shape = ResultShape::classify(kind, sql);
        let monitor = self
            .monitor
            .as_ref()
            .filter(|_| self.monitor_config.monitoring_enabled);

        let Some(monitor) = monitor else {
            return self.run(sql, params, shape);
        };

        let ctx = QueryContext::new(sql, params, id_column);
        monitor.on_query_start(&ctx);
        let start = Instant::now();
        let result = self.run(sql, params, shape);
        let duration = start.elapsed();

        let reported = match &result {
            Ok(ExecResult::Cursor(cursor)) => QueryResult::Rows(cursor.remaining()),
            Ok(ExecResult::InsertId(id)) => QueryResult::InsertId(*id),
            Ok(ExecResult::Affected(n)) => QueryResult::Affected(*n),
            Err(e) => QueryResult::error(e.to_string()),
        };
        monitor.on_query_complete(&ctx, duration, &reported);
        if let Some(threshold) = self.monitor_config.slow_query_threshold {
            if duration > threshold {
                monitor.on_slow_query(&ctx, duration);
            }
        }

        result
    }
}
