use crate::value::Value;
use std::fmt;
use std::time::Duration;

/// Statement kind as read from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, pragmas and anything else.
    Other,
}

impl QueryType {
    /// Leading parentheses are skipped so compiled unions count as selects.
    pub fn from_sql(sql: &str) -> Self {
        let head = sql.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
        let end = head
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(head.len());
        let keyword = &head[..end];
        [
            ("SELECT", QueryType::Select),
            ("INSERT", QueryType::Insert),
            ("UPDATE", QueryType::Update),
            ("DELETE", QueryType::Delete),
        ]
        .into_iter()
        .find(|(word, _)| keyword.eq_ignore_ascii_case(word))
        .map_or(QueryType::Other, |(_, kind)| kind)
    }
}

/// One statement handed to a connection.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub sql: String,
    /// Bound values in `?` order.
    pub params: Vec<Value>,
    pub query_type: QueryType,
    /// Key column the caller asked the insert id for.
    pub id_column: String,
}

impl QueryContext {
    pub fn new(sql: &str, params: &[Value], id_column: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: params.to_vec(),
            query_type: QueryType::from_sql(sql),
            id_column: id_column.to_string(),
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

const ERROR_MESSAGE_LIMIT: usize = 512;

/// What a statement produced, as seen by monitors.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(usize),
    InsertId(i64),
    Affected(u64),
    /// Driver error text, cut after 512 bytes.
    Error(String),
}

impl QueryResult {
    pub fn error(msg: String) -> Self {
        if msg.len() <= ERROR_MESSAGE_LIMIT {
            return Self::Error(msg);
        }
        let cut = super::truncate_sql_bytes(&msg, ERROR_MESSAGE_LIMIT);
        Self::Error(format!("{cut}..."))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::InsertId(id) => write!(f, "insert id {id}"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Observer of every statement a connection executes.
///
/// Monitors are shared across threads behind `Arc`, hence `Send + Sync`.
pub trait QueryMonitor: Send + Sync {
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Runs after every statement, failed ones included.
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// Runs after `on_query_complete` when the connection's slow threshold is exceeded.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
