use super::truncate_sql_bytes;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use std::time::Duration;

/// Ignores every statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}

/// Reports statements as `tracing` events under target `relorm.sql`.
///
/// Completed statements are DEBUG events, slow ones WARN.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// SQL longer than this many bytes is cut in events; `None` keeps it whole.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            max_sql_length: Some(200),
        }
    }
}

impl TracingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_sql_length(mut self, len: Option<usize>) -> Self {
        self.max_sql_length = len;
        self
    }

    pub(crate) fn display_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query_start(&self, ctx: &QueryContext) {
        tracing::trace!(
            target: "relorm.sql",
            query_type = ?ctx.query_type,
            params = ctx.param_count(),
            sql = %self.display_sql(&ctx.sql),
            "executing"
        );
    }

    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        tracing::debug!(
            target: "relorm.sql",
            query_type = ?ctx.query_type,
            params = ctx.param_count(),
            elapsed = ?duration,
            result = %result,
            sql = %self.display_sql(&ctx.sql),
        );
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        tracing::warn!(
            target: "relorm.sql",
            elapsed = ?duration,
            sql = %self.display_sql(&ctx.sql),
            "slow query"
        );
    }
}
