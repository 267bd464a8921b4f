use super::types::{QueryContext, QueryMonitor, QueryResult, QueryType};
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

/// One profiled statement.
#[derive(Debug, Clone)]
pub struct ProfileEntry {
    /// Profiling group active when the statement ran.
    pub group: String,
    pub sql: String,
    pub params: Vec<Value>,
    pub query_type: QueryType,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub result: QueryResult,
}

/// Records every statement, grouped under a switchable group name.
#[derive(Debug)]
pub struct ProfileMonitor {
    group: Mutex<String>,
    entries: Mutex<Vec<ProfileEntry>>,
}

impl ProfileMonitor {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: Mutex::new(group.into()),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Statements recorded from now on belong to `group`.
    pub fn set_group(&self, group: impl Into<String>) {
        if let Ok(mut current) = self.group.lock() {
            *current = group.into();
        }
    }

    /// All recorded statements, in execution order.
    pub fn entries(&self) -> Vec<ProfileEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded statements of one group.
    pub fn group(&self, group: &str) -> Vec<ProfileEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.group == group)
            .collect()
    }

    /// SQL text of every recorded statement.
    pub fn statements(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.sql).collect()
    }

    /// Number of recorded statements of a given type.
    pub fn count(&self, query_type: QueryType) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.query_type == query_type)
            .count()
    }

    pub fn total_duration(&self) -> Duration {
        self.entries().iter().map(|e| e.duration).sum()
    }

    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for ProfileMonitor {
    fn default() -> Self {
        Self::new("default")
    }
}

impl QueryMonitor for ProfileMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        let group = self
            .group
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default();
        let elapsed = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        let entry = ProfileEntry {
            group,
            sql: ctx.sql.clone(),
            params: ctx.params.clone(),
            query_type: ctx.query_type,
            started_at: Utc::now() - elapsed,
            duration,
            result: result.clone(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
