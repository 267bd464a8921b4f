//! Query monitoring and profiling.
//!
//! A [`QueryMonitor`] attached to a connection is told when each statement
//! starts and completes. Monitors observe only: they never change what is
//! executed or what is returned.
//!
//! - [`TracingMonitor`]: emits `tracing` events (target `relorm.sql`)
//! - [`ProfileMonitor`]: records every statement with its parameters and timing
//!
//! # Example
//!
//! ```rust,ignore
//! use relorm::monitor::ProfileMonitor;
//! use relorm::{Dialect, SqliteConnection};
//! use std::sync::Arc;
//!
//! let profile = Arc::new(ProfileMonitor::new("request"));
//! let conn = SqliteConnection::in_memory(Dialect::Backtick).with_monitor_arc(profile.clone());
//! // ... run queries ...
//! for entry in profile.entries() {
//!     println!("{:?} {}", entry.duration, entry.sql);
//! }
//! ```

mod config;
mod monitors;
mod profile;
mod types;

#[cfg(test)]
mod tests;

pub use config::MonitorConfig;
pub use monitors::{NoopMonitor, TracingMonitor};
pub use profile::{ProfileEntry, ProfileMonitor};
pub use types::{QueryContext, QueryMonitor, QueryResult, QueryType};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
