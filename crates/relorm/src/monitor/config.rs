use crate::config::ConnectionConfig;
use std::time::Duration;

/// Whether a connection reports to its monitor, and what counts as slow.
///
/// Monitoring is off unless enabled.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    pub monitoring_enabled: bool,
    /// Statements running longer are also reported through `on_slow_query`.
    pub slow_query_threshold: Option<Duration>,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings taken from a connection's `profile` and `slow_query_ms`.
    pub fn from_connection(config: &ConnectionConfig) -> Self {
        Self {
            monitoring_enabled: config.profile,
            slow_query_threshold: config.slow_query_ms.map(Duration::from_millis),
        }
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }
}
