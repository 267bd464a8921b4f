use super::*;
use crate::config::Dialect;
use crate::connection::{Connection, SqliteConnection};
use crate::query::QueryKind;
use crate::value::Value;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn query_type_detection() {
    assert_eq!(QueryType::from_sql("SELECT * FROM users"), QueryType::Select);
    assert_eq!(QueryType::from_sql("  select * FROM users"), QueryType::Select);
    assert_eq!(
        QueryType::from_sql("(SELECT 1) UNION (SELECT 2)"),
        QueryType::Select
    );
    assert_eq!(
        QueryType::from_sql("INSERT INTO users (name) VALUES (?)"),
        QueryType::Insert
    );
    assert_eq!(QueryType::from_sql("UPDATE users SET name = ?"), QueryType::Update);
    assert_eq!(
        QueryType::from_sql("DELETE FROM users WHERE id = ?"),
        QueryType::Delete
    );
    assert_eq!(
        QueryType::from_sql("CREATE TABLE users (id INT)"),
        QueryType::Other
    );
}

#[test]
fn tracing_monitor_cuts_long_sql() {
    let monitor = TracingMonitor::new().max_sql_length(Some(10));
    assert_eq!(monitor.display_sql("SELECT * FROM users"), "SELECT * F...");
    assert_eq!(monitor.display_sql("SELECT 1"), "SELECT 1");

    let monitor = monitor.max_sql_length(None);
    assert_eq!(monitor.display_sql("SELECT * FROM users"), "SELECT * FROM users");
}

#[test]
fn monitor_config_from_connection() {
    let config = crate::config::ConnectionConfig {
        profile: true,
        slow_query_ms: Some(250),
        ..Default::default()
    };
    let monitor = MonitorConfig::from_connection(&config);
    assert!(monitor.monitoring_enabled);
    assert_eq!(monitor.slow_query_threshold, Some(Duration::from_millis(250)));
    assert!(!MonitorConfig::new().monitoring_enabled);
}

#[test]
fn error_result_truncation() {
    let long = "x".repeat(1000);
    let QueryResult::Error(msg) = QueryResult::error(long) else {
        panic!("expected error");
    };
    assert_eq!(msg.len(), 515);
}

#[test]
fn profile_records_sql_and_params() {
    let profile = Arc::new(ProfileMonitor::new("setup"));
    let conn = SqliteConnection::in_memory(Dialect::Backtick).with_monitor_arc(profile.clone());

    conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[], QueryKind::Query, "id")
        .unwrap();
    profile.set_group("work");
    conn.execute(
        "INSERT INTO t (v) VALUES (?)",
        &[Value::from("a")],
        QueryKind::Insert,
        "id",
    )
    .unwrap();

    let entries = profile.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].group, "setup");
    assert_eq!(entries[1].params, vec![Value::from("a")]);
    assert_eq!(entries[1].result, QueryResult::InsertId(1));
    assert_eq!(profile.group("work").len(), 1);
    assert_eq!(profile.count(QueryType::Insert), 1);
}

#[test]
fn profiling_does_not_alter_errors() {
    let profile = Arc::new(ProfileMonitor::default());
    let conn = SqliteConnection::in_memory(Dialect::Backtick).with_monitor_arc(profile.clone());

    let err = conn
        .execute("SELECT * FROM nope", &[], QueryKind::Select, "id")
        .unwrap_err();
    assert!(err.is_database());
    assert!(profile.entries()[0].result.is_error());
}

#[test]
fn slow_queries_reach_the_monitor() {
    #[derive(Default)]
    struct SlowCounter(std::sync::atomic::AtomicUsize);

    impl QueryMonitor for SlowCounter {
        fn on_query_complete(&self, _: &QueryContext, _: Duration, _: &QueryResult) {}

        fn on_slow_query(&self, _: &QueryContext, _: Duration) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    let counter = Arc::new(SlowCounter::default());
    let conn = SqliteConnection::in_memory(Dialect::Backtick)
        .with_monitor_arc(counter.clone())
        .with_monitor_config(
            MonitorConfig::new()
                .enable_monitoring()
                .with_slow_query_threshold(Duration::ZERO),
        );
    conn.execute("SELECT 1", &[], QueryKind::Query, "id").unwrap();
    assert_eq!(counter.0.load(std::sync::atomic::Ordering::Relaxed), 1);

    let silent = SqliteConnection::in_memory(Dialect::Backtick).with_monitor(NoopMonitor);
    assert!(silent.execute("SELECT 1", &[], QueryKind::Query, "id").is_ok());
}
