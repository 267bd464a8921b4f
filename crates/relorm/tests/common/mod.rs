//! Shared fixture: a small blog schema on in-memory SQLite.

#![allow(dead_code)]

use relorm::{
    Database, Dialect, MemoryFinder, Orm, OrmConfig, ProfileMonitor, QueryType, Schema,
    SqliteConnection,
};
use std::rc::Rc;
use std::sync::Arc;

const DDL: &[&str] = &[
    "CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE users (id INTEGER PRIMARY KEY, team_id INTEGER, name TEXT, active INTEGER DEFAULT 1, settings TEXT)",
    "CREATE TABLE profiles (id INTEGER PRIMARY KEY, user_id INTEGER, bio TEXT)",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT, label_set INTEGER DEFAULT 0)",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE post_tag (id INTEGER PRIMARY KEY, post_id INTEGER, tag_id INTEGER, role TEXT)",
    "CREATE TABLE post_labels (id INTEGER, tag_id INTEGER, weight INTEGER)",
];

const SEED: &[&str] = &[
    "INSERT INTO teams (id, name) VALUES (1, 'core')",
    "INSERT INTO users (id, team_id, name, active, settings) VALUES (1, 1, 'ann', 1, '{\"theme\":\"dark\"}')",
    "INSERT INTO users (id, team_id, name, active, settings) VALUES (2, NULL, 'bob', 0, NULL)",
    "INSERT INTO profiles (id, user_id, bio) VALUES (1, 1, 'hello')",
    "INSERT INTO posts (id, user_id, title) VALUES (1, 1, 'first')",
    "INSERT INTO posts (id, user_id, title) VALUES (2, 1, 'second')",
    "INSERT INTO posts (id, user_id, title) VALUES (3, 2, 'third')",
    "INSERT INTO tags (id, name) VALUES (1, 'rust')",
    "INSERT INTO tags (id, name) VALUES (2, 'sql')",
    "INSERT INTO tags (id, name) VALUES (3, 'orm')",
    "INSERT INTO post_tag (id, post_id, tag_id, role) VALUES (1, 1, 1, 'primary')",
    "INSERT INTO post_tag (id, post_id, tag_id, role) VALUES (2, 1, 2, 'secondary')",
];

pub fn finder() -> MemoryFinder {
    MemoryFinder::new()
        .json(
            "user",
            r#"{
                "table": "users",
                "columns": {"id": "int", "team_id": "int", "name": "string", "active": "boolean", "settings": "json"},
                "relations": {
                    "profile": ["profile", "one", "user_id"],
                    "posts": ["post", "many", "user_id"],
                    "team": ["team", "belongs", "team_id"]
                }
            }"#,
        )
        .json(
            "post",
            r#"{
                "table": "posts",
                "columns": {"id": "int", "user_id": "int", "title": "string", "label_set": "int"},
                "relations": {
                    "author": ["user", "belongs", "user_id"],
                    "tags": ["tag", "pivot", "post_tag", "post_id", "tag_id", ["role"]],
                    "labels": ["tag", "set", "post_labels", "label_set", "tag_id", ["weight"]]
                }
            }"#,
        )
        .toml(
            "team",
            r#"
            table = "teams"
            [columns]
            id = "int"
            name = "string"
            "#,
        )
        .json(
            "profile",
            r#"{"table": "profiles", "columns": {"id": "int", "user_id": "int", "bio": "string"}}"#,
        )
        .json(
            "tag",
            r#"{"table": "tags", "columns": {"id": "int", "name": "string"}}"#,
        )
}

pub struct Fixture {
    pub orm: Orm,
    pub db: Database,
    pub profile: Arc<ProfileMonitor>,
}

impl Fixture {
    /// Statements of one type touching `table`.
    pub fn statements_on(&self, table: &str, query_type: QueryType) -> usize {
        let quoted = format!("\"{table}\"");
        self.profile
            .entries()
            .iter()
            .filter(|e| e.query_type == query_type && e.sql.contains(&quoted))
            .count()
    }

    pub fn selects(&self) -> usize {
        self.profile.count(QueryType::Select)
    }
}

pub fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("relorm=debug")
        .with_test_writer()
        .try_init();

    let profile = Arc::new(ProfileMonitor::new("setup"));
    let connection = SqliteConnection::in_memory(Dialect::Sqlite).with_monitor_arc(profile.clone());
    let db = Database::new(Rc::new(connection));
    for statement in DDL.iter().chain(SEED) {
        db.query(*statement, Vec::new()).execute("id").unwrap();
    }

    let orm = Orm::new(Schema::new(finder()), OrmConfig::default());
    orm.attach("default", db.clone());

    profile.reset();
    profile.set_group("test");
    Fixture { orm, db, profile }
}
