mod common;

use common::fixture;
use relorm::{Field, FieldId, Lookup, Record, Value};
use serde_json::json;

fn one(field: Option<Field>) -> Record {
    field.and_then(Field::into_one).expect("expected one record")
}

fn many(field: Option<Field>) -> Vec<Record> {
    field.and_then(Field::into_many).expect("expected a record list")
}

#[test]
fn nested_eager_aliases_follow_the_traversal_path() {
    let fx = fixture();
    let posts = fx.orm.mapper("post").unwrap();
    posts.with("author");
    posts
        .scope("author", |author| {
            author.with("team");
        })
        .unwrap();

    let (sql, params) = posts.query().unwrap().compile();
    assert!(params.is_empty());
    assert!(sql.starts_with("SELECT \"post\".\"id\" AS \"post:id\""));
    assert!(sql.contains("\"post:author\".\"name\" AS \"post:author:name\""));
    assert!(sql.contains("\"post:author:team\".\"name\" AS \"post:author:team:name\""));
    assert!(sql.contains(
        "LEFT JOIN \"users\" AS \"post:author\" ON \"post:author\".\"id\" = \"post\".\"user_id\""
    ));
    assert!(sql.contains(
        "LEFT JOIN \"teams\" AS \"post:author:team\" ON \"post:author:team\".\"id\" = \"post:author\".\"team_id\""
    ));

    let aliases: Vec<&str> = sql
        .split(" AS ")
        .skip(1)
        .filter_map(|rest| rest.split('"').nth(1))
        .filter(|alias| alias.ends_with(":name"))
        .collect();
    assert_eq!(aliases, ["post:author:name", "post:author:team:name"]);
}

#[test]
fn eager_relations_reuse_joined_columns() {
    let fx = fixture();
    let posts = fx.orm.mapper("post").unwrap();
    posts.with("author").sort("id", "asc");
    posts
        .scope("author", |author| {
            author.with("team");
        })
        .unwrap();

    let mut records: Vec<Record> = posts.all().unwrap().collect();
    assert_eq!(records.len(), 3);
    assert_eq!(fx.selects(), 1);

    let mut author = one(records[0].value("author").unwrap());
    assert_eq!(author.prefix(), "post:author:");
    assert_eq!(author.column("name"), Value::from("ann"));
    let team = one(author.value("team").unwrap());
    assert_eq!(team.column("name"), Value::from("core"));

    // bob has no team: the joined columns are all null
    let mut author = one(records[2].value("author").unwrap());
    assert_eq!(author.column("name"), Value::from("bob"));
    assert!(author.value("team").unwrap().is_none());

    assert_eq!(fx.selects(), 1);
}

#[test]
fn lazy_relations_query_once_per_record() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();
    let mut ann = users.one(1).unwrap().unwrap();
    assert_eq!(ann.column("active"), Value::Bool(true));
    assert_eq!(ann.column("settings"), Value::Json(json!({"theme": "dark"})));

    let profile = one(ann.value("profile").unwrap());
    assert_eq!(profile.column("bio"), Value::from("hello"));

    let before = fx.selects();
    let posts = many(ann.value("posts").unwrap());
    assert_eq!(posts.len(), 2);
    let again = many(ann.value("posts").unwrap());
    assert_eq!(again.len(), 2);
    assert_eq!(fx.selects(), before + 1);

    let mut first = posts.into_iter().next().unwrap();
    let author = one(first.value("author").unwrap());
    assert_eq!(author.id(), Value::Int(1));

    let mut bob = users.one(2).unwrap().unwrap();
    assert!(bob.value("team").unwrap().is_none());
    assert!(bob.value("nope").unwrap().is_none());
    assert!(ann.field_id("nope").is_none());
}

#[test]
fn pivot_relations_expose_junction_columns() {
    let fx = fixture();
    let posts = fx.orm.mapper("post").unwrap();
    posts
        .scope("tags", |tags| {
            tags.pivot(|p| {
                p.sort("role", "desc");
            });
        })
        .unwrap();

    let mut post = posts.one(1).unwrap().unwrap();
    let tags = many(post.value("tags").unwrap());
    let names: Vec<Value> = tags.iter().map(|t| t.column("name")).collect();
    assert_eq!(names, [Value::from("sql"), Value::from("rust")]);
    assert_eq!(tags[0].pivot("role"), Value::from("secondary"));
    assert_eq!(
        tags[0].field_id("role"),
        Some(FieldId::Pivot("role".to_string()))
    );

    let statement = fx
        .profile
        .statements()
        .into_iter()
        .find(|sql| sql.contains("\"post_tag\""))
        .unwrap();
    assert!(statement.contains(
        "INNER JOIN \"post_tag\" AS \"post:tags:pivot\" ON \"post:tags:pivot\".\"tag_id\" = \"post:tags\".\"id\" AND \"post:tags:pivot\".\"post_id\" = ?"
    ));
    assert!(statement.contains("ORDER BY \"post:tags:pivot\".\"role\" DESC"));
}

#[test]
fn pivot_filters_restrict_junction_rows() {
    let fx = fixture();
    let posts = fx.orm.mapper("post").unwrap();
    posts
        .scope("tags", |tags| {
            tags.pivot(|p| {
                p.filter("role", "primary");
            });
        })
        .unwrap();

    let mut post = posts.one(1).unwrap().unwrap();
    let tags = many(post.value("tags").unwrap());
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].column("name"), Value::from("rust"));
}

#[test]
fn cursor_is_single_pass() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();

    let first: Vec<Record> = users.all().unwrap().collect();
    assert_eq!(first.len(), 2);
    assert_eq!(users.iter().count(), 0);
    assert!(users.records().is_empty());

    users.all().unwrap();
    assert_eq!(users.records().len(), 2);
}

#[test]
fn external_iteration_runs_the_query_on_rewind() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();
    users.sort("name", "asc");

    users.rewind().unwrap();
    assert!(users.valid());
    assert_eq!(users.key(), 0);
    assert_eq!(users.current().unwrap().column("name"), Value::from("ann"));

    users.advance();
    assert!(users.valid());
    assert_eq!(users.key(), 1);
    assert_eq!(users.current().unwrap().column("name"), Value::from("bob"));

    users.advance();
    assert!(!users.valid());
    assert!(users.current().is_none());
}

#[test]
fn filters_sorts_and_windows() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();
    users
        .filter_op("name", "LIKE", "%")
        .sort("name", "DESC")
        .amount(1);

    let names: Vec<Value> = users.all().unwrap().map(|u| u.column("name")).collect();
    assert_eq!(names, [Value::from("bob")]);
    assert_eq!(users.count().unwrap(), 2);

    users.skip(1);
    let names: Vec<Value> = users.all().unwrap().map(|u| u.column("name")).collect();
    assert_eq!(names, [Value::from("ann")]);

    users.amount(0).skip(0).unsort(None);
    users.filter("active", false);
    assert_eq!(users.filters(), ["name", "active"]);
    assert_eq!(users.count().unwrap(), 1);

    users.unfilter(Some("active"));
    assert_eq!(users.count().unwrap(), 2);
    users.unfilter(None);
    assert!(users.filters().is_empty());
}

#[test]
fn filter_groups_and_only() {
    let fx = fixture();
    let posts = fx.orm.mapper("post").unwrap();
    posts.only(["id", "title"]).filter_group(|g| {
        g.where_("post.title", "first").or_where("post.title", "third");
    });

    let (sql, _) = posts.query().unwrap().compile();
    assert!(sql.starts_with(
        "SELECT \"post\".\"id\" AS \"post:id\", \"post\".\"title\" AS \"post:title\" FROM"
    ));
    assert!(sql.contains("WHERE (\"post\".\"title\" = ? OR \"post\".\"title\" = ?)"));
    assert_eq!(posts.count().unwrap(), 2);
}

#[test]
fn one_by_lookup() {
    let fx = fixture();
    let posts = fx.orm.mapper("post").unwrap();

    let post = posts.one([("title", "second")]).unwrap().unwrap();
    assert_eq!(post.id(), Value::Int(2));
    assert!(posts.one(99).unwrap().is_none());

    posts.filter("user_id", 2);
    let post = posts.one(Lookup::Any).unwrap().unwrap();
    assert_eq!(post.column("title"), Value::from("third"));
}

#[test]
fn related_with_overrides_restores_the_window() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();
    let mut ann = users.one(1).unwrap().unwrap();

    let limited = many(
        ann.call("posts", &[Value::Int(1), Value::Null, Value::from("title")])
            .unwrap(),
    );
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].column("title"), Value::from("first"));

    let sorted = many(
        ann.call("posts", &[Value::Null, Value::Null, Value::Json(json!({"title": "desc"}))])
            .unwrap(),
    );
    assert_eq!(sorted[0].column("title"), Value::from("second"));

    let child = users.related_mapper("posts").unwrap().unwrap();
    assert!(child.sorts().is_empty());
    assert_eq!(many(ann.value("posts").unwrap()).len(), 2);
    assert!(ann.call("nope", &[]).unwrap().is_none());
}

#[test]
fn helpers_are_callable_by_name() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();
    users.method("shout", |record, args| {
        let suffix = args.first().map(Value::to_text).unwrap_or_default();
        Ok(Value::from(record.column("name").to_text().to_uppercase() + &suffix))
    });

    let mut ann = users.one(1).unwrap().unwrap();
    assert_eq!(
        ann.field_id("shout"),
        Some(FieldId::Helper("shout".to_string()))
    );
    let shouted = ann.call("shout", &[Value::from("!")]).unwrap();
    assert_eq!(shouted.and_then(Field::into_value), Some(Value::from("ANN!")));
    let shouted = ann.value("shout").unwrap();
    assert_eq!(shouted.and_then(Field::into_value), Some(Value::from("ANN")));
}

#[test]
fn flat_and_hydrate() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();
    let ann = users.one(1).unwrap().unwrap();

    let flat = ann.flat().unwrap();
    assert_eq!(flat.get("name"), Some(&json!("ann")));
    assert_eq!(flat.get("active"), Some(&json!(true)));
    assert_eq!(flat.get("settings"), Some(&json!({"theme": "dark"})));
    assert_eq!(flat.get("posts"), Some(&json!([1, 2])));
    assert!(flat.get("team").is_none());
    assert!(flat.get("profile").is_none());

    let data = json!({"name": "zed", "posts": [1, {"id": 3}], "unknown": 1});
    let mut zed = users.hydrate(data.as_object().unwrap()).unwrap();
    assert_eq!(zed.column("name"), Value::from("zed"));
    assert!(!zed.has_column("unknown"));

    let before = fx.selects();
    let posts = many(zed.value("posts").unwrap());
    let titles: Vec<Value> = posts.iter().map(|p| p.column("title")).collect();
    assert_eq!(titles, [Value::from("first"), Value::from("third")]);
    assert_eq!(fx.selects(), before);
}

#[test]
fn record_display_shows_own_columns() {
    let fx = fixture();
    let posts = fx.orm.mapper("post").unwrap();
    let post = posts.one(3).unwrap().unwrap();
    let text = post.to_string();
    assert!(text.contains("\"title\":\"third\""));
    assert!(!text.contains("post:"));
}

#[test]
fn with_names_outside_relations_select_raw_expressions() {
    let fx = fixture();
    let users = fx.orm.mapper("user").unwrap();
    users.with("UPPER(\"user\".\"name\") AS \"user:loud\"");

    let ann = users.one(1).unwrap().unwrap();
    assert_eq!(ann.raw("loud"), Value::from("ANN"));
}
