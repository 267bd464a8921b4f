mod common;

use common::fixture;
use relorm::{Field, OrmError, QueryType, Value};
use serde_json::{Map as JsonMap, json};

fn junction_tags(fx: &common::Fixture, post_id: i64) -> Vec<(i64, i64)> {
    let mut query = fx.db.select();
    query
        .from("post_tag")
        .where_("post_id", post_id)
        .order("id", "asc");
    query
        .rows()
        .unwrap()
        .into_iter()
        .map(|row| (row["id"].to_int(), row["tag_id"].to_int()))
        .collect()
}

#[test]
fn insert_then_reload() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    assert!(!post.loaded());

    post.set("title", "fresh").set("author", json!({"id": 2}));
    post.set("ignored", Value::Null.to_json());
    post.save().unwrap();

    assert!(post.loaded());
    assert_eq!(post.id(), Value::Int(4));
    assert_eq!(post.original("user_id"), Value::Int(2));
    assert_eq!(post.original("title"), Value::from("fresh"));

    let author = post.get("author").unwrap().and_then(Field::into_one).unwrap();
    assert_eq!(author.column("name"), Value::from("bob"));

    let insert = fx
        .profile
        .entries()
        .into_iter()
        .find(|e| e.query_type == QueryType::Insert)
        .unwrap();
    assert_eq!(
        insert.sql,
        "INSERT INTO \"posts\" (\"title\", \"user_id\") VALUES (?, ?)"
    );
}

#[test]
fn update_loaded_entity() {
    let fx = fixture();
    let mut user = fx.orm.entity("user").unwrap();
    assert!(user.load(1).unwrap());

    user.data(json!({"name": "anne", "settings": {"theme": "light"}, "bogus": 1}));
    assert_eq!(user.payload().get("name"), Some(&json!("anne")));
    assert_eq!(user.original("name"), Value::from("ann"));
    user.save().unwrap();

    assert_eq!(fx.statements_on("users", QueryType::Update), 1);
    assert_eq!(user.original("name"), Value::from("anne"));
    assert_eq!(
        user.original("settings"),
        Value::Json(json!({"theme": "light"}))
    );

    // nothing staged: no UPDATE is issued
    user.save().unwrap();
    assert_eq!(fx.statements_on("users", QueryType::Update), 1);
}

#[test]
fn save_with_payload_id_updates_that_row() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.set("id", 3).set("title", "retitled");
    post.save().unwrap();

    assert!(post.loaded());
    assert_eq!(post.id(), Value::Int(3));
    assert_eq!(post.original("title"), Value::from("retitled"));
    assert_eq!(fx.profile.count(QueryType::Insert), 0);
}

#[test]
fn save_with_unknown_payload_id_skips_junctions() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.set("id", 99)
        .set("title", "ghost")
        .set("tags", json!([1]));
    post.save().unwrap();

    assert!(!post.loaded());
    assert_eq!(fx.statements_on("posts", QueryType::Update), 1);
    assert_eq!(fx.statements_on("post_tag", QueryType::Select), 0);
    assert_eq!(fx.statements_on("post_tag", QueryType::Delete), 0);
    assert_eq!(fx.statements_on("post_tag", QueryType::Insert), 0);
    assert!(junction_tags(&fx, 99).is_empty());
}

#[test]
fn load_miss_keeps_entity_unloaded() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    assert!(!post.load(42).unwrap());
    assert!(!post.loaded());
    assert!(post.get("title").unwrap().is_none());

    post.set_loaded(Some(true));
    assert!(post.loaded());
    post.set_loaded(None);
    assert!(!post.loaded());
}

#[test]
fn staged_values_shadow_loaded_ones() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.load([("title", "second")]).unwrap();
    post.set("title", "draft");

    let title = post.get("title").unwrap().and_then(Field::into_value);
    assert_eq!(title, Some(Value::from("draft")));
    assert_eq!(post.original("title"), Value::from("second"));

    post.clear();
    assert!(!post.loaded());
    assert!(post.payload().is_empty());
}

#[test]
fn reordered_pivot_list_rewrites_rows_by_position() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.load(3).unwrap();

    post.set("tags", json!([1, 2]));
    post.save().unwrap();
    assert_eq!(fx.statements_on("post_tag", QueryType::Delete), 0);
    assert_eq!(fx.statements_on("post_tag", QueryType::Insert), 2);
    let rows = junction_tags(&fx, 3);
    assert_eq!(rows.iter().map(|r| r.1).collect::<Vec<_>>(), [1, 2]);

    fx.profile.reset();
    post.set("tags", json!([2, 1]));
    post.save().unwrap();
    assert_eq!(fx.statements_on("post_tag", QueryType::Delete), 2);
    assert_eq!(fx.statements_on("post_tag", QueryType::Insert), 2);

    // same junction row ids, swapped targets
    let reordered = junction_tags(&fx, 3);
    assert_eq!(reordered, [(rows[0].0, 2), (rows[1].0, 1)]);
}

#[test]
fn shorter_pivot_list_drops_trailing_rows() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.load(1).unwrap();

    post.set("tags", json!([{"id": 3, "pivot": {"role": "main", "bogus": 1}}]));
    post.save().unwrap();

    let mut query = fx.db.select();
    query.from("post_tag").where_("post_id", 1);
    let rows = query.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], Value::Int(1));
    assert_eq!(rows[0]["tag_id"], Value::Int(3));
    assert_eq!(rows[0]["role"], Value::from("main"));
}

#[test]
fn add_and_remove_pivot_members() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.load(2).unwrap();

    let mut pivot = JsonMap::new();
    pivot.insert("role".to_string(), json!("extra"));
    post.add("tags", 3, pivot).unwrap();
    post.add("tags", 1, JsonMap::new()).unwrap();
    assert_eq!(junction_tags(&fx, 2).len(), 2);

    post.remove("tags", Some(Value::Int(3))).unwrap();
    let rows = junction_tags(&fx, 2);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, 1);

    post.remove("tags", None).unwrap();
    assert!(junction_tags(&fx, 2).is_empty());

    // unknown relations are ignored
    post.add("nope", 1, JsonMap::new()).unwrap();
    post.remove("nope", None).unwrap();
}

#[test]
fn junction_writes_require_a_loaded_entity() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    let err = post.add("tags", 1, JsonMap::new()).unwrap_err();
    assert!(matches!(err, OrmError::NotLoaded(_)));
    let err = post.remove("tags", None).unwrap_err();
    assert!(matches!(err, OrmError::NotLoaded(_)));
}

#[test]
fn set_relation_creates_its_set_on_first_add() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.load(1).unwrap();
    assert_eq!(post.original("label_set"), Value::Int(0));

    let mut pivot = JsonMap::new();
    pivot.insert("weight".to_string(), json!(5));
    post.add("labels", 1, pivot).unwrap();

    let set_id = post.original("label_set");
    assert_ne!(set_id, Value::Int(0));

    let labels = post
        .get("labels")
        .unwrap()
        .and_then(Field::into_many)
        .unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].column("name"), Value::from("rust"));
    assert_eq!(labels[0].pivot("weight"), Value::Int(5));

    post.set("labels", json!([2, 3]));
    post.save().unwrap();
    assert_eq!(post.original("label_set"), set_id);

    let mut members = fx.db.select();
    members
        .from("post_labels")
        .where_("id", set_id.clone())
        .where_op("tag_id", "!=", 0)
        .order("tag_id", "asc");
    let members: Vec<i64> = members
        .rows()
        .unwrap()
        .iter()
        .map(|row| row["tag_id"].to_int())
        .collect();
    assert_eq!(members, [2, 3]);

    post.remove("labels", Some(Value::Int(2))).unwrap();
    let labels = post
        .call("labels", &[])
        .unwrap()
        .and_then(Field::into_many)
        .unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].column("name"), Value::from("orm"));
}

#[test]
fn removing_from_an_absent_set_is_a_no_op() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.load(2).unwrap();
    post.remove("labels", None).unwrap();
    assert_eq!(fx.statements_on("post_labels", QueryType::Delete), 0);
}

#[test]
fn delete_removes_row_and_junction_rows() {
    let fx = fixture();
    let mut post = fx.orm.entity("post").unwrap();
    post.load(1).unwrap();
    post.delete().unwrap();

    assert!(!post.loaded());
    assert!(junction_tags(&fx, 1).is_empty());
    let posts = fx.orm.mapper("post").unwrap();
    assert!(posts.one(1).unwrap().is_none());
    assert_eq!(posts.count().unwrap(), 2);
}
