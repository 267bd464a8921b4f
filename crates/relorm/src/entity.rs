//! Active-record style wrapper around one row.
//!
//! An [`Entity`] is either unloaded or holds the [`Record`] of its row.
//! Assignments are staged with [`Entity::data`] / [`Entity::set`] and
//! written by [`Entity::save`], which also synchronizes junction rows of
//! `pivot` and `set` relations.
//!
//! ```ignore
//! let mut post = orm.entity("post")?;
//! post.set("title", "Hello").set("author", 3).set("tags", json!([1, 2]));
//! post.save()?;
//! assert!(post.loaded());
//!
//! post.add("tags", 5, JsonMap::new())?;
//! post.delete()?;
//! ```

use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::mapper::{Lookup, Mapper};
use crate::record::{Field, Record};
use crate::schema::{Descriptor, Relation};
use crate::value::{Row, Value, json_id};
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::rc::Rc;

/// A desired junction member: target id plus extra junction columns.
#[derive(Debug, Clone)]
struct JunctionItem {
    id: Value,
    pivot: JsonMap<String, JsonValue>,
}

/// One row of an entity, loaded or about to be created.
#[derive(Debug)]
pub struct Entity {
    name: String,
    descriptor: Rc<Descriptor>,
    database: Database,
    mapper: Mapper,
    record: Option<Record>,
    staged: JsonMap<String, JsonValue>,
    loaded: Option<bool>,
}

impl Entity {
    /// An unloaded entity writing through `mapper`'s connection.
    pub fn new(mapper: Mapper) -> Self {
        Self {
            name: mapper.name(),
            descriptor: mapper.descriptor(),
            database: mapper.database().clone(),
            mapper,
            record: None,
            staged: JsonMap::new(),
            loaded: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Load by id or column filters. Returns whether a row was found; on a
    /// miss the entity keeps its current state.
    pub fn load(&mut self, lookup: impl Into<Lookup>) -> OrmResult<bool> {
        match self.mapper.one(lookup)? {
            Some(record) => {
                self.record = Some(record);
                Ok(true)
            }
            None => {
                tracing::debug!(target: "relorm", entity = %self.name, "load found no row");
                Ok(false)
            }
        }
    }

    /// Stage every entry of a JSON object. Nulls are ignored.
    pub fn data(&mut self, fields: JsonValue) -> &mut Self {
        if let JsonValue::Object(fields) = fields {
            for (name, value) in fields {
                self.set(name, value);
            }
        }
        self
    }

    /// Stage one assignment. Nulls are ignored.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> &mut Self {
        let value = value.into();
        if !value.is_null() {
            self.staged.insert(name.into(), value);
        }
        self
    }

    /// Loaded column values overlaid with staged assignments.
    pub fn payload(&self) -> JsonMap<String, JsonValue> {
        let mut payload = JsonMap::new();
        if let Some(record) = &self.record {
            for column in self.descriptor.columns.keys() {
                if record.has_column(column) {
                    payload.insert(column.clone(), record.column(column).to_json());
                }
            }
        }
        for (name, value) in &self.staged {
            payload.insert(name.clone(), value.clone());
        }
        payload
    }

    /// Loaded value of a column, ignoring staged assignments.
    pub fn original(&self, name: &str) -> Value {
        self.record
            .as_ref()
            .map(|record| record.column(name))
            .unwrap_or_default()
    }

    pub fn loaded(&self) -> bool {
        self.loaded.unwrap_or(self.record.is_some())
    }

    /// Override the loaded flag; `None` derives it from the record again.
    pub fn set_loaded(&mut self, loaded: Option<bool>) -> &mut Self {
        self.loaded = loaded;
        self
    }

    /// Back to unloaded, discarding staged assignments.
    pub fn clear(&mut self) -> &mut Self {
        self.record = None;
        self.staged.clear();
        self.loaded = None;
        self
    }

    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    pub fn record_mut(&mut self) -> Option<&mut Record> {
        self.record.as_mut()
    }

    /// Id of the loaded row; `Null` when unloaded.
    pub fn id(&self) -> Value {
        self.record.as_ref().map(Record::id).unwrap_or_default()
    }

    /// Staged value, else the loaded record's field.
    pub fn get(&mut self, name: &str) -> OrmResult<Option<Field>> {
        if let Some(value) = self.staged.get(name) {
            return Ok(Some(Field::Value(Value::from(value))));
        }
        match &mut self.record {
            Some(record) => record.value(name),
            None => Ok(None),
        }
    }

    /// Forward a helper or relation call to the loaded record.
    pub fn call(&mut self, name: &str, args: &[Value]) -> OrmResult<Option<Field>> {
        match &mut self.record {
            Some(record) => record.call(name, args),
            None => Ok(None),
        }
    }

    fn require_record(&self, action: &str) -> OrmResult<&Record> {
        self.record
            .as_ref()
            .ok_or_else(|| OrmError::NotLoaded(format!("cannot {action} {}", self.name)))
    }

    /// Column values to write: staged columns plus belongs foreign keys.
    fn write_payload(&self) -> OrmResult<Row> {
        let mut payload = Row::new();
        for (name, value) in &self.staged {
            match self.descriptor.column_type(name) {
                Some(column_type) if column_type.is_json() => {
                    payload.insert(name.clone(), Value::Text(serde_json::to_string(value)?));
                }
                Some(_) => {
                    payload.insert(name.clone(), Value::from(value));
                }
                None => {}
            }
        }
        for (name, relation) in &self.descriptor.relations {
            if let (Relation::Belongs { foreign_key, .. }, Some(value)) =
                (relation, self.staged.get(name))
            {
                let id = json_id(value);
                if !id.is_null() {
                    payload.insert(foreign_key.clone(), id);
                }
            }
        }
        Ok(payload)
    }

    /// Write staged assignments, then synchronize junction relations.
    ///
    /// A loaded entity is updated by its id; an unloaded one carrying an
    /// `id` updates that row; otherwise a row is inserted. The entity is
    /// reloaded afterwards and staged assignments are cleared. Statements
    /// are not wrapped in a transaction.
    pub fn save(&mut self) -> OrmResult<()> {
        let payload = self.write_payload()?;
        let table = self.descriptor.table.clone();

        let id = match &self.record {
            Some(record) => {
                let id = record.id();
                if !payload.is_empty() {
                    self.database
                        .update(table)
                        .values(payload)
                        .where_("id", id.clone())
                        .execute("id")?;
                }
                id
            }
            None => match payload.get("id").filter(|id| !id.is_null()).cloned() {
                Some(id) => {
                    self.database
                        .update(table)
                        .values(payload)
                        .where_("id", id.clone())
                        .execute("id")?;
                    id
                }
                None => {
                    let created = self
                        .database
                        .insert(table)
                        .values(payload)
                        .result_by("id", None)?
                        .insert_id()
                        .ok_or_else(|| OrmError::Database("insert returned no id".to_string()))?;
                    Value::Int(created)
                }
            },
        };
        tracing::debug!(target: "relorm", entity = %self.name, id = %id, "saved");
        if !self.load(id)? {
            tracing::debug!(
                target: "relorm",
                entity = %self.name,
                "no row behind saved id, junctions skipped"
            );
            self.staged.clear();
            return Ok(());
        }

        let relations: Vec<(String, Relation)> = self
            .descriptor
            .relations
            .iter()
            .filter(|(name, relation)| relation.is_junction() && self.staged.contains_key(*name))
            .map(|(name, relation)| (name.clone(), relation.clone()))
            .collect();
        for (name, relation) in relations {
            let items = self
                .staged
                .get(&name)
                .map(junction_items)
                .unwrap_or_default();
            self.sync_junction(&name, &relation, items)?;
        }
        self.staged.clear();
        Ok(())
    }

    /// Positional synchronization: the n-th existing junction row is
    /// replaced by the n-th desired item, extra items are added.
    ///
    /// Set rows carry no row id of their own, so they are deleted by set id
    /// and member; a member listed twice loses both rows on its first visit.
    fn sync_junction(
        &mut self,
        name: &str,
        relation: &Relation,
        items: Vec<JunctionItem>,
    ) -> OrmResult<()> {
        let record = self.require_record("synchronize")?;
        let record_id = record.id();

        let existing = match relation {
            Relation::Pivot { junction, local, .. } => {
                let mut query = self.database.select();
                query.from(junction.clone()).where_(local.clone(), record_id.clone());
                query.rows()?
            }
            Relation::Set {
                junction,
                set_column,
                remote,
                ..
            } => {
                let set_id = record.raw(set_column);
                if is_unset(&set_id) {
                    Vec::new()
                } else {
                    let mut query = self.database.select();
                    query
                        .from(junction.clone())
                        .where_("id", set_id)
                        .where_op(remote.clone(), "!=", 0);
                    query.rows()?
                }
            }
            _ => return Ok(()),
        };
        tracing::debug!(
            target: "relorm",
            entity = %self.name,
            relation = name,
            existing = existing.len(),
            desired = items.len(),
            "synchronizing junction rows"
        );

        for (index, row) in existing.iter().enumerate() {
            let row_id = row.get("id").cloned().unwrap_or_default();
            let item = items.get(index);
            match relation {
                Relation::Pivot {
                    junction,
                    local,
                    remote,
                    extra,
                    ..
                } => {
                    self.database
                        .delete(junction.clone())
                        .where_("id", row_id.clone())
                        .execute("id")?;
                    if let Some(item) = item {
                        let mut values = Row::new();
                        values.insert("id".to_string(), row_id);
                        values.insert(local.clone(), record_id.clone());
                        values.insert(remote.clone(), item.id.clone());
                        values.extend(pivot_values(extra, &item.pivot));
                        self.database.insert(junction.clone()).values(values).execute("id")?;
                    }
                }
                Relation::Set {
                    junction,
                    remote,
                    extra,
                    ..
                } => {
                    let member = row.get(remote).cloned().unwrap_or_default();
                    self.database
                        .delete(junction.clone())
                        .where_("id", row_id.clone())
                        .where_(remote.clone(), member)
                        .execute("id")?;
                    if let Some(item) = item {
                        let mut values = Row::new();
                        values.insert("id".to_string(), row_id);
                        values.insert(remote.clone(), item.id.clone());
                        values.extend(pivot_values(extra, &item.pivot));
                        self.database.insert(junction.clone()).values(values).execute("id")?;
                    }
                }
                _ => {}
            }
        }

        for item in items.into_iter().skip(existing.len()) {
            self.add(name, item.id, item.pivot)?;
        }
        Ok(())
    }

    /// Insert a junction row linking this entity to `id`.
    ///
    /// A `set` relation without a set yet gets one first: a placeholder
    /// junction row is inserted and its generated id becomes the set id,
    /// stored on the owner row.
    pub fn add(
        &mut self,
        name: &str,
        id: impl Into<Value>,
        pivot: JsonMap<String, JsonValue>,
    ) -> OrmResult<()> {
        let record_id = self.require_record("add to")?.id();
        let Some(relation) = self.descriptor.relation(name).cloned() else {
            return Ok(());
        };
        let id = id.into();

        match &relation {
            Relation::Pivot {
                junction,
                local,
                remote,
                extra,
                ..
            } => {
                let mut values = Row::new();
                values.insert(local.clone(), record_id);
                values.insert(remote.clone(), id);
                values.extend(pivot_values(extra, &pivot));
                self.database.insert(junction.clone()).values(values).execute("id")?;
            }
            Relation::Set {
                junction,
                set_column,
                remote,
                extra,
                ..
            } => {
                let mut set_id = self.require_record("add to")?.raw(set_column);
                if is_unset(&set_id) {
                    set_id = self.create_set(junction, set_column, remote, &record_id)?;
                }
                let mut values = Row::new();
                values.insert("id".to_string(), set_id);
                values.insert(remote.clone(), id);
                values.extend(pivot_values(extra, &pivot));
                self.database.insert(junction.clone()).values(values).execute("id")?;
            }
            _ => {}
        }
        Ok(())
    }

    fn create_set(
        &mut self,
        junction: &str,
        set_column: &str,
        remote: &str,
        record_id: &Value,
    ) -> OrmResult<Value> {
        let created = self
            .database
            .insert(junction)
            .set("id", 0)
            .set(remote, 0)
            .result_by("id", None)?
            .insert_id()
            .ok_or_else(|| OrmError::Database("set placeholder returned no id".to_string()))?;
        self.database
            .update(junction)
            .set("id", created)
            .where_("id", 0)
            .where_(remote, 0)
            .execute("id")?;
        self.database
            .update(self.descriptor.table.clone())
            .set(set_column, created)
            .where_("id", record_id.clone())
            .execute("id")?;
        tracing::debug!(target: "relorm", entity = %self.name, set_id = created, "created set");

        self.load(record_id.clone())?;
        Ok(Value::Int(created))
    }

    /// Delete junction rows linking this entity to `id`, or all of them.
    pub fn remove(&mut self, name: &str, id: Option<Value>) -> OrmResult<()> {
        let record = self.require_record("remove from")?;
        let Some(relation) = self.descriptor.relation(name) else {
            return Ok(());
        };

        match relation {
            Relation::Pivot {
                junction,
                local,
                remote,
                ..
            } => {
                let mut query = self.database.delete(junction.clone());
                query.where_(local.clone(), record.id());
                if let Some(id) = id {
                    query.where_(remote.clone(), id);
                }
                query.execute("id")?;
            }
            Relation::Set {
                junction,
                set_column,
                remote,
                ..
            } => {
                let set_id = record.raw(set_column);
                if is_unset(&set_id) {
                    return Ok(());
                }
                let mut query = self.database.delete(junction.clone());
                query.where_("id", set_id);
                if let Some(id) = id {
                    query.where_(remote.clone(), id);
                }
                query.execute("id")?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Delete the row and its junction rows, then clear the entity.
    pub fn delete(&mut self) -> OrmResult<()> {
        if let Some(record) = &self.record {
            self.database
                .delete(self.descriptor.table.clone())
                .where_("id", record.id())
                .execute("id")?;

            let junctions: Vec<String> = self
                .descriptor
                .relations
                .iter()
                .filter(|(_, relation)| relation.is_junction())
                .map(|(name, _)| name.clone())
                .collect();
            for name in junctions {
                self.remove(&name, None)?;
            }
            tracing::debug!(target: "relorm", entity = %self.name, "deleted");
        }
        self.clear();
        Ok(())
    }
}

fn is_unset(set_id: &Value) -> bool {
    set_id.is_null() || set_id.to_int() == 0
}

/// Normalize a staged junction value into ordered items.
///
/// Accepts a single id or object, or a list of them. Objects carry `id`
/// and an optional `pivot` object of extra columns.
fn junction_items(value: &JsonValue) -> Vec<JunctionItem> {
    let item = |value: &JsonValue| JunctionItem {
        id: json_id(value),
        pivot: value
            .get("pivot")
            .and_then(JsonValue::as_object)
            .cloned()
            .unwrap_or_default(),
    };
    match value {
        JsonValue::Array(items) => items.iter().map(item).collect(),
        JsonValue::Null => Vec::new(),
        other => vec![item(other)],
    }
}

/// Extra junction columns present in `pivot`, restricted to `extra`.
fn pivot_values(extra: &[String], pivot: &JsonMap<String, JsonValue>) -> IndexMap<String, Value> {
    extra
        .iter()
        .filter_map(|column| {
            pivot
                .get(column)
                .map(|value| (column.clone(), Value::from(value)))
        })
        .collect()
}
