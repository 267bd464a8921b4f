//! A fetched row viewed through the mapper that produced it.

use crate::error::OrmResult;
use crate::mapper::Mapper;
use crate::query::Direction;
use crate::schema::ColumnType;
use crate::value::{Row, Value};
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;

/// What a field name refers to on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldId {
    /// A selected column under the record's prefix.
    Column(String),
    /// A relation declared on the entity.
    Relation(String),
    /// A helper registered with [`Mapper::method`].
    Helper(String),
    /// An extra column of the junction row.
    Pivot(String),
}

impl FieldId {
    pub fn name(&self) -> &str {
        match self {
            FieldId::Column(name)
            | FieldId::Relation(name)
            | FieldId::Helper(name)
            | FieldId::Pivot(name) => name,
        }
    }
}

/// Value of a field: a column value or resolved related records.
#[derive(Debug, Clone)]
pub enum Field {
    Value(Value),
    One(Box<Record>),
    Many(Vec<Record>),
}

impl Field {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Field::One(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Record]> {
        match self {
            Field::Many(records) => Some(records),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_one(self) -> Option<Record> {
        match self {
            Field::One(record) => Some(*record),
            _ => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<Record>> {
        match self {
            Field::Many(records) => Some(records),
            _ => None,
        }
    }
}

/// One row plus the mapper that can resolve its relations.
///
/// Column keys in the row carry the mapper's alias as a prefix
/// (`post:title`), so rows with eager-loaded relations hold several
/// entities side by side. Resolved relations are memoized per record.
#[derive(Clone)]
pub struct Record {
    data: Row,
    prefix: String,
    mapper: Mapper,
    related: IndexMap<String, Option<Field>>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("prefix", &self.prefix)
            .field("data", &self.data)
            .field("related", &self.related.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data: JsonMap<String, JsonValue> = self
            .data
            .iter()
            .filter_map(|(key, value)| {
                let column = key.strip_prefix(&self.prefix)?;
                Some((column.to_string(), value.to_json()))
            })
            .collect();
        write!(f, "{}", JsonValue::Object(data))
    }
}

impl Record {
    pub(crate) fn new(data: Row, prefix: String, mapper: Mapper) -> Self {
        Self {
            data,
            prefix,
            mapper,
            related: IndexMap::new(),
        }
    }

    /// The full fetched row, including other aliases' columns.
    pub fn data(&self) -> &Row {
        &self.data
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Uncoerced value of a column; `Null` when absent.
    pub fn raw(&self, name: &str) -> Value {
        self.data
            .get(&format!("{}{name}", self.prefix))
            .cloned()
            .unwrap_or_default()
    }

    pub fn id(&self) -> Value {
        self.raw("id")
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.contains_key(&format!("{}{name}", self.prefix))
    }

    /// Value of a column, coerced by its declared type.
    pub fn column(&self, name: &str) -> Value {
        let raw = self.raw(name);
        match self.mapper.column_type(name) {
            Some(column_type) => coerce(raw, column_type),
            None => raw,
        }
    }

    /// Extra junction column selected for `pivot`/`set` relations.
    pub fn pivot(&self, name: &str) -> Value {
        self.data
            .get(&format!("{}pivot:{name}", self.prefix))
            .cloned()
            .unwrap_or_default()
    }

    /// Classify `name`: columns first, then relations, helpers and pivot columns.
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        if self.has_column(name) {
            Some(FieldId::Column(name.to_string()))
        } else if self.mapper.relation(name).is_some() {
            Some(FieldId::Relation(name.to_string()))
        } else if self.mapper.helper(name).is_some() {
            Some(FieldId::Helper(name.to_string()))
        } else if self.data.contains_key(&format!("{}pivot:{name}", self.prefix)) {
            Some(FieldId::Pivot(name.to_string()))
        } else {
            None
        }
    }

    /// Read a field. Relations are resolved once and memoized.
    pub fn get(&mut self, field: &FieldId) -> OrmResult<Option<Field>> {
        match field {
            FieldId::Column(name) => Ok(Some(Field::Value(self.column(name)))),
            FieldId::Pivot(name) => Ok(Some(Field::Value(self.pivot(name)))),
            FieldId::Helper(name) => self.call(name, &[]),
            FieldId::Relation(name) => {
                if let Some(field) = self.related.get(name) {
                    return Ok(field.clone());
                }
                let mapper = self.mapper.clone();
                let field = mapper.related(name, self, None, None, None)?;
                self.related.insert(name.clone(), field.clone());
                Ok(field)
            }
        }
    }

    /// Read a field by name; unknown names are `None`.
    pub fn value(&mut self, name: &str) -> OrmResult<Option<Field>> {
        match self.field_id(name) {
            Some(field) => self.get(&field),
            None => Ok(None),
        }
    }

    /// Invoke a helper, or resolve a relation with overrides.
    ///
    /// Relation arguments are `amount`, `skip` and `sort`, positionally.
    /// `sort` is either a JSON object of key to direction or a single key
    /// sorted ascending. Overridden relations are not memoized.
    pub fn call(&mut self, name: &str, args: &[Value]) -> OrmResult<Option<Field>> {
        if let Some(helper) = self.mapper.helper(name) {
            return Ok(Some(Field::Value(helper(self, args)?)));
        }
        if self.mapper.relation(name).is_none() {
            return Ok(None);
        }

        let window = |index: usize| {
            args.get(index)
                .filter(|value| !value.is_null())
                .map(|value| value.to_int().max(0) as u64)
        };
        let sort = args.get(2).and_then(sort_override);

        let mapper = self.mapper.clone();
        mapper.related(name, self, window(0), window(1), sort)
    }

    /// Columns and collection ids as a JSON map.
    pub fn flat(&self) -> OrmResult<JsonMap<String, JsonValue>> {
        self.mapper.flat(self)
    }

    pub(crate) fn memoize(&mut self, name: &str, field: Option<Field>) {
        self.related.insert(name.to_string(), field);
    }
}

fn coerce(raw: Value, column_type: ColumnType) -> Value {
    if raw.is_null() {
        return raw;
    }
    match column_type {
        ColumnType::Int => Value::Int(raw.to_int()),
        ColumnType::Float => Value::Float(raw.to_float()),
        ColumnType::Boolean => Value::Bool(raw.truthy()),
        ColumnType::Json | ColumnType::Array => match raw {
            Value::Json(json) => Value::Json(json),
            other => serde_json::from_str::<JsonValue>(&other.to_text())
                .map(Value::Json)
                .unwrap_or(Value::Null),
        },
        ColumnType::String => raw,
    }
}

fn sort_override(value: &Value) -> Option<IndexMap<String, Direction>> {
    match value {
        Value::Json(JsonValue::Object(map)) => Some(
            map.iter()
                .map(|(key, direction)| {
                    let direction = direction.as_str().unwrap_or("asc");
                    (key.clone(), Direction::parse(direction))
                })
                .collect(),
        ),
        Value::Text(key) if !key.is_empty() => {
            Some(IndexMap::from([(key.clone(), Direction::Asc)]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_by_column_type() {
        assert_eq!(coerce(Value::from("42"), ColumnType::Int), Value::Int(42));
        assert_eq!(coerce(Value::from("1.5"), ColumnType::Float), Value::Float(1.5));
        assert_eq!(coerce(Value::from("0"), ColumnType::Boolean), Value::Bool(false));
        assert_eq!(coerce(Value::Int(3), ColumnType::Boolean), Value::Bool(true));
        assert_eq!(
            coerce(Value::from(r#"{"a":1}"#), ColumnType::Json),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            coerce(Value::from("[1,2]"), ColumnType::Array),
            Value::Json(serde_json::json!([1, 2]))
        );
        assert_eq!(coerce(Value::from("{oops"), ColumnType::Json), Value::Null);
        assert_eq!(coerce(Value::Int(7), ColumnType::String), Value::Int(7));
        assert_eq!(coerce(Value::Null, ColumnType::Int), Value::Null);
    }

    #[test]
    fn sort_override_from_object_or_key() {
        let sort = sort_override(&Value::Json(serde_json::json!({"name": "DESC", "id": "asc"})))
            .unwrap();
        assert_eq!(sort.get("name"), Some(&Direction::Desc));
        assert_eq!(sort.get("id"), Some(&Direction::Asc));

        let sort = sort_override(&Value::from("name")).unwrap();
        assert_eq!(sort.get("name"), Some(&Direction::Asc));

        assert!(sort_override(&Value::Int(1)).is_none());
        assert!(sort_override(&Value::from("")).is_none());
    }

    #[test]
    fn field_accessors() {
        let field = Field::Value(Value::Int(1));
        assert_eq!(field.as_value(), Some(&Value::Int(1)));
        assert!(field.as_one().is_none());
        assert!(field.as_many().is_none());
        assert_eq!(field.into_value(), Some(Value::Int(1)));

        let field = Field::Many(Vec::new());
        assert_eq!(field.as_many().map(<[Record]>::len), Some(0));
        assert!(field.into_one().is_none());
    }

    #[test]
    fn field_id_name() {
        assert_eq!(FieldId::Pivot("role".into()).name(), "role");
        assert_eq!(FieldId::Relation("author".into()).name(), "author");
    }
}
