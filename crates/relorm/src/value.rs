//! Dynamic values used as bound parameters and as fetched column data.

use indexmap::IndexMap;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use serde_json::Value as JsonValue;
use std::fmt;

/// A fetched row: column name to value, in select-list order.
pub type Row = IndexMap<String, Value>;

/// Values that can be bound as query parameters or read back from a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Boolean value, stored as 0/1
    Bool(bool),
    /// Text value
    Text(String),
    /// Parsed JSON structure, stored as text
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer interpretation with string parsing; unparseable text is `0`.
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => i64::from(*b),
            Value::Text(s) => parse_leading_int(s),
            Value::Json(j) => j.as_i64().unwrap_or(0),
            Value::Blob(_) => 0,
        }
    }

    /// Float interpretation with string parsing; unparseable text is `0.0`.
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Text(s) => s.trim().parse().unwrap_or_else(|_| parse_leading_int(s) as f64),
            Value::Json(j) => j.as_f64().unwrap_or(0.0),
            Value::Blob(_) => 0.0,
        }
    }

    /// Truthiness: null, zero, empty text and `"0"` are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
            Value::Text(s) => !(s.is_empty() || s == "0"),
            Value::Json(j) => !matches!(j, JsonValue::Null | JsonValue::Bool(false)),
            Value::Blob(b) => !b.is_empty(),
        }
    }

    /// Text interpretation of the value.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => (if *b { "1" } else { "" }).to_string(),
            Value::Text(s) => s.clone(),
            Value::Json(j) => j.to_string(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Key used when re-keying result rows by a column.
    pub fn to_key(&self) -> String {
        self.to_text()
    }

    /// Convert to the JSON data model.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => JsonValue::from(*f),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Json(j) => j.clone(),
            Value::Blob(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Convert to a rusqlite value for binding.
    pub fn to_sqlite(&self) -> SqliteValue {
        match self {
            Value::Null => SqliteValue::Null,
            Value::Int(i) => SqliteValue::Integer(*i),
            Value::Float(f) => SqliteValue::Real(*f),
            Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
            Value::Text(s) => SqliteValue::Text(s.clone()),
            Value::Json(j) => SqliteValue::Text(j.to_string()),
            Value::Blob(b) => SqliteValue::Blob(b.clone()),
        }
    }

    /// Read a column value fetched by rusqlite.
    pub fn from_sqlite(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// Integer prefix of a string (`"12abc"` is 12), `0` when there is none.
fn parse_leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let mut end = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    s[..end].parse().unwrap_or(0)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// JSON scalars map onto the matching variant; arrays and objects stay JSON.
impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(v: &JsonValue) -> Self {
        Value::from(v.clone())
    }
}

/// Id carried by a JSON value: an object's `id` field, or the value itself.
pub(crate) fn json_id(value: &JsonValue) -> Value {
    match value {
        JsonValue::Object(map) => map.get("id").map(Value::from).unwrap_or_default(),
        other => Value::from(other),
    }
}
