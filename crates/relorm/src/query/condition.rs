//! Condition trees for WHERE / HAVING / JOIN ... ON clauses.
//!
//! A [`Conditions`] list holds leaves and nested groups. Each entry carries
//! the logic keyword that joins it to its predecessor; the keyword is omitted
//! for the first entry of any list, so a group always opens cleanly.
//!
//! ```ignore
//! let mut c = Conditions::new();
//! c.where_("status", "active")
//!     .group(|g| {
//!         g.where_op("age", ">", 18).or_where("vip", true);
//!     });
//! // `status` = ? AND (`age` > ? OR `vip` = ?)
//! ```

use super::Query;
use crate::ident::quote_identifier;
use crate::raw::Raw;
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::fmt;

/// Logic keyword joining a condition to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

/// Comparison operators recognized by the condition builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Lte,
    Gte,
    /// `<>`
    Ne,
    /// `!=`
    NotEq,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Like,
    NotLike,
    Between,
    NotBetween,
    ILike,
    RLike,
    Regexp,
    NotRegexp,
    In,
    IsNull,
    SoundsLike,
}

impl Operator {
    pub const ALL: [Operator; 23] = [
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::Lte,
        Operator::Gte,
        Operator::Ne,
        Operator::NotEq,
        Operator::BitAnd,
        Operator::BitOr,
        Operator::BitXor,
        Operator::ShiftLeft,
        Operator::ShiftRight,
        Operator::Like,
        Operator::NotLike,
        Operator::Between,
        Operator::NotBetween,
        Operator::ILike,
        Operator::RLike,
        Operator::Regexp,
        Operator::NotRegexp,
        Operator::In,
        Operator::IsNull,
        Operator::SoundsLike,
    ];

    /// Parse an operator token, case-insensitively.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|op| op.as_str() == token)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Ne => "<>",
            Operator::NotEq => "!=",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::ShiftLeft => "<<",
            Operator::ShiftRight => ">>",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::ILike => "ILIKE",
            Operator::RLike => "RLIKE",
            Operator::Regexp => "REGEXP",
            Operator::NotRegexp => "NOT REGEXP",
            Operator::In => "IN",
            Operator::IsNull => "ISNULL",
            Operator::SoundsLike => "SOUNDS LIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Absent value; `=`/`!=`/`<>` compile to `IS [NOT] NULL`.
    Null,
    /// A single bound value.
    Value(Value),
    /// A list of bound values (`IN`, `BETWEEN`).
    List(Vec<Value>),
    /// Literal SQL, never bound.
    Raw(Raw),
    /// A parenthesized sub-query whose parameters are appended in order.
    Query(Box<Query>),
    /// Another identifier, quoted and never bound (join `ON` conditions).
    Column(String),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Operand::Null,
            v => Operand::Value(v),
        }
    }
}

macro_rules! impl_operand_from_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::from(Value::from(v))
            }
        })*
    };
}

impl_operand_from_value!(
    i8, i16, i32, i64, u8, u16, u32, f32, f64, bool, &str, String, &String, &Value, JsonValue
);

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::from(Value::from(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(v: Vec<T>) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Operand {
    fn from(v: [T; N]) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Raw> for Operand {
    fn from(v: Raw) -> Self {
        Operand::Raw(v)
    }
}

impl From<Query> for Operand {
    fn from(v: Query) -> Self {
        Operand::Query(Box::new(v))
    }
}

/// A node of the condition tree.
#[derive(Debug, Clone)]
pub enum Condition {
    Leaf {
        logic: Logic,
        column: String,
        operator: Operator,
        operand: Operand,
    },
    Group {
        logic: Logic,
        conditions: Conditions,
    },
}

impl Condition {
    pub fn logic(&self) -> Logic {
        match self {
            Condition::Leaf { logic, .. } | Condition::Group { logic, .. } => *logic,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Condition::Leaf { .. } => false,
            Condition::Group { conditions, .. } => conditions.is_empty(),
        }
    }
}

/// Resolve `(token, value)` the way the two-and-three argument condition
/// forms do: an unknown operator token is itself the value, compared with `=`.
pub fn resolve_operator(token: &str, value: Operand) -> (Operator, Operand) {
    match Operator::parse(token) {
        Some(op) => (op, value),
        None => (Operator::Eq, Operand::Value(Value::Text(token.to_string()))),
    }
}

fn resolve_column_operator(token: &str, second: &str) -> (Operator, String) {
    match Operator::parse(token) {
        Some(op) => (op, second.to_string()),
        None => (Operator::Eq, token.to_string()),
    }
}

/// An ordered list of conditions, built through a small chainable DSL.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    items: Vec<Condition>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.iter().all(Condition::is_empty)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.items.iter()
    }

    /// Logic keyword of the first entry, if any.
    pub fn first_logic(&self) -> Option<Logic> {
        self.items.first().map(Condition::logic)
    }

    /// Push a fully specified leaf.
    pub fn push(
        &mut self,
        logic: Logic,
        column: impl Into<String>,
        operator: Operator,
        operand: impl Into<Operand>,
    ) -> &mut Self {
        self.items.push(Condition::Leaf {
            logic,
            column: column.into(),
            operator,
            operand: operand.into(),
        });
        self
    }

    /// Push a nested group filled by `build`.
    pub fn push_group(&mut self, logic: Logic, build: impl FnOnce(&mut Conditions)) -> &mut Self {
        let mut conditions = Conditions::new();
        build(&mut conditions);
        self.items.push(Condition::Group { logic, conditions });
        self
    }

    /// Push a leaf from an operator token (see [`resolve_operator`]).
    pub fn push_token(
        &mut self,
        logic: Logic,
        column: impl Into<String>,
        token: &str,
        value: impl Into<Operand>,
    ) -> &mut Self {
        let (operator, operand) = resolve_operator(token, value.into());
        self.push(logic, column, operator, operand)
    }

    /// `column = value`
    pub fn where_(&mut self, column: impl Into<String>, value: impl Into<Operand>) -> &mut Self {
        self.push(Logic::And, column, Operator::Eq, value)
    }

    /// `column <op> value`
    pub fn where_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.push_token(Logic::And, column, op, value)
    }

    pub fn or_where(&mut self, column: impl Into<String>, value: impl Into<Operand>) -> &mut Self {
        self.push(Logic::Or, column, Operator::Eq, value)
    }

    pub fn or_where_op(
        &mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.push_token(Logic::Or, column, op, value)
    }

    /// `first = second`, comparing two identifiers.
    pub fn on(&mut self, first: impl Into<String>, second: &str) -> &mut Self {
        self.push(Logic::And, first, Operator::Eq, Operand::Column(second.to_string()))
    }

    /// `first <op> second`, comparing two identifiers. An unknown operator
    /// token is itself the second identifier.
    pub fn on_op(&mut self, first: impl Into<String>, op: &str, second: &str) -> &mut Self {
        let (operator, other) = resolve_column_operator(op, second);
        self.push(Logic::And, first, operator, Operand::Column(other))
    }

    pub fn or_on(&mut self, first: impl Into<String>, second: &str) -> &mut Self {
        self.push(Logic::Or, first, Operator::Eq, Operand::Column(second.to_string()))
    }

    pub fn or_on_op(&mut self, first: impl Into<String>, op: &str, second: &str) -> &mut Self {
        let (operator, other) = resolve_column_operator(op, second);
        self.push(Logic::Or, first, operator, Operand::Column(other))
    }

    /// `AND ( ... )`
    pub fn group(&mut self, build: impl FnOnce(&mut Conditions)) -> &mut Self {
        self.push_group(Logic::And, build)
    }

    /// `OR ( ... )`
    pub fn or_group(&mut self, build: impl FnOnce(&mut Conditions)) -> &mut Self {
        self.push_group(Logic::Or, build)
    }

    /// Render the list, appending bound values to `params` in placeholder order.
    pub(crate) fn build(&self, quote: char, params: &mut Vec<Value>) -> String {
        let mut sql = String::new();
        let mut first = true;

        for condition in self.items.iter().filter(|c| !c.is_empty()) {
            if !first {
                sql.push(' ');
                sql.push_str(condition.logic().as_str());
                sql.push(' ');
            }
            first = false;

            match condition {
                Condition::Group { conditions, .. } => {
                    sql.push('(');
                    sql.push_str(&conditions.build(quote, params));
                    sql.push(')');
                }
                Condition::Leaf {
                    column,
                    operator,
                    operand,
                    ..
                } => build_leaf(&mut sql, quote, column, *operator, operand, params),
            }
        }

        sql
    }
}

fn build_leaf(
    sql: &mut String,
    quote: char,
    column: &str,
    operator: Operator,
    operand: &Operand,
    params: &mut Vec<Value>,
) {
    // `IN ()` is not valid SQL; an empty set matches nothing.
    if operator == Operator::In && matches!(operand, Operand::List(values) if values.is_empty()) {
        sql.push_str("1 = 0");
        return;
    }

    sql.push_str(&quote_identifier(column, quote));
    sql.push(' ');

    if operator == Operator::IsNull {
        sql.push_str(operator.as_str());
        return;
    }

    match operand {
        Operand::Raw(raw) => {
            sql.push_str(operator.as_str());
            sql.push(' ');
            sql.push_str(raw.as_str());
        }
        Operand::Null if operator == Operator::Eq => sql.push_str("IS NULL"),
        Operand::Null if matches!(operator, Operator::NotEq | Operator::Ne) => {
            sql.push_str("IS NOT NULL")
        }
        Operand::Query(sub) => {
            let (sub_sql, sub_params) = sub.compile();
            params.extend(sub_params);
            sql.push_str(operator.as_str());
            sql.push_str(" (");
            sql.push_str(&sub_sql);
            sql.push(')');
        }
        Operand::Column(other) => {
            sql.push_str(operator.as_str());
            sql.push(' ');
            sql.push_str(&quote_identifier(other, quote));
        }
        Operand::List(values) if matches!(operator, Operator::Between | Operator::NotBetween) => {
            let mut bounds = values.iter().cloned();
            params.push(bounds.next().unwrap_or_default());
            params.push(bounds.next().unwrap_or_default());
            sql.push_str(operator.as_str());
            sql.push_str(" ? AND ?");
        }
        Operand::List(values) => {
            sql.push_str(operator.as_str());
            sql.push_str(" (");
            sql.push_str(&vec!["?"; values.len()].join(","));
            sql.push(')');
            params.extend(values.iter().cloned());
        }
        Operand::Null => {
            sql.push_str(operator.as_str());
            sql.push_str(" ?");
            params.push(Value::Null);
        }
        Operand::Value(value) => {
            sql.push_str(operator.as_str());
            sql.push_str(" ?");
            params.push(value.clone());
        }
    }
}
