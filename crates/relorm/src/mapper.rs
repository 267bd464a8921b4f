//! Per-entity query context.
//!
//! A [`Mapper`] accumulates filters, sorts, pagination and eager-load
//! requests for one entity, builds a [`Query`] from them, and turns fetched
//! rows into [`Record`]s. Relations are resolved through child mappers whose
//! alias extends the parent's (`post` -> `post:author` -> `post:author:team`),
//! so every traversal path selects and joins under a unique name.
//!
//! # Example
//!
//! ```ignore
//! let posts = orm.mapper("post")?;
//! posts
//!     .filter("status", "published")
//!     .sort("created", "desc")
//!     .amount(10)
//!     .with("author");
//!
//! for mut post in posts.all()? {
//!     let title = post.column("title");
//!     let author = post.value("author")?;
//! }
//! ```

use crate::connection::Cursor;
use crate::database::Database;
use crate::error::OrmResult;
use crate::query::{Conditions, Direction, JoinKind, Operand, Query};
use crate::raw::Raw;
use crate::record::{Field, Record};
use crate::schema::{ColumnType, Descriptor, Relation, Schema};
use crate::value::{Row, Value, json_id};
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Creates the mapper of an entity by name.
///
/// Mappers use it to build child mappers for relation targets, which may
/// live on another connection.
pub trait MapperFactory {
    fn mapper(&self, name: &str) -> OrmResult<Mapper>;
}

/// A helper method callable on records through [`Record::call`].
pub type Helper = Rc<dyn Fn(&mut Record, &[Value]) -> OrmResult<Value>>;

/// A stored filter.
#[derive(Clone)]
pub enum Filter {
    /// `alias.column <operator> operand`
    Column {
        column: String,
        operator: String,
        operand: Operand,
    },
    /// A condition group built by a closure; columns are used as written.
    Group(Rc<dyn Fn(&mut Conditions)>),
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Column {
                column,
                operator,
                operand,
            } => f
                .debug_struct("Column")
                .field("column", column)
                .field("operator", operator)
                .field("operand", operand)
                .finish(),
            Filter::Group(_) => f.write_str("Group(..)"),
        }
    }
}

/// How [`Mapper::one`] picks its row.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The first row matching the mapper's own filters.
    Any,
    /// `alias.id = value`
    Id(Value),
    /// `alias.column = value` for every pair.
    Filters(Vec<(String, Value)>),
}

macro_rules! impl_lookup_from_id {
    ($($t:ty),*) => {
        $(impl From<$t> for Lookup {
            fn from(v: $t) -> Self {
                Lookup::Id(Value::from(v))
            }
        })*
    };
}

impl_lookup_from_id!(i32, i64, u32, &str, String, Value, &Value);

impl From<()> for Lookup {
    fn from(_: ()) -> Self {
        Lookup::Any
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for Lookup {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Lookup::Filters(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Lookup {
    fn from(pairs: [(K, V); N]) -> Self {
        Lookup::Filters(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

struct MapperState {
    name: String,
    alias: String,
    descriptor: Rc<Descriptor>,
    /// Relation this mapper resolves for its origin.
    relation: Option<Relation>,
    base: Query,
    children: HashMap<String, Mapper>,
    only: Vec<String>,
    with: Vec<String>,
    filters: IndexMap<String, Filter>,
    sorts: IndexMap<String, Direction>,
    pivot_filters: IndexMap<String, Filter>,
    pivot_sorts: IndexMap<String, Direction>,
    pivot_scope: bool,
    amount: Option<u64>,
    skip: Option<u64>,
    helpers: IndexMap<String, Helper>,
    cursor: Option<Cursor>,
    current: Option<Row>,
    position: usize,
}

impl MapperState {
    fn filters_mut(&mut self) -> &mut IndexMap<String, Filter> {
        if self.pivot_scope {
            &mut self.pivot_filters
        } else {
            &mut self.filters
        }
    }

    fn sorts_mut(&mut self) -> &mut IndexMap<String, Direction> {
        if self.pivot_scope {
            &mut self.pivot_sorts
        } else {
            &mut self.sorts
        }
    }
}

/// Query context of one entity; a shared handle.
///
/// Clones share the same state, including the attached cursor.
#[derive(Clone)]
pub struct Mapper {
    state: Rc<RefCell<MapperState>>,
    schema: Rc<Schema>,
    database: Database,
    factory: Rc<dyn MapperFactory>,
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Mapper")
            .field("name", &state.name)
            .field("alias", &state.alias)
            .field("table", &state.descriptor.table)
            .field("with", &state.with)
            .field("filters", &state.filters)
            .field("sorts", &state.sorts)
            .field("amount", &state.amount)
            .field("skip", &state.skip)
            .finish()
    }
}

impl Mapper {
    /// Create the root mapper of `name`.
    ///
    /// An entity without a schema resource gets an empty descriptor whose
    /// table is the entity name.
    pub fn new(
        name: &str,
        schema: Rc<Schema>,
        database: Database,
        factory: Rc<dyn MapperFactory>,
    ) -> OrmResult<Self> {
        let descriptor = schema
            .get(name)?
            .unwrap_or_else(|| Rc::new(Descriptor::empty(name)));
        let state = MapperState {
            name: name.to_string(),
            alias: name.to_string(),
            descriptor,
            relation: None,
            base: database.select(),
            children: HashMap::new(),
            only: Vec::new(),
            with: Vec::new(),
            filters: IndexMap::new(),
            sorts: IndexMap::new(),
            pivot_filters: IndexMap::new(),
            pivot_sorts: IndexMap::new(),
            pivot_scope: false,
            amount: None,
            skip: None,
            helpers: IndexMap::new(),
            cursor: None,
            current: None,
            position: 0,
        };
        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            schema,
            database,
            factory,
        })
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    /// Join alias and column prefix of this mapper.
    pub fn alias(&self) -> String {
        self.state.borrow().alias.clone()
    }

    pub fn table(&self) -> String {
        self.state.borrow().descriptor.table.clone()
    }

    pub fn descriptor(&self) -> Rc<Descriptor> {
        Rc::clone(&self.state.borrow().descriptor)
    }

    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Definition of a relation; `None` for unknown names.
    pub fn relation(&self, name: &str) -> Option<Relation> {
        self.state.borrow().descriptor.relation(name).cloned()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.state.borrow().descriptor.column_type(name)
    }

    pub(crate) fn helper(&self, name: &str) -> Option<Helper> {
        self.state.borrow().helpers.get(name).cloned()
    }

    /// Eager-load a to-one relation, or select a raw expression.
    pub fn with(&self, name: impl Into<String>) -> &Self {
        self.state.borrow_mut().with.push(name.into());
        self
    }

    pub fn with_all<I, S>(&self, names: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .borrow_mut()
            .with
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_list(&self) -> Vec<String> {
        self.state.borrow().with.clone()
    }

    /// Select only these columns. Foreign keys left out cannot be joined on.
    pub fn only<I, S>(&self, columns: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.borrow_mut().only = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `column = value`, replacing any filter on `column`.
    pub fn filter(&self, column: impl Into<String>, value: impl Into<Operand>) -> &Self {
        self.filter_op(column, "=", value)
    }

    /// `column <op> value`, replacing any filter on `column`.
    pub fn filter_op(
        &self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> &Self {
        let column = column.into();
        self.state.borrow_mut().filters_mut().insert(
            column.clone(),
            Filter::Column {
                column,
                operator: op.to_string(),
                operand: value.into(),
            },
        );
        self
    }

    /// `column = value` for every pair.
    pub fn filter_all<I, K, V>(&self, filters: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        for (column, value) in filters {
            self.filter(column, value);
        }
        self
    }

    /// A condition group; columns inside are used verbatim.
    pub fn filter_group(&self, build: impl Fn(&mut Conditions) + 'static) -> &Self {
        let mut state = self.state.borrow_mut();
        let filters = state.filters_mut();
        let key = format!("#{}", filters.len());
        filters.insert(key, Filter::Group(Rc::new(build)));
        drop(state);
        self
    }

    /// Keys of the active filters.
    pub fn filters(&self) -> Vec<String> {
        self.state.borrow().filters.keys().cloned().collect()
    }

    /// Remove the filter on `key`, or all filters.
    pub fn unfilter(&self, key: Option<&str>) -> &Self {
        let mut state = self.state.borrow_mut();
        match key {
            Some(key) => {
                state.filters_mut().shift_remove(key);
            }
            None => state.filters_mut().clear(),
        }
        drop(state);
        self
    }

    /// Sort by a selected column; `direction` is `DESC` (any case) or ascending.
    pub fn sort(&self, key: impl Into<String>, direction: &str) -> &Self {
        self.state
            .borrow_mut()
            .sorts_mut()
            .insert(key.into(), Direction::parse(direction));
        self
    }

    pub fn sort_all<I, K>(&self, sorts: I) -> &Self
    where
        I: IntoIterator<Item = (K, Direction)>,
        K: Into<String>,
    {
        let mut state = self.state.borrow_mut();
        let target = state.sorts_mut();
        for (key, direction) in sorts {
            target.insert(key.into(), direction);
        }
        drop(state);
        self
    }

    pub fn sorts(&self) -> IndexMap<String, Direction> {
        self.state.borrow().sorts.clone()
    }

    /// Remove the sort on `key`, or all sorts.
    pub fn unsort(&self, key: Option<&str>) -> &Self {
        let mut state = self.state.borrow_mut();
        match key {
            Some(key) => {
                state.sorts_mut().shift_remove(key);
            }
            None => state.sorts_mut().clear(),
        }
        drop(state);
        self
    }

    /// LIMIT; zero clears it.
    pub fn amount(&self, amount: u64) -> &Self {
        self.state.borrow_mut().amount = (amount > 0).then_some(amount);
        self
    }

    /// OFFSET; zero clears it.
    pub fn skip(&self, skip: u64) -> &Self {
        self.state.borrow_mut().skip = (skip > 0).then_some(skip);
        self
    }

    /// Within `scope`, `filter*` and `sort*` calls target the junction row of
    /// a `pivot`/`set` relation.
    pub fn pivot(&self, scope: impl FnOnce(&Mapper)) -> &Self {
        self.state.borrow_mut().pivot_scope = true;
        scope(self);
        self.state.borrow_mut().pivot_scope = false;
        self
    }

    /// Register a helper method for records of this mapper.
    pub fn method(
        &self,
        name: impl Into<String>,
        helper: impl Fn(&mut Record, &[Value]) -> OrmResult<Value> + 'static,
    ) -> &Self {
        self.state
            .borrow_mut()
            .helpers
            .insert(name.into(), Rc::new(helper));
        self
    }

    /// Modify the query every built query starts from.
    pub fn with_query(&self, modify: impl FnOnce(&mut Query)) -> &Self {
        modify(&mut self.state.borrow_mut().base);
        self
    }

    /// Configure the child mapper of a relation. Unknown names are ignored.
    pub fn scope(&self, name: &str, configure: impl FnOnce(&Mapper)) -> OrmResult<&Self> {
        if let Some(child) = self.related_mapper(name)? {
            configure(&child);
        }
        Ok(self)
    }

    /// The cached child mapper of a relation, created on first use.
    pub fn related_mapper(&self, name: &str) -> OrmResult<Option<Mapper>> {
        let (relation, alias) = {
            let state = self.state.borrow();
            if let Some(child) = state.children.get(name) {
                return Ok(Some(child.clone()));
            }
            match state.descriptor.relation(name) {
                Some(relation) => (relation.clone(), state.alias.clone()),
                None => return Ok(None),
            }
        };

        let child = self.factory.mapper(relation.target())?;
        {
            let mut child_state = child.state.borrow_mut();
            child_state.alias = format!("{alias}:{name}");
            child_state.relation = Some(relation);
        }
        self.state
            .borrow_mut()
            .children
            .insert(name.to_string(), child.clone());
        Ok(Some(child))
    }

    fn create_query(&self) -> Query {
        let state = self.state.borrow();
        let mut query = state.base.clone();
        query.from_as(state.descriptor.table.clone(), state.alias.clone());
        query
    }

    /// Build a query from the mapper's modifiers.
    pub fn query(&self) -> OrmResult<Query> {
        let mut query = self.create_query();
        self.apply(&mut query)?;
        Ok(query)
    }

    /// Apply filters, sorts, amount, skip, columns and eager loads to `query`.
    pub fn apply(&self, query: &mut Query) -> OrmResult<()> {
        self.apply_filters(query);
        self.apply_sorts(query);
        {
            let state = self.state.borrow();
            if let Some(amount) = state.amount {
                query.limit(amount);
            }
            if let Some(skip) = state.skip {
                query.offset(skip);
            }
        }
        self.apply_columns(query);
        self.apply_with(query)
    }

    fn apply_filters(&self, query: &mut Query) {
        let state = self.state.borrow();
        push_filters(query, &state.alias, &state.filters);
    }

    fn apply_sorts(&self, query: &mut Query) {
        let state = self.state.borrow();
        for (key, direction) in &state.sorts {
            query.order_by(format!("{}:{key}", state.alias), *direction);
        }
    }

    fn apply_columns(&self, query: &mut Query) {
        let state = self.state.borrow();
        let alias = &state.alias;
        let columns: Vec<&String> = if state.only.is_empty() {
            state.descriptor.columns.keys().collect()
        } else {
            state
                .only
                .iter()
                .filter(|column| state.descriptor.has_column(column))
                .collect()
        };
        for column in columns {
            query.select((format!("{alias}.{column}"), format!("{alias}:{column}")));
        }
    }

    fn apply_with(&self, query: &mut Query) -> OrmResult<()> {
        let (alias, with, descriptor) = {
            let state = self.state.borrow();
            (
                state.alias.clone(),
                state.with.clone(),
                Rc::clone(&state.descriptor),
            )
        };

        for name in &with {
            let (remote_column, local_column) = match descriptor.relation(name) {
                Some(Relation::Belongs { foreign_key, .. }) => ("id".to_string(), foreign_key.clone()),
                Some(Relation::One { foreign_key, .. }) => (foreign_key.clone(), "id".to_string()),
                Some(_) => continue,
                None => {
                    query.select(Raw::new(name.as_str()));
                    continue;
                }
            };
            let Some(child) = self.related_mapper(name)? else {
                continue;
            };
            let child_alias = child.alias();
            query
                .join_as(child.table(), child_alias.clone(), JoinKind::Left)
                .on(
                    format!("{child_alias}.{remote_column}"),
                    &format!("{alias}.{local_column}"),
                )?;
            child.apply(query)?;
        }
        Ok(())
    }

    fn attach(&self, cursor: Cursor) {
        let mut state = self.state.borrow_mut();
        state.cursor = Some(cursor);
        state.current = None;
        state.position = 0;
    }

    /// Run the built query and attach its cursor.
    pub fn all(&self) -> OrmResult<Records> {
        let mut query = self.query()?;
        self.attach(query.cursor()?);
        Ok(self.iter())
    }

    /// Run the built query restricted to the rows related to `record`.
    ///
    /// Only meaningful on a child mapper of a `many`, `pivot` or `set`
    /// relation; other mappers run their plain query.
    pub fn all_for(&self, record: &Record) -> OrmResult<Records> {
        let mut query = self.query()?;
        let (alias, relation) = {
            let state = self.state.borrow();
            (state.alias.clone(), state.relation.clone())
        };
        let pivot = format!("{alias}:pivot");

        match &relation {
            Some(Relation::Many { foreign_key, .. }) => {
                query.where_(format!("{alias}.{foreign_key}"), record.raw("id"));
            }
            Some(Relation::Pivot {
                junction,
                local,
                remote,
                extra,
                ..
            }) => {
                self.apply_pivot(&mut query, extra);
                query
                    .join_as(junction.clone(), pivot.clone(), JoinKind::Inner)
                    .on(format!("{pivot}.{remote}"), &format!("{alias}.id"))?
                    .on_where(format!("{pivot}.{local}"), record.raw("id"))?;
            }
            Some(Relation::Set {
                junction,
                set_column,
                remote,
                extra,
                ..
            }) => {
                self.apply_pivot(&mut query, extra);
                query
                    .join_as(junction.clone(), pivot.clone(), JoinKind::Inner)
                    .on(format!("{pivot}.{remote}"), &format!("{alias}.id"))?
                    .on_where(format!("{pivot}.id"), record.raw(set_column))?;
            }
            _ => {}
        }

        tracing::trace!(target: "relorm", mapper = %alias, "fetching related rows");
        self.attach(query.cursor()?);
        Ok(self.iter())
    }

    /// Junction-scoped filters, sorts and extra columns.
    fn apply_pivot(&self, query: &mut Query, extra: &[String]) {
        let state = self.state.borrow();
        let pivot = format!("{}:pivot", state.alias);
        push_filters(query, &pivot, &state.pivot_filters);
        for (key, direction) in &state.pivot_sorts {
            query.order_by(format!("{pivot}.{key}"), *direction);
        }
        for column in extra {
            query.select((format!("{pivot}.{column}"), format!("{pivot}:{column}")));
        }
    }

    /// First row by id, by column filters, or by the mapper's own filters.
    pub fn one(&self, lookup: impl Into<Lookup>) -> OrmResult<Option<Record>> {
        let mut query = self.query()?;
        let alias = self.alias();
        match lookup.into() {
            Lookup::Any => {}
            Lookup::Id(id) => {
                query.where_(format!("{alias}.id"), id);
            }
            Lookup::Filters(filters) => {
                for (column, value) in filters {
                    query.where_(format!("{alias}.{column}"), value);
                }
            }
        }
        self.first(query)
    }

    /// The row related to `record` through a `one` or `belongs` relation.
    ///
    /// With `eager`, columns the origin query already joined in are reused
    /// instead of querying again.
    pub fn one_for(&self, record: &Record, eager: bool) -> OrmResult<Option<Record>> {
        let (alias, relation) = {
            let state = self.state.borrow();
            (state.alias.clone(), state.relation.clone())
        };

        if eager {
            let prefix = format!("{alias}:");
            let mut joined = record
                .data()
                .iter()
                .filter(|(key, _)| key.starts_with(&prefix))
                .peekable();
            if joined.peek().is_some() {
                let found = joined.any(|(_, value)| !value.is_null());
                return Ok(found.then(|| self.record(record.data().clone())));
            }
        }

        let mut query = self.query()?;
        match &relation {
            Some(Relation::One { foreign_key, .. }) => {
                query.where_(format!("{alias}.{foreign_key}"), record.raw("id"));
            }
            Some(Relation::Belongs { foreign_key, .. }) => {
                query.where_(format!("{alias}.id"), record.raw(foreign_key));
            }
            _ => {}
        }
        self.first(query)
    }

    fn first(&self, mut query: Query) -> OrmResult<Option<Record>> {
        query.limit(1);
        Ok(query
            .rows()?
            .into_iter()
            .next()
            .map(|row| self.record(row)))
    }

    /// Resolve relation `name` of `record`.
    ///
    /// Collections honor the `amount`, `skip` and `sort` overrides for this
    /// call only. Unknown relations resolve to `None`.
    pub fn related(
        &self,
        name: &str,
        record: &Record,
        amount: Option<u64>,
        skip: Option<u64>,
        sort: Option<IndexMap<String, Direction>>,
    ) -> OrmResult<Option<Field>> {
        let (relation, eager, alias) = {
            let state = self.state.borrow();
            match state.descriptor.relation(name) {
                Some(relation) => (
                    relation.clone(),
                    state.with.iter().any(|w| w == name),
                    state.alias.clone(),
                ),
                None => return Ok(None),
            }
        };
        let Some(child) = self.related_mapper(name)? else {
            return Ok(None);
        };
        tracing::debug!(
            target: "relorm",
            mapper = %alias,
            relation = name,
            kind = %relation.kind(),
            eager,
            "resolving relation"
        );

        if relation.is_collection() {
            let records: Vec<Record> = child.windowed(amount, skip, sort, |mapper| {
                Ok(mapper.all_for(record)?.collect())
            })?;
            Ok(Some(Field::Many(records)))
        } else {
            Ok(child
                .one_for(record, eager)?
                .map(|found| Field::One(Box::new(found))))
        }
    }

    /// Run `f` with temporary amount/skip/sort overrides.
    fn windowed<T>(
        &self,
        amount: Option<u64>,
        skip: Option<u64>,
        sort: Option<IndexMap<String, Direction>>,
        f: impl FnOnce(&Mapper) -> OrmResult<T>,
    ) -> OrmResult<T> {
        let saved = {
            let mut state = self.state.borrow_mut();
            let saved = (state.amount, state.skip, state.sorts.clone());
            if let Some(amount) = amount.filter(|n| *n > 0) {
                state.amount = Some(amount);
            }
            if let Some(skip) = skip.filter(|n| *n > 0) {
                state.skip = Some(skip);
            }
            if let Some(sort) = sort.filter(|s| !s.is_empty()) {
                state.sorts = sort;
            }
            saved
        };
        let result = f(self);
        let (amount, skip, sorts) = saved;
        let mut state = self.state.borrow_mut();
        state.amount = amount;
        state.skip = skip;
        state.sorts = sorts;
        result
    }

    /// Number of rows `all()` would return, ignoring amount and skip.
    pub fn count(&self) -> OrmResult<i64> {
        let mut query = self.create_query();
        self.apply_filters(&mut query);
        self.apply_with(&mut query)?;
        query.select((Raw::new("COUNT(*)"), "__count__"));
        Ok(query
            .rows()?
            .first()
            .and_then(|row| row.get("__count__"))
            .map(Value::to_int)
            .unwrap_or(0))
    }

    /// Attach the cursor of a caller-built query.
    pub fn fetch(&self, mut query: Query) -> OrmResult<Records> {
        self.attach(query.cursor()?);
        Ok(self.iter())
    }

    /// Drop the attached cursor.
    pub fn reset(&self) -> &Self {
        let mut state = self.state.borrow_mut();
        state.cursor = None;
        state.current = None;
        state.position = 0;
        drop(state);
        self
    }

    /// Wrap a fetched row; no queries are issued.
    pub fn record(&self, row: Row) -> Record {
        Record::new(row, format!("{}:", self.alias()), self.clone())
    }

    /// Build a record from flat values, the inverse of [`Mapper::flat`].
    ///
    /// Relation entries holding ids are replaced by the records they name,
    /// fetched with one `id IN (...)` query per relation.
    pub fn hydrate(&self, data: &JsonMap<String, JsonValue>) -> OrmResult<Record> {
        let descriptor = self.descriptor();
        let alias = self.alias();

        let mut row = Row::new();
        for column in descriptor.columns.keys() {
            if let Some(value) = data.get(column) {
                row.insert(format!("{alias}:{column}"), Value::from(value));
            }
        }
        let mut record = self.record(row);

        for (name, relation) in &descriptor.relations {
            if matches!(relation, Relation::Belongs { .. }) {
                continue;
            }
            let ids: Vec<Value> = match data.get(name) {
                None | Some(JsonValue::Null) => continue,
                Some(JsonValue::Array(items)) => items.iter().map(json_id).collect(),
                Some(other) => vec![json_id(other)],
            };

            let target = self.factory.mapper(relation.target())?;
            target.filter_op("id", "IN", ids);
            let mut records: Vec<Record> = target.all()?.collect();
            let field = if relation.is_collection() {
                Some(Field::Many(records))
            } else if records.is_empty() {
                None
            } else {
                Some(Field::One(Box::new(records.swap_remove(0))))
            };
            record.memoize(name, field);
        }

        Ok(record)
    }

    /// Columns of `record` plus, per collection relation, the related ids.
    pub fn flat(&self, record: &Record) -> OrmResult<JsonMap<String, JsonValue>> {
        let descriptor = self.descriptor();
        let mut flat = JsonMap::new();

        for column in descriptor.columns.keys() {
            flat.insert(column.clone(), record.column(column).to_json());
        }
        for (name, relation) in &descriptor.relations {
            if !relation.is_collection() {
                continue;
            }
            let Some(child) = self.related_mapper(name)? else {
                continue;
            };
            let ids = child
                .all_for(record)?
                .map(|related| related.raw("id").to_json())
                .collect();
            flat.insert(name.clone(), JsonValue::Array(ids));
        }

        Ok(flat)
    }

    /// Iterate the attached cursor. Rows are consumed: a second pass over
    /// the same cursor yields nothing.
    pub fn iter(&self) -> Records {
        Records {
            mapper: self.clone(),
        }
    }

    /// Drain the attached cursor into records.
    pub fn records(&self) -> Vec<Record> {
        self.iter().collect()
    }

    /// Position at the first row, running `all()` when no cursor is attached.
    pub fn rewind(&self) -> OrmResult<()> {
        if self.state.borrow().cursor.is_none() {
            self.all()?;
        }
        let mut state = self.state.borrow_mut();
        state.current = state.cursor.as_mut().and_then(Cursor::fetch);
        state.position = 0;
        Ok(())
    }

    pub fn valid(&self) -> bool {
        self.state.borrow().current.is_some()
    }

    pub fn current(&self) -> Option<Record> {
        let row = self.state.borrow().current.clone()?;
        Some(self.record(row))
    }

    pub fn key(&self) -> usize {
        self.state.borrow().position
    }

    /// Move to the next row.
    pub fn advance(&self) {
        let mut state = self.state.borrow_mut();
        state.current = state.cursor.as_mut().and_then(Cursor::fetch);
        state.position += 1;
    }
}

/// Records read from a mapper's attached cursor.
///
/// Shares the cursor with the mapper it came from.
#[derive(Debug, Clone)]
pub struct Records {
    mapper: Mapper,
}

impl Records {
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }
}

impl Iterator for Records {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let row = {
            let mut state = self.mapper.state.borrow_mut();
            let current = state.current.take();
            let row = match current {
                Some(row) => Some(row),
                None => state.cursor.as_mut().and_then(Cursor::fetch),
            };
            if row.is_some() {
                state.position += 1;
            }
            row
        }?;
        Some(self.mapper.record(row))
    }
}

fn push_filters(query: &mut Query, alias: &str, filters: &IndexMap<String, Filter>) {
    for filter in filters.values() {
        match filter {
            Filter::Column {
                column,
                operator,
                operand,
            } => {
                query.where_op(format!("{alias}.{column}"), operator, operand.clone());
            }
            Filter::Group(build) => {
                query.where_group(|conditions| build(conditions));
            }
        }
    }
}
