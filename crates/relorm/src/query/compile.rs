//! SQL compilation for each statement kind.
//!
//! Clauses are rendered into separate fragments and joined with single
//! spaces, so compiled text never carries leading, trailing or doubled
//! whitespace. Parameters are appended in the exact order their `?`
//! placeholders appear.

use super::{Assign, Expr, Query, QueryKind, SelectItem, Source};
use crate::ident::{quote_identifier, quote_table};
use crate::value::Value;

impl Query {
    /// Compile to `(sql, params)`.
    ///
    /// Compilation is pure: calling it repeatedly without mutating the
    /// builder yields identical output.
    pub fn compile(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = match self.kind {
            QueryKind::Query => {
                params.extend(self.params.iter().cloned());
                self.sql.clone()
            }
            QueryKind::Insert => self.compile_insert(&mut params),
            QueryKind::Select => self.compile_select(&mut params),
            QueryKind::Update => self.compile_update(&mut params),
            QueryKind::Delete => self.compile_delete(&mut params),
        };
        (sql, params)
    }

    fn source_sql(&self, params: &mut Vec<Value>) -> String {
        match &self.source {
            Some(Source::Table(table)) => quote_table(table, self.quote),
            Some(Source::Query(sub)) => {
                let (sub_sql, sub_params) = sub.compile();
                params.extend(sub_params);
                format!("({sub_sql})")
            }
            None => quote_table("", self.quote),
        }
    }

    fn expr_sql(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column(column) => quote_identifier(column, self.quote),
            Expr::Raw(raw) => raw.as_str().to_string(),
        }
    }

    fn select_item_sql(&self, item: &SelectItem) -> String {
        let expr = self.expr_sql(&item.expr);
        match &item.alias {
            Some(alias) => format!("{expr} AS {}", quote_identifier(alias, self.quote)),
            None => expr,
        }
    }

    fn compile_insert(&self, params: &mut Vec<Value>) -> String {
        let table = self.source_sql(params);
        if self.values.is_empty() {
            return format!("INSERT INTO {table} DEFAULT VALUES");
        }
        let columns: Vec<String> = self
            .values
            .keys()
            .map(|column| quote_identifier(column, self.quote))
            .collect();
        let values: Vec<String> = self
            .values
            .values()
            .map(|value| match value {
                Assign::Raw(raw) => raw.as_str().to_string(),
                Assign::Value(value) => {
                    params.push(value.clone());
                    "?".to_string()
                }
            })
            .collect();

        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        )
    }

    fn compile_update(&self, params: &mut Vec<Value>) -> String {
        let table = self.source_sql(params);
        let assignments: Vec<String> = self
            .values
            .iter()
            .map(|(column, value)| {
                let column = quote_identifier(column, self.quote);
                match value {
                    Assign::Raw(raw) => format!("{column} = {raw}"),
                    // NULL resets the column to its default instead of binding NULL.
                    Assign::Value(Value::Null) => format!("{column} = DEFAULT({column})"),
                    Assign::Value(value) => {
                        params.push(value.clone());
                        format!("{column} = ?")
                    }
                }
            })
            .collect();

        let mut parts = vec![format!("UPDATE {table} SET {}", assignments.join(", "))];
        if !self.wheres.is_empty() {
            parts.push(format!("WHERE {}", self.wheres.build(self.quote, params)));
        }
        parts.join(" ")
    }

    fn compile_delete(&self, params: &mut Vec<Value>) -> String {
        let mut parts = vec![format!("DELETE FROM {}", self.source_sql(params))];
        if !self.wheres.is_empty() {
            parts.push(format!("WHERE {}", self.wheres.build(self.quote, params)));
        }
        parts.join(" ")
    }

    fn compile_select(&self, params: &mut Vec<Value>) -> String {
        let mut parts: Vec<String> = Vec::new();

        parts.push("SELECT".to_string());
        if self.distinct {
            parts.push("DISTINCT".to_string());
        }
        if self.select.is_empty() {
            parts.push("*".to_string());
        } else {
            let items: Vec<String> = self.select.iter().map(|i| self.select_item_sql(i)).collect();
            parts.push(items.join(", "));
        }

        parts.push(format!("FROM {}", self.source_sql(params)));
        if let Some(alias) = &self.alias {
            parts.push(format!("AS {}", quote_table(alias, self.quote)));
        }

        for join in &self.joins {
            parts.push(format!(
                "{} JOIN {}",
                join.kind.as_str(),
                quote_table(&join.table, self.quote)
            ));
            if let Some(alias) = &join.alias {
                parts.push(format!("AS {}", quote_table(alias, self.quote)));
            }

            let has_on = !join.on.is_empty();
            if has_on {
                parts.push(format!("ON {}", join.on.build(self.quote, params)));
            }
            if !join.on_where.is_empty() {
                let conditions = join.on_where.build(self.quote, params);
                match join.on_where.first_logic() {
                    Some(logic) if has_on => parts.push(format!("{} {conditions}", logic.as_str())),
                    _ => parts.push(format!("ON {conditions}")),
                }
            }
        }

        if !self.wheres.is_empty() {
            parts.push(format!("WHERE {}", self.wheres.build(self.quote, params)));
        }

        if !self.groups.is_empty() {
            let groups: Vec<String> = self.groups.iter().map(|g| self.expr_sql(g)).collect();
            parts.push(format!("GROUP BY {}", groups.join(", ")));
        }

        if !self.havings.is_empty() {
            parts.push(format!("HAVING {}", self.havings.build(self.quote, params)));
        }

        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|(expr, direction)| format!("{} {}", self.expr_sql(expr), direction.as_str()))
                .collect();
            parts.push(format!("ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = self.limit {
            parts.push(format!("LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            parts.push(format!("OFFSET {offset}"));
        }

        let mut sql = parts.join(" ");

        let unions = self
            .unions
            .iter()
            .map(|q| ("UNION", q))
            .chain(self.union_alls.iter().map(|q| ("UNION ALL", q)));
        let mut unioned = false;
        for (keyword, union) in unions {
            let (union_sql, union_params) = union.compile();
            params.extend(union_params);
            if !unioned {
                sql = format!("({sql})");
                unioned = true;
            }
            sql.push_str(&format!(" {keyword} ({union_sql})"));
        }

        sql
    }
}
