// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Table-level access to the hosted store. Implemented over HTTP by
/// [`crate::RestClient`] and in memory by the test kit.
pub trait Backend {
    fn select(&self, query: &Query) -> Result<Rows>;
    fn insert(&self, table: &str, row: &Value) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    pub rows: Vec<Value>,
    /// Total matching rows, present when the query asked for an exact count.
    pub total: Option<usize>,
}

impl Rows {
    pub fn decode<T: DeserializeOwned>(self, table: &str) -> Result<Vec<T>> {
        self.rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                serde_json::from_value(row).with_context(|| format!("decode {table} row {index}"))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Literal {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Text(expected), Value::String(actual)) => expected == actual,
            (Self::Int(expected), Value::Number(actual)) => actual.as_i64() == Some(*expected),
            (Self::Int(expected), Value::String(actual)) => actual == &expected.to_string(),
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { column: String, value: Literal },
    /// Case-insensitive substring match on any of the columns.
    ContainsAny { columns: Vec<String>, term: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    filters: Vec<Filter>,
    order: Vec<(String, Direction)>,
    offset: Option<usize>,
    limit: Option<usize>,
    count_exact: bool,
}

impl Query {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_owned(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            offset: None,
            limit: None,
            count_exact: false,
        }
    }

    /// Columns to return; an empty list selects every column.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|column| (*column).to_owned()).collect();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Literal>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_owned(),
            value: value.into(),
        });
        self
    }

    pub fn contains_any(mut self, columns: &[&str], term: &str) -> Self {
        self.filters.push(Filter::ContainsAny {
            columns: columns.iter().map(|column| (*column).to_owned()).collect(),
            term: term.to_owned(),
        });
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push((column.to_owned(), direction));
        self
    }

    /// Inclusive row range, `from..=to`.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count_exact = true;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[(String, Direction)] {
        &self.order
    }

    pub const fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub const fn limit_rows(&self) -> Option<usize> {
        self.limit
    }

    pub const fn wants_count(&self) -> bool {
        self.count_exact
    }

    /// PostgREST query-string parameters for this query.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let select = if self.columns.is_empty() {
            "*".to_owned()
        } else {
            self.columns.join(",")
        };
        params.push(("select".to_owned(), select));

        for filter in &self.filters {
            match filter {
                Filter::Eq { column, value } => {
                    params.push((column.clone(), format!("eq.{value}")));
                }
                Filter::ContainsAny { columns, term } => {
                    let pattern = ilike_pattern(term);
                    if let [column] = columns.as_slice() {
                        params.push((column.clone(), format!("ilike.{pattern}")));
                    } else {
                        let quoted = quote_logic_value(&pattern);
                        let branches = columns
                            .iter()
                            .map(|column| format!("{column}.ilike.{quoted}"))
                            .collect::<Vec<_>>()
                            .join(",");
                        params.push(("or".to_owned(), format!("({branches})")));
                    }
                }
            }
        }

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, direction)| format!("{column}.{}", direction.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_owned(), order));
        }
        if let Some(offset) = self.offset
            && offset > 0
        {
            params.push(("offset".to_owned(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_owned(), limit.to_string()));
        }
        params
    }
}

/// `*term*` with the ILIKE metacharacters of the term escaped.
fn ilike_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('*');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('*');
    out
}

/// Values inside `or=(...)` must be double-quoted when they contain
/// PostgREST delimiters.
fn quote_logic_value(value: &str) -> String {
    if !value.contains([',', '(', ')', '.', ':', '"', '\\', ' ']) {
        return value.to_owned();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::{Direction, Literal, Query, Rows};
    use serde::Deserialize;
    use serde_json::json;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn paged_search_query_renders_postgrest_params() {
        let query = Query::new("remedies")
            .select(&["id", "name"])
            .contains_any(&["name", "description"], "gin")
            .order("name", Direction::Ascending)
            .range(30, 59)
            .count_exact();
        let params = query.to_params();

        assert_eq!(param(&params, "select"), Some("id,name"));
        assert_eq!(
            param(&params, "or"),
            Some("(name.ilike.*gin*,description.ilike.*gin*)")
        );
        assert_eq!(param(&params, "order"), Some("name.asc"));
        assert_eq!(param(&params, "offset"), Some("30"));
        assert_eq!(param(&params, "limit"), Some("30"));
        assert!(query.wants_count());
    }

    #[test]
    fn first_page_omits_offset_and_empty_select_is_star() {
        let params = Query::new("remedies").range(0, 29).to_params();
        assert_eq!(param(&params, "select"), Some("*"));
        assert_eq!(param(&params, "offset"), None);
        assert_eq!(param(&params, "limit"), Some("30"));
    }

    #[test]
    fn equality_filters_and_descending_order() {
        let params = Query::new("terms")
            .select(&["scope", "version", "content"])
            .eq("scope", "remedies")
            .eq("is_active", true)
            .order("version", Direction::Descending)
            .limit(1)
            .to_params();
        assert_eq!(param(&params, "scope"), Some("eq.remedies"));
        assert_eq!(param(&params, "is_active"), Some("eq.true"));
        assert_eq!(param(&params, "order"), Some("version.desc"));
        assert_eq!(param(&params, "limit"), Some("1"));
    }

    #[test]
    fn single_column_search_uses_plain_ilike() {
        let params = Query::new("remedies")
            .contains_any(&["name"], "50%_off")
            .to_params();
        assert_eq!(param(&params, "name"), Some("ilike.*50\\%\\_off*"));
    }

    #[test]
    fn delimiters_in_search_terms_are_quoted() {
        let params = Query::new("remedies")
            .contains_any(&["name", "description"], "tea, honey")
            .to_params();
        assert_eq!(
            param(&params, "or"),
            Some("(name.ilike.\"*tea, honey*\",description.ilike.\"*tea, honey*\")")
        );
    }

    #[test]
    fn literal_matching_follows_json_types() {
        assert!(Literal::from("Spring").matches(&json!("Spring")));
        assert!(!Literal::from("Spring").matches(&json!("spring")));
        assert!(Literal::from(2_i64).matches(&json!(2)));
        assert!(Literal::from(true).matches(&json!(true)));
        assert!(!Literal::from(true).matches(&json!("true")));
    }

    #[test]
    fn rows_decode_reports_the_failing_row() {
        #[derive(Debug, Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }

        let rows = Rows {
            rows: vec![json!({"name": "ok"}), json!({"nope": 1})],
            total: None,
        };
        let error = rows
            .decode::<Named>("remedies")
            .expect_err("second row should fail");
        assert!(error.to_string().contains("decode remedies row 1"));
    }
}
