//! Small helpers over `Row` (a JSON object per table row): typed field
//! access, in-process joins and query-string parsing.

use std::collections::HashMap;

use lance_db::{DbError, Query, Store};
use lance_types::Row;
use serde_json::Value;

pub fn str_field<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

pub fn i64_field(row: &Row, key: &str) -> Option<i64> {
    row.get(key).and_then(Value::as_i64)
}

pub fn bool_field(row: &Row, key: &str) -> bool {
    row.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Ids come back as numbers or strings depending on the table; joins compare
/// them by their text form.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Keep only whitelisted keys of a client-supplied patch.
pub fn pick(body: &Row, allowed: &[&str]) -> Row {
    body.iter()
        .filter(|(k, _)| allowed.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Distinct non-null values of `column` across `rows`, in first-seen order.
pub fn collect_ids(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .filter_map(|r| r.get(column))
        .filter(|v| !v.is_null())
        .filter(|v| id_key(v).is_some_and(|k| seen.insert(k)))
        .cloned()
        .collect()
}

/// `table` rows whose `id` is in `ids`, keyed by id.
pub async fn fetch_by_ids(
    store: &dyn Store,
    table: &str,
    columns: &str,
    ids: Vec<Value>,
) -> Result<HashMap<String, Row>, DbError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = store
        .select(&Query::table(table).select(columns).in_("id", ids))
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| Some((id_key(r.get("id")?)?, r)))
        .collect())
}

/// Set `rows[i][key]` to the related row found through `fk`, or null.
pub fn attach(rows: &mut [Row], fk: &str, key: &str, related: &HashMap<String, Row>) {
    for row in rows {
        let value = row
            .get(fk)
            .and_then(id_key)
            .and_then(|id| related.get(&id))
            .map(|r| Value::Object(r.clone()))
            .unwrap_or(Value::Null);
        row.insert(key.to_string(), value);
    }
}

/// Drop `column` from every related row (it was only fetched to join on).
pub fn without(mut related: HashMap<String, Row>, column: &str) -> HashMap<String, Row> {
    for row in related.values_mut() {
        row.remove(column);
    }
    related
}

/// Lenient integer from a query string value.
pub fn parse_num(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub size: usize,
    pub offset: usize,
}

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
/// Largest offset both SQLite and PostgREST accept as an integer.
const MAX_OFFSET: usize = i64::MAX as usize;

impl Page {
    /// Page numbers start at 1; sizes are clamped to 1..=100, default 20.
    /// Unparseable values fall back to the defaults.
    pub fn parse(page: Option<&str>, size: Option<&str>) -> Self {
        let page = parse_num(page).unwrap_or(1).max(1) as usize;
        let size = parse_num(size)
            .unwrap_or(DEFAULT_PAGE_SIZE as i64)
            .clamp(1, MAX_PAGE_SIZE as i64) as usize;
        Self {
            page,
            size,
            offset: (page - 1).saturating_mul(size).min(MAX_OFFSET),
        }
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.size).collect()
    }
}
