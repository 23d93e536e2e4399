use async_trait::async_trait;
use lance_types::Row;
use reqwest::Method;
use serde_json::Value;

use super::{SupabaseClient, send, send_json};
use crate::error::DbError;
use crate::query::{Filter, Query, is_valid_identifier};
use crate::store::Store;

const RETURN_ROWS: &str = "return=representation";

impl SupabaseClient {
    fn table_path(table: &str) -> Result<String, DbError> {
        if !is_valid_identifier(table) {
            return Err(DbError::InvalidIdentifier(table.to_string()));
        }
        Ok(format!("/rest/v1/{table}"))
    }
}

fn validate(query: &Query) -> Result<(), DbError> {
    match query.identifiers().find(|i| !is_valid_identifier(i)) {
        Some(bad) => Err(DbError::InvalidIdentifier(bad.to_string())),
        None => Ok(()),
    }
}

/// PostgREST scalar rendering: strings as-is, everything else as JSON text.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Values inside `in.(...)` / `or=(...)` are double quoted so reserved
/// characters (`,` `(` `)` `.`) survive.
fn quoted(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Filters as PostgREST query pairs (`col=eq.v`, `col=in.(..)`, `or=(..)`).
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| match f {
            Filter::Eq(column, Value::Null) | Filter::IsNull(column) => {
                (column.clone(), "is.null".to_string())
            }
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", scalar(value))),
            Filter::In(column, values) => {
                let list: Vec<String> = values.iter().map(|v| quoted(&scalar(v))).collect();
                (column.clone(), format!("in.({})", list.join(",")))
            }
            Filter::ILikeAny { columns, needle } => {
                // `*` is the PostgREST wildcard; a literal one cannot be expressed.
                let pattern = quoted(&format!("*{}*", needle.replace('*', "")));
                let any: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{c}.ilike.{pattern}"))
                    .collect();
                ("or".to_string(), format!("({})", any.join(",")))
            }
        })
        .collect()
}

fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        if query.columns.is_empty() {
            "*".to_string()
        } else {
            query.columns.join(",")
        },
    )];
    params.extend(filter_params(&query.filters));

    if !query.order.is_empty() {
        let order: Vec<String> = query
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.descending { "desc" } else { "asc" }))
            .collect();
        params.push(("order".to_string(), order.join(",")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = query.offset {
        params.push(("offset".to_string(), offset.to_string()));
    }
    params
}

/// Total from a `Content-Range: 0-19/42` (or `*/0`) header.
fn parse_content_range(header: &str) -> Option<usize> {
    header.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl Store for SupabaseClient {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, DbError> {
        validate(query)?;
        if query.is_trivially_empty() {
            return Ok(Vec::new());
        }

        let req = self
            .admin(Method::GET, &Self::table_path(&query.table)?)
            .query(&select_params(query));
        send_json(req).await
    }

    async fn count(&self, query: &Query) -> Result<usize, DbError> {
        validate(query)?;
        if query.is_trivially_empty() {
            return Ok(0);
        }

        let mut params = filter_params(&query.filters);
        params.push(("select".to_string(), "*".to_string()));
        params.push(("limit".to_string(), "1".to_string()));

        let req = self
            .admin(Method::GET, &Self::table_path(&query.table)?)
            .header("Prefer", "count=exact")
            .query(&params);
        let resp = send(req).await?;

        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| DbError::Internal("count response without Content-Range".into()))
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, DbError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let req = self
            .admin(Method::POST, &Self::table_path(table)?)
            .header("Prefer", RETURN_ROWS)
            .json(&rows);
        send_json(req).await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, DbError> {
        validate(query)?;
        if patch.is_empty() || query.is_trivially_empty() {
            return Ok(Vec::new());
        }

        let req = self
            .admin(Method::PATCH, &Self::table_path(&query.table)?)
            .header("Prefer", RETURN_ROWS)
            .query(&filter_params(&query.filters))
            .json(&patch);
        send_json(req).await
    }

    async fn delete(&self, query: &Query) -> Result<usize, DbError> {
        validate(query)?;
        if query.is_trivially_empty() {
            return Ok(0);
        }

        let req = self
            .admin(Method::DELETE, &Self::table_path(&query.table)?)
            .header("Prefer", RETURN_ROWS)
            .query(&filter_params(&query.filters));
        let deleted: Vec<Row> = send_json(req).await?;
        Ok(deleted.len())
    }

    async fn upsert(&self, table: &str, row: Row, on_conflict: &str) -> Result<Row, DbError> {
        if !is_valid_identifier(on_conflict) {
            return Err(DbError::InvalidIdentifier(on_conflict.to_string()));
        }

        let req = self
            .admin(Method::POST, &Self::table_path(table)?)
            .header("Prefer", format!("resolution=merge-duplicates,{RETURN_ROWS}"))
            .query(&[("on_conflict", on_conflict)])
            .json(&[row]);
        let rows: Vec<Row> = send_json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::Internal(format!("upsert into {table} returned no row")))
    }
}
