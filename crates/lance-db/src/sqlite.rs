use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lance_types::Row;
use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;
use tracing::info;

use crate::error::DbError;
use crate::migrations::{self, BOOL_COLUMNS, JSON_COLUMNS};
use crate::query::{Filter, Query, is_valid_identifier};
use crate::store::Store;

/// Local SQLite mirror of the hosted database, used for development and tests.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, &path.display().to_string())
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?, ":memory:")
    }

    fn init(conn: Connection, label: &str) -> Result<Self, DbError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        info!("Database opened at {}", label);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| DbError::Internal(format!("DB lock poisoned: {e}")))?;
            f(&mut guard)
        })
        .await?
    }
}

#[async_trait]
impl Store for Database {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, DbError> {
        validate(query)?;
        if query.is_trivially_empty() {
            return Ok(Vec::new());
        }

        let query = query.clone();
        self.with_conn(move |conn| {
            let columns = if query.columns.is_empty() {
                "*".to_string()
            } else {
                query.columns.join(", ")
            };
            let mut params = Vec::new();
            let mut sql = format!("SELECT {} FROM {}", columns, query.table);
            sql.push_str(&where_clause(&query.filters, &mut params));

            if !query.order.is_empty() {
                let order: Vec<String> = query
                    .order
                    .iter()
                    .map(|o| format!("{} {}", o.column, if o.descending { "DESC" } else { "ASC" }))
                    .collect();
                sql.push_str(" ORDER BY ");
                sql.push_str(&order.join(", "));
            }
            match (query.limit, query.offset) {
                (Some(limit), offset) => {
                    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset.unwrap_or(0)))
                }
                (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
                (None, None) => {}
            }

            query_rows(conn, &sql, &params)
        })
        .await
    }

    async fn count(&self, query: &Query) -> Result<usize, DbError> {
        validate(query)?;
        if query.is_trivially_empty() {
            return Ok(0);
        }

        let query = query.clone();
        self.with_conn(move |conn| {
            let mut params = Vec::new();
            let mut sql = format!("SELECT COUNT(*) FROM {}", query.table);
            sql.push_str(&where_clause(&query.filters, &mut params));
            let n: i64 = conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |r| r.get(0))?;
            Ok(n.max(0) as usize)
        })
        .await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, DbError> {
        check_identifier(table)?;
        for row in &rows {
            row.keys().try_for_each(|k| check_identifier(k))?;
        }

        let table = table.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let sql = if row.is_empty() {
                    format!("INSERT INTO {table} DEFAULT VALUES RETURNING *")
                } else {
                    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
                    let placeholders: Vec<String> =
                        (1..=columns.len()).map(|i| format!("?{i}")).collect();
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                        table,
                        columns.join(", "),
                        placeholders.join(", ")
                    )
                };
                let params: Vec<SqlValue> = row.values().map(to_sql).collect();
                out.extend(query_rows(&tx, &sql, &params)?);
            }
            tx.commit()?;
            Ok(out)
        })
        .await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, DbError> {
        validate(query)?;
        patch.keys().try_for_each(|k| check_identifier(k))?;
        if patch.is_empty() || query.is_trivially_empty() {
            return Ok(Vec::new());
        }

        let query = query.clone();
        self.with_conn(move |conn| {
            let mut params: Vec<SqlValue> = patch.values().map(to_sql).collect();
            let assignments: Vec<String> = patch
                .keys()
                .enumerate()
                .map(|(i, k)| format!("{} = ?{}", k, i + 1))
                .collect();
            let mut sql = format!("UPDATE {} SET {}", query.table, assignments.join(", "));
            sql.push_str(&where_clause(&query.filters, &mut params));
            sql.push_str(" RETURNING *");
            query_rows(conn, &sql, &params)
        })
        .await
    }

    async fn delete(&self, query: &Query) -> Result<usize, DbError> {
        validate(query)?;
        if query.is_trivially_empty() {
            return Ok(0);
        }

        let query = query.clone();
        self.with_conn(move |conn| {
            let mut params = Vec::new();
            let mut sql = format!("DELETE FROM {}", query.table);
            sql.push_str(&where_clause(&query.filters, &mut params));
            Ok(conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?)
        })
        .await
    }

    async fn upsert(&self, table: &str, row: Row, on_conflict: &str) -> Result<Row, DbError> {
        check_identifier(table)?;
        check_identifier(on_conflict)?;
        row.keys().try_for_each(|k| check_identifier(k))?;

        let table = table.to_string();
        let on_conflict = on_conflict.to_string();
        self.with_conn(move |conn| {
            let columns: Vec<&str> = row.keys().map(String::as_str).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let updates: Vec<String> = columns
                .iter()
                .filter(|c| **c != on_conflict)
                .map(|c| format!("{c} = excluded.{c}"))
                .collect();
            let action = if updates.is_empty() {
                format!("DO UPDATE SET {on_conflict} = excluded.{on_conflict}")
            } else {
                format!("DO UPDATE SET {}", updates.join(", "))
            };
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {} RETURNING *",
                table,
                columns.join(", "),
                placeholders.join(", "),
                on_conflict,
                action
            );
            let params: Vec<SqlValue> = row.values().map(to_sql).collect();
            query_rows(conn, &sql, &params)?
                .into_iter()
                .next()
                .ok_or_else(|| DbError::Internal(format!("upsert into {table} returned no row")))
        })
        .await
    }
}

fn check_identifier(name: &str) -> Result<(), DbError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

fn validate(query: &Query) -> Result<(), DbError> {
    query.identifiers().try_for_each(check_identifier)
}

/// Builds ` WHERE ...` (or nothing), appending bound values to `params` so
/// placeholders keep numbering after any SET values already there.
fn where_clause(filters: &[Filter], params: &mut Vec<SqlValue>) -> String {
    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        match filter {
            Filter::Eq(column, Value::Null) | Filter::IsNull(column) => {
                clauses.push(format!("{column} IS NULL"));
            }
            Filter::Eq(column, value) => {
                params.push(to_sql(value));
                clauses.push(format!("{} = ?{}", column, params.len()));
            }
            Filter::In(column, values) => {
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    params.push(to_sql(value));
                    placeholders.push(format!("?{}", params.len()));
                }
                clauses.push(format!("{} IN ({})", column, placeholders.join(", ")));
            }
            Filter::ILikeAny { columns, needle } => {
                params.push(SqlValue::Text(format!("%{}%", escape_like(&needle.to_lowercase()))));
                let n = params.len();
                let any: Vec<String> = columns
                    .iter()
                    .map(|c| format!("lower({c}) LIKE ?{n} ESCAPE '\\'"))
                    .collect();
                clauses.push(format!("({})", any.join(" OR ")));
            }
        }
    }

    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn from_sql(column: &str, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if BOOL_COLUMNS.contains(&column) => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => {
            let text = String::from_utf8_lossy(t);
            if JSON_COLUMNS.contains(&column) {
                serde_json::from_str(&text).unwrap_or(Value::String(text.into_owned()))
            } else {
                Value::String(text.into_owned())
            }
        }
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn query_rows(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |r| {
            let mut row = Row::new();
            for (i, name) in names.iter().enumerate() {
                row.insert(name.clone(), from_sql(name, r.get_ref(i)?));
            }
            Ok(row)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}
