use async_trait::async_trait;
use lance_types::Row;

use crate::error::DbError;
use crate::query::Query;

/// Table access on the data platform.
///
/// Writes return the affected rows (PostgREST `return=representation`,
/// SQLite `RETURNING *`), so handlers can pass them straight back.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, DbError>;

    /// Number of rows matching the filters; window and order are ignored.
    async fn count(&self, query: &Query) -> Result<usize, DbError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, DbError>;

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, DbError>;

    /// Returns the number of deleted rows.
    async fn delete(&self, query: &Query) -> Result<usize, DbError>;

    /// Insert, or update the existing row colliding on `on_conflict`.
    async fn upsert(&self, table: &str, row: Row, on_conflict: &str) -> Result<Row, DbError>;

    async fn select_one(&self, query: &Query) -> Result<Option<Row>, DbError> {
        let query = query.clone().limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn insert_one(&self, table: &str, row: Row) -> Result<Row, DbError> {
        self.insert(table, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::Internal(format!("insert into {table} returned no row")))
    }
}
