use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{Filter, NewestFirst, Record, RecordStore, StoreError};

/// Store talking to Postgres directly over a `sqlx` pool.
///
/// Rows are converted with `row_to_json` on the way out and
/// `jsonb_populate_record` on the way in, so column types stay the
/// database's business. Table and column names are only ever taken from the
/// static resource definitions, never from request input.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let db = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(StoreError::from)?;
        Ok(Self::new(db))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::connection(e.to_string())
            }
            sqlx::Error::Database(db) => StoreError::query(db.message()),
            other => StoreError::query(other.to_string()),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list<'a>(columns: impl IntoIterator<Item = &'a String>) -> String {
    columns
        .into_iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `$1` is the owner, `$2` the record id when the filter has one.
fn select_sql(table: &str, by_id: bool, order: Option<NewestFirst>) -> String {
    let mut sql = format!(
        "SELECT row_to_json(t.*) FROM {} AS t WHERE t.user_id = $1",
        quote_ident(table)
    );
    if by_id {
        sql.push_str(" AND t.id::text = $2");
    }
    if let Some(NewestFirst(column)) = order {
        sql.push_str(&format!(" ORDER BY t.{} DESC", quote_ident(column)));
    }
    sql
}

/// `$1` is the row as a JSON object.
fn insert_sql(table: &str, columns: &str) -> String {
    let table = quote_ident(table);
    format!(
        "INSERT INTO {table} AS t ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING row_to_json(t.*)"
    )
}

/// `$1` is the patch, `$2` the owner, `$3` the record id.
fn update_sql(table: &str, columns: &str) -> String {
    let table = quote_ident(table);
    format!(
        "UPDATE {table} AS t SET ({columns}) = \
         (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) \
         WHERE t.user_id = $2 AND t.id::text = $3 \
         RETURNING row_to_json(t.*)"
    )
}

/// `$1` is the owner, `$2` the record id.
fn delete_sql(table: &str) -> String {
    format!(
        "DELETE FROM {} AS t WHERE t.user_id = $1 AND t.id::text = $2",
        quote_ident(table)
    )
}

fn into_record(value: Value) -> Result<Record, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::query(format!("expected a row object, got {}", other))),
    }
}

fn require_id(filter: &Filter) -> Result<&str, StoreError> {
    filter
        .id
        .as_deref()
        .ok_or_else(|| StoreError::query("record id is required"))
}

#[async_trait]
impl RecordStore for PgStore {
    async fn select(
        &self,
        table: &'static str,
        filter: &Filter,
        order: Option<NewestFirst>,
    ) -> Result<Vec<Record>, StoreError> {
        let sql = select_sql(table, filter.id.is_some(), order);
        let mut query = sqlx::query_scalar::<_, Value>(&sql).bind(filter.user_id);
        if let Some(id) = &filter.id {
            query = query.bind(id);
        }

        query
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(into_record)
            .collect()
    }

    async fn insert(&self, table: &'static str, row: Record) -> Result<Record, StoreError> {
        let sql = insert_sql(table, &column_list(row.keys()));
        let value = sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(row))
            .fetch_one(&self.db)
            .await?;

        into_record(value)
    }

    async fn update(
        &self,
        table: &'static str,
        filter: &Filter,
        patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        let id = require_id(filter)?;
        if patch.is_empty() {
            return self.select(table, filter, None).await;
        }

        let sql = update_sql(table, &column_list(patch.keys()));
        sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(patch))
            .bind(filter.user_id)
            .bind(id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(into_record)
            .collect()
    }

    async fn delete(&self, table: &'static str, filter: &Filter) -> Result<(), StoreError> {
        let id = require_id(filter)?;
        let sql = delete_sql(table);
        let result = sqlx::query(&sql)
            .bind(filter.user_id)
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::debug!(table, rows = result.rows_affected(), "Delete executed");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}
