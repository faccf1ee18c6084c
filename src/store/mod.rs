//! Record store port and its adapters.
//!
//! Handlers never talk to a database directly. They go through
//! [`RecordStore`], which exposes the handful of scoped table operations the
//! endpoints need. Rows travel as JSON objects because column types are owned
//! by the backing store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod postgres;
pub mod postgrest;

pub use postgres::PgStore;
pub use postgrest::PostgrestStore;

/// A single table row as returned by the store.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the connection broke mid-request.
    #[error("{message}")]
    Connection { message: String },

    /// The store rejected or failed to execute the operation.
    #[error("{message}")]
    Query { message: String },
}

impl StoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Row filter applied to every scoped operation.
///
/// `user_id` is always present; `id` narrows the match to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub user_id: Uuid,
    pub id: Option<String>,
}

impl Filter {
    pub fn owned_by(user_id: Uuid) -> Self {
        Self { user_id, id: None }
    }

    pub fn record(user_id: Uuid, id: impl Into<String>) -> Self {
        Self {
            user_id,
            id: Some(id.into()),
        }
    }
}

/// Descending sort on a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewestFirst(pub &'static str);

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of `table` matching `filter`, optionally sorted newest first.
    async fn select(
        &self,
        table: &'static str,
        filter: &Filter,
        order: Option<NewestFirst>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Insert one row and return it as stored, generated columns included.
    async fn insert(&self, table: &'static str, row: Record) -> Result<Record, StoreError>;

    /// Overwrite the columns in `patch` on every matching row. Returns the
    /// updated rows, which is empty when nothing matched.
    async fn update(
        &self,
        table: &'static str,
        filter: &Filter,
        patch: Record,
    ) -> Result<Vec<Record>, StoreError>;

    /// Remove every matching row. Matching nothing is not an error.
    async fn delete(&self, table: &'static str, filter: &Filter) -> Result<(), StoreError>;

    /// Cheap round trip used by the readiness check.
    async fn ping(&self) -> Result<(), StoreError>;
}
