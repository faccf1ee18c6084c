//! In-memory fakes for the store and identity ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::{AuthUser, IdentityError, IdentityProvider};
use crate::config::{Config, ErrorStatusMode};
use crate::store::{Filter, NewestFirst, Record, RecordStore, StoreError};
use crate::{build_router, AppState};

/// Tables keyed by name, rows in insertion order.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<&'static str, Vec<Record>>>,
    calls: AtomicUsize,
}

fn id_of(row: &Record) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn matches(row: &Record, filter: &Filter) -> bool {
    let user_id = filter.user_id.to_string();
    let owner = row.get("user_id").and_then(Value::as_str) == Some(user_id.as_str());
    let id = match &filter.id {
        Some(id) => id_of(row).as_deref() == Some(id.as_str()),
        None => true,
    };
    owner && id
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of port calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Row by id regardless of owner, bypassing the call counter.
    pub async fn find(&self, table: &str, id: &str) -> Option<Record> {
        let tables = self.tables.lock().await;
        tables
            .get(table)?
            .iter()
            .find(|row| id_of(row).as_deref() == Some(id))
            .cloned()
    }

    pub async fn rows(&self, table: &str) -> Vec<Record> {
        let tables = self.tables.lock().await;
        tables.get(table).cloned().unwrap_or_default()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn select(
        &self,
        table: &'static str,
        filter: &Filter,
        order: Option<NewestFirst>,
    ) -> Result<Vec<Record>, StoreError> {
        self.touch();
        let tables = self.tables.lock().await;
        let mut rows: Vec<Record> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, filter)).cloned().collect())
            .unwrap_or_default();

        if let Some(NewestFirst(column)) = order {
            rows.sort_by(|a, b| {
                let a = a.get(column).and_then(Value::as_str).unwrap_or_default();
                let b = b.get(column).and_then(Value::as_str).unwrap_or_default();
                b.cmp(a)
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: &'static str, mut row: Record) -> Result<Record, StoreError> {
        self.touch();
        row.insert("id".into(), Value::from(Uuid::new_v4().to_string()));
        let mut tables = self.tables.lock().await;
        tables.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &'static str,
        filter: &Filter,
        patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        let mut updated = Vec::new();
        for row in tables.entry(table).or_default().iter_mut() {
            if matches(row, filter) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &'static str, filter: &Filter) -> Result<(), StoreError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| !matches(row, filter));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store whose every call fails, for readiness and error-path tests.
pub struct UnreachableStore;

#[async_trait]
impl RecordStore for UnreachableStore {
    async fn select(
        &self,
        _table: &'static str,
        _filter: &Filter,
        _order: Option<NewestFirst>,
    ) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::connection("connection refused"))
    }

    async fn insert(&self, _table: &'static str, _row: Record) -> Result<Record, StoreError> {
        Err(StoreError::connection("connection refused"))
    }

    async fn update(
        &self,
        _table: &'static str,
        _filter: &Filter,
        _patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::connection("connection refused"))
    }

    async fn delete(&self, _table: &'static str, _filter: &Filter) -> Result<(), StoreError> {
        Err(StoreError::connection("connection refused"))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::connection("connection refused"))
    }
}

/// Identity provider with a fixed token table.
#[derive(Default)]
pub struct StaticIdentity {
    users: HashMap<String, Option<Uuid>>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, user_id: Uuid) -> Self {
        self.users.insert(token.to_string(), Some(user_id));
        self
    }

    /// A token the provider accepts without returning a user.
    pub fn with_anonymous(mut self, token: &str) -> Self {
        self.users.insert(token.to_string(), None);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify_token(&self, token: &str) -> Result<Option<AuthUser>, IdentityError> {
        match self.users.get(token) {
            Some(user) => Ok(user.map(|id| AuthUser { id })),
            None => Err(IdentityError::Rejected("invalid JWT".into())),
        }
    }
}

pub fn test_config(mode: ErrorStatusMode) -> Config {
    Config {
        supabase_url: "http://localhost:54321".into(),
        service_role_key: "service-role-key".into(),
        jwt_secret: None,
        database_url: None,
        host: "127.0.0.1".into(),
        port: 0,
        cors_allowed_origins: Vec::new(),
        error_status_mode: mode,
    }
}

pub fn test_app(
    store: Arc<dyn RecordStore>,
    identity: StaticIdentity,
    mode: ErrorStatusMode,
) -> Router {
    build_router(AppState {
        store,
        identity: Arc::new(identity),
        config: Arc::new(test_config(mode)),
    })
}
