use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use crate::auth::{authenticate, AuthUser};
use crate::error::{AppError, AppResult, SINGLE_ROW_MISMATCH};
use crate::models::{timestamp_now, Resource};
use crate::store::{Filter, NewestFirst, Record, RecordStore};
use crate::AppState;

/// Operation selected by the request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Self::Read),
            Method::POST => Some(Self::Create),
            Method::PUT => Some(Self::Update),
            Method::DELETE => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Entry point for every method on a resource route.
pub async fn handle(
    state: AppState,
    resource: &'static Resource,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match dispatch(&state, resource, &method, &uri, &headers, &body).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => e.render(state.config.error_status_mode),
    }
}

async fn dispatch(
    state: &AppState,
    resource: &'static Resource,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> AppResult<Value> {
    let operation = Operation::from_method(method).ok_or(AppError::MethodNotAllowed)?;
    let user = authenticate(state.identity.as_ref(), headers).await?;
    let store = state.store.as_ref();

    tracing::debug!(
        resource = resource.route,
        operation = ?operation,
        user_id = %user.id,
        "Dispatching record operation"
    );

    match operation {
        Operation::Read => match resource.record_id(uri.path()) {
            Some(id) => get_record(store, resource, &user, id).await.map(Value::Object),
            None => list_records(store, resource, &user)
                .await
                .map(|rows| Value::Array(rows.into_iter().map(Value::Object).collect())),
        },
        Operation::Create => {
            let body = parse_body(body)?;
            create_record(store, resource, &user, &body).await.map(Value::Object)
        }
        Operation::Update => {
            let body = parse_body(body)?;
            update_record(store, resource, &user, &body)
                .await
                .map(|row| row.map(Value::Object).unwrap_or(Value::Null))
        }
        Operation::Delete => {
            let body = parse_body(body)?;
            delete_record(store, resource, &user, &body).await?;
            Ok(json!({ "success": true }))
        }
    }
}

fn parse_body(body: &[u8]) -> AppResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::InvalidBody(
            "Request body must be a JSON object".into(),
        )),
        Err(e) => Err(AppError::InvalidBody(format!("Invalid JSON body: {}", e))),
    }
}

/// Record id from a body, accepting strings and numbers.
fn body_id(body: &Map<String, Value>) -> AppResult<String> {
    match body.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(AppError::InvalidBody("Record id is required".into())),
    }
}

pub async fn list_records(
    store: &dyn RecordStore,
    resource: &Resource,
    user: &AuthUser,
) -> AppResult<Vec<Record>> {
    let rows = store
        .select(
            resource.table,
            &Filter::owned_by(user.id),
            Some(NewestFirst(resource.order_by)),
        )
        .await?;
    Ok(rows)
}

/// Exactly one owned record; zero or several matches are an error.
pub async fn get_record(
    store: &dyn RecordStore,
    resource: &Resource,
    user: &AuthUser,
    id: &str,
) -> AppResult<Record> {
    let mut rows = store
        .select(resource.table, &Filter::record(user.id, id), None)
        .await?;

    match (rows.pop(), rows.is_empty()) {
        (Some(row), true) => Ok(row),
        _ => Err(AppError::NotFound(SINGLE_ROW_MISMATCH.into())),
    }
}

pub async fn create_record(
    store: &dyn RecordStore,
    resource: &Resource,
    user: &AuthUser,
    body: &Map<String, Value>,
) -> AppResult<Record> {
    let row = resource.new_row(user.id, body, &timestamp_now());
    let created = store.insert(resource.table, row).await?;
    Ok(created)
}

/// Overwrite an owned record. `None` when no row matched, which includes
/// rows that belong to someone else.
pub async fn update_record(
    store: &dyn RecordStore,
    resource: &Resource,
    user: &AuthUser,
    body: &Map<String, Value>,
) -> AppResult<Option<Record>> {
    let id = body_id(body)?;
    let patch = resource.patch(body);
    let updated = store
        .update(resource.table, &Filter::record(user.id, id), patch)
        .await?;

    if updated.is_empty() {
        tracing::debug!(table = resource.table, "Update matched no rows");
    }
    Ok(updated.into_iter().next())
}

/// Remove an owned record. Succeeds whether or not the row existed.
pub async fn delete_record(
    store: &dyn RecordStore,
    resource: &Resource,
    user: &AuthUser,
    body: &Map<String, Value>,
) -> AppResult<()> {
    let id = body_id(body)?;
    store
        .delete(resource.table, &Filter::record(user.id, id))
        .await?;
    Ok(())
}
