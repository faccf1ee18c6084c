use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

use super::{Filter, NewestFirst, Record, RecordStore, StoreError};

/// Postgres `invalid_text_representation`, raised when an id filter value
/// cannot be cast to the column type.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// Store backed by the PostgREST data API at `{base_url}/rest/v1`.
///
/// Requests authenticate with the service role key, so row ownership is
/// enforced only by the `user_id` filter this adapter always sends.
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

/// Error body PostgREST returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// A non-2xx answer, before it is turned into a [`StoreError`].
#[derive(Debug)]
struct Rejection {
    code: Option<String>,
    message: String,
}

impl Rejection {
    /// The id in the filter is not a valid value for the id column. Such a
    /// filter matches no row, same as in the direct Postgres store.
    fn is_unmatchable_id(&self, filter: &Filter) -> bool {
        filter.id.is_some() && self.code.as_deref() == Some(INVALID_TEXT_REPRESENTATION)
    }
}

impl From<Rejection> for StoreError {
    fn from(r: Rejection) -> Self {
        StoreError::query(r.message)
    }
}

impl PostgrestStore {
    pub fn new(client: Client, base_url: &str, service_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

/// Query-string pairs for a filter and optional ordering.
pub(crate) fn query_params(filter: &Filter, order: Option<NewestFirst>) -> Vec<(&'static str, String)> {
    let mut params = vec![("user_id", format!("eq.{}", filter.user_id))];
    if let Some(id) = &filter.id {
        params.push(("id", format!("eq.{}", id)));
    }
    if let Some(NewestFirst(column)) = order {
        params.push(("order", format!("{}.desc", column)));
    }
    params
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::connection(format!("data store request failed: {}", e))
}

async fn check(response: Response) -> Result<Response, Rejection> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let rejection = match serde_json::from_str::<PostgrestErrorBody>(&text) {
        Ok(body) => Rejection {
            code: body.code,
            message: body
                .message
                .or(body.details)
                .or(body.hint)
                .unwrap_or_else(|| status.to_string()),
        },
        Err(_) if !text.is_empty() => Rejection {
            code: None,
            message: text,
        },
        Err(_) => Rejection {
            code: None,
            message: status.to_string(),
        },
    };

    tracing::debug!(
        status = status.as_u16(),
        code = ?rejection.code,
        message = %rejection.message,
        "Data store rejected request"
    );
    Err(rejection)
}

async fn rows(response: Response) -> Result<Vec<Record>, StoreError> {
    response
        .json::<Vec<Record>>()
        .await
        .map_err(|e| StoreError::query(format!("unexpected data store response: {}", e)))
}

/// Rows of a filtered call; an unmatchable id yields no rows.
async fn filtered_rows(response: Response, filter: &Filter) -> Result<Vec<Record>, StoreError> {
    match check(response).await {
        Ok(response) => rows(response).await,
        Err(r) if r.is_unmatchable_id(filter) => Ok(Vec::new()),
        Err(r) => Err(r.into()),
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn select(
        &self,
        table: &'static str,
        filter: &Filter,
        order: Option<NewestFirst>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut params = vec![("select", "*".to_string())];
        params.extend(query_params(filter, order));

        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&params)
            .send()
            .await
            .map_err(transport_error)?;

        filtered_rows(response, filter).await
    }

    async fn insert(&self, table: &'static str, row: Record) -> Result<Record, StoreError> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(transport_error)?;

        rows(check(response).await?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::query("insert returned no rows"))
    }

    async fn update(
        &self,
        table: &'static str,
        filter: &Filter,
        patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        let response = self
            .authorized(self.client.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&query_params(filter, None))
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;

        filtered_rows(response, filter).await
    }

    async fn delete(&self, table: &'static str, filter: &Filter) -> Result<(), StoreError> {
        let response = self
            .authorized(self.client.delete(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .query(&query_params(filter, None))
            .send()
            .await
            .map_err(transport_error)?;

        match check(response).await {
            Ok(_) => Ok(()),
            Err(r) if r.is_unmatchable_id(filter) => Ok(()),
            Err(r) => Err(r.into()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .authorized(self.client.get(format!("{}/rest/v1/", self.base_url)))
            .send()
            .await
            .map_err(transport_error)?;

        check(response).await?;
        Ok(())
    }
}
