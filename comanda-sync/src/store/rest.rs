//! PostgREST-style HTTP store
//!
//! Table rows live under `{url}/rest/v1/{table}` and the daily counter is the
//! `get_daily_order_number` RPC. Every request carries the project API key as
//! both `apikey` and bearer token.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{Order, OrderPatch};

use super::{OrderQuery, OrderStore};
use crate::config::RemoteConfig;
use crate::error::{StoreError, StoreResult};

const DAILY_NUMBER_RPC: &str = "get_daily_order_number";

/// HTTP adapter for the hosted order table
#[derive(Debug, Clone)]
pub struct RestOrderStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestOrderStore {
    pub fn new(config: &RemoteConfig, table: impl Into<String>) -> StoreResult<Self> {
        if !config.has_store() {
            return Err(StoreError::InvalidConfig(
                "STORE_URL and STORE_API_KEY are required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.store_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: table.into(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, name)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    /// Map non-2xx responses to [`StoreError`]
    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
        let response = Self::check(response).await?;
        response.json().await.map_err(Into::into)
    }
}

/// Query-string pairs for a select
pub(crate) fn query_params(query: &OrderQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if let Some(status) = query.status {
        params.push(("status".to_string(), format!("eq.{}", status.as_str())));
    }
    if let Some(number) = query.order_number {
        params.push(("order_number".to_string(), format!("eq.{number}")));
    }
    if let Some(since) = query.created_since {
        params.push(("created_at".to_string(), format!("gte.{}", since.to_rfc3339())));
    }
    let direction = if query.newest_first { "desc" } else { "asc" };
    params.push(("order".to_string(), format!("created_at.{direction}")));
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// The RPC answers with a bare number or a one-element array
fn parse_daily_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::Array(items) => items.first().and_then(parse_daily_number),
        Value::Object(map) => map.get(DAILY_NUMBER_RPC).and_then(parse_daily_number),
        _ => None,
    }
}

#[async_trait]
impl OrderStore for RestOrderStore {
    async fn select(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let request = self
            .client
            .get(self.table_url())
            .query(&query_params(query));
        let response = self.authorized(request).send().await?;
        Self::json(response).await
    }

    async fn insert(&self, order: &Order) -> StoreResult<Order> {
        let request = self
            .client
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(order);
        let response = self.authorized(request).send().await?;
        let mut rows: Vec<Order> = Self::json(response).await?;
        if rows.is_empty() {
            return Err(StoreError::InvalidResponse(
                "insert returned no row".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, id: &str, patch: &OrderPatch) -> StoreResult<()> {
        let request = self
            .client
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .json(patch);
        let response = self.authorized(request).send().await?;
        Self::check(response).await?;
        tracing::debug!(order_id = %id, "Order row updated");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let request = self
            .client
            .delete(self.table_url())
            .query(&[("id", format!("eq.{id}"))]);
        let response = self.authorized(request).send().await?;
        Self::check(response).await?;
        tracing::debug!(order_id = %id, "Order row deleted");
        Ok(())
    }

    async fn next_order_number(&self) -> StoreResult<u32> {
        let request = self
            .client
            .post(self.rpc_url(DAILY_NUMBER_RPC))
            .json(&serde_json::json!({}));
        let response = self.authorized(request).send().await?;
        let value: Value = Self::json(response).await?;
        parse_daily_number(&value).ok_or_else(|| {
            StoreError::InvalidResponse(format!("unexpected daily number: {value}"))
        })
    }
}
