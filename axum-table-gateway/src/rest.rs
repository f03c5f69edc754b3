//! PostgREST proxy gateway
//!
//! Forwards operations to a hosted PostgREST-style endpoint (for example a
//! Supabase project) instead of running SQL. Filters become `col=eq.<value>`
//! query parameters. Column names are not checked against the identifier
//! pattern here; the remote service resolves them against its own schema.
//! The mass-mutation gate still runs locally, before any request is sent.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_RANGE};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use url::{form_urlencoded, Url};

use crate::database::traits::DatabaseError;
use crate::gateway::TableGateway;
use crate::schema::{FieldSet, FilterSet, Mutation, MutationResult, Write};
use crate::{Error, Result};

/// Gateway that proxies to a PostgREST endpoint
pub struct RestGateway {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    schema: String,
}

impl RestGateway {
    /// Create a gateway for the project at `base_url`
    ///
    /// Requests go to `{base_url}/rest/v1/{table}`. The key is sent both as
    /// the `apikey` header and as a bearer token.
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            schema: "public".to_string(),
        }
    }

    /// Schema exposed through `Accept-Profile` / `Content-Profile`
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, table: Option<&str>, query: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                DatabaseError::Transport(format!("{} cannot be used as a base URL", self.base_url))
            })?;
            segments.pop_if_empty().extend(["rest", "v1"]);
            match table {
                Some(table) => {
                    segments.push(table);
                }
                None => {
                    segments.push("");
                }
            }
        }
        url.set_query((!query.is_empty()).then_some(query));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept-Profile", &self.schema)
            .header("Content-Profile", &self.schema)
    }

    async fn send(&self, request: RequestBuilder) -> Result<(Vec<Value>, Option<u64>)> {
        let response = request.send().await.map_err(DatabaseError::from)?;
        let response = error_for_status(response).await?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(content_range_total);
        let rows: Vec<Value> = response.json().await.map_err(DatabaseError::from)?;

        Ok((rows, total))
    }

    async fn mutate(&self, method: Method, table: &str, filters: &FilterSet, data: Option<&FieldSet>) -> Result<MutationResult> {
        let url = self.endpoint(Some(table), &filter_query(filters))?;
        let mut request = self
            .request(method, url)
            .header("Prefer", "return=representation,count=exact");
        if let Some(data) = data {
            request = request.json(data);
        }

        let (rows, total) = self.send(request).await?;
        let rows_affected = total.unwrap_or(rows.len() as u64);

        Ok(MutationResult {
            rows,
            rows_affected,
        })
    }
}

/// Encode filters as `col=eq.<value>` pairs joined by `&`
///
/// Both the column and the value are form-urlencoded.
pub fn filter_query(filters: &FilterSet) -> String {
    filters
        .iter()
        .map(|(column, value)| {
            format!(
                "{}=eq.{}",
                encode_component(column),
                encode_component(&value.to_filter_text())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(component: &str) -> String {
    form_urlencoded::byte_serialize(component.as_bytes()).collect()
}

/// Total from a `Content-Range` header such as `0-4/5` or `*/0`
fn content_range_total(header: &HeaderValue) -> Option<u64> {
    let (_, total) = header.to_str().ok()?.rsplit_once('/')?;
    total.parse().ok()
}

pub(crate) async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);

    Err(DatabaseError::Remote {
        status: status.as_u16(),
        message,
    }
    .into())
}

fn require_table(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(Error::InvalidIdentifier(String::new()));
    }
    Ok(())
}

#[async_trait]
impl TableGateway for RestGateway {
    async fn select(&self, table: &str, filters: &FilterSet, limit: Option<u64>) -> Result<Vec<Value>> {
        require_table(table)?;

        let mut query = vec!["select=*".to_string()];
        if !filters.is_empty() {
            query.push(filter_query(filters));
        }
        if let Some(limit) = limit {
            query.push(format!("limit={}", limit));
        }

        let url = self.endpoint(Some(table), &query.join("&"))?;
        let (rows, _) = self.send(self.request(Method::GET, url)).await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, data: &FieldSet) -> Result<Vec<Value>> {
        require_table(table)?;
        if data.is_empty() {
            return Err(Error::MissingData(Write::Insert));
        }

        let url = self.endpoint(Some(table), "")?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(data);

        let (rows, _) = self.send(request).await?;
        Ok(rows)
    }

    async fn update(&self, table: &str, data: &FieldSet, filters: &FilterSet) -> Result<MutationResult> {
        require_table(table)?;
        if filters.is_empty() {
            return Err(Error::MissingFilter(Mutation::Update));
        }
        if data.is_empty() {
            return Err(Error::MissingData(Write::Update));
        }

        self.mutate(Method::PATCH, table, filters, Some(data)).await
    }

    async fn delete(&self, table: &str, filters: &FilterSet) -> Result<MutationResult> {
        require_table(table)?;
        if filters.is_empty() {
            return Err(Error::MissingFilter(Mutation::Delete));
        }

        self.mutate(Method::DELETE, table, filters, None).await
    }

    async fn ping(&self) -> Result<()> {
        let url = self.endpoint(None, "")?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(DatabaseError::from)?;
        error_for_status(response).await?;
        Ok(())
    }
}
