//! HTTP client for a mounted gateway
//!
//! Holds no database credentials. Every call goes through the gateway's single
//! endpoint, bound to one table.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::database::traits::DatabaseError;
use crate::rest::error_for_status;
use crate::schema::{FieldSet, FilterSet, Mutation, MutationResult};
use crate::{Error, Result};

/// Query-string prefix marking a filter, so columns named `table` or `limit`
/// can still be filtered on
pub const FILTER_PREFIX: &str = "f_";

#[derive(Serialize)]
struct WriteRequest<'a> {
    table: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a FieldSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a FilterSet>,
}

/// Client bound to one table behind a gateway endpoint
///
/// # Example
///
/// ```rust,no_run
/// use axum_table_gateway::{ColumnValues, GatewayClient};
/// use url::Url;
///
/// # async fn example() -> axum_table_gateway::Result<()> {
/// let endpoint = Url::parse("http://127.0.0.1:3000/api/db").unwrap();
/// let records = GatewayClient::new(endpoint, "hospital_records");
///
/// let data: ColumnValues = [("patient_name", "Alice")].into_iter().collect();
/// let inserted = records.insert(&data).await?;
/// println!("inserted {}", inserted["id"]);
/// # Ok(())
/// # }
/// ```
pub struct GatewayClient {
    client: reqwest::Client,
    endpoint: Url,
    table: String,
}

impl GatewayClient {
    pub fn new(endpoint: Url, table: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            table: table.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every row of the table
    pub async fn select_all(&self) -> Result<Vec<Value>> {
        self.select_limited(&FilterSet::new(), None).await
    }

    /// Rows matching every filter
    pub async fn select(&self, filters: &FilterSet) -> Result<Vec<Value>> {
        self.select_limited(filters, None).await
    }

    pub async fn select_limited(&self, filters: &FilterSet, limit: Option<u64>) -> Result<Vec<Value>> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("table", &self.table);
            for (column, value) in filters.iter() {
                query.append_pair(&format!("{FILTER_PREFIX}{column}"), &value.to_filter_text());
            }
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }

        self.send(self.client.get(url)).await
    }

    /// Insert one record and return the stored row
    pub async fn insert(&self, data: &FieldSet) -> Result<Value> {
        let body = WriteRequest {
            table: &self.table,
            data: Some(data),
            filters: None,
        };
        self.send(self.client.post(self.endpoint.clone()).json(&body))
            .await
    }

    /// Update matching rows; refuses to send a request without filters
    pub async fn update(&self, data: &FieldSet, filters: &FilterSet) -> Result<MutationResult> {
        if filters.is_empty() {
            return Err(Error::MissingFilter(Mutation::Update));
        }

        let body = WriteRequest {
            table: &self.table,
            data: Some(data),
            filters: Some(filters),
        };
        self.send(self.client.request(Method::PATCH, self.endpoint.clone()).json(&body))
            .await
    }

    /// Delete matching rows; refuses to send a request without filters
    pub async fn delete(&self, filters: &FilterSet) -> Result<MutationResult> {
        if filters.is_empty() {
            return Err(Error::MissingFilter(Mutation::Delete));
        }

        let body = WriteRequest {
            table: &self.table,
            data: None,
            filters: Some(filters),
        };
        self.send(self.client.request(Method::DELETE, self.endpoint.clone()).json(&body))
            .await
    }

    /// `true` when a one-row read succeeds
    pub async fn test_connection(&self) -> bool {
        match self.select_limited(&FilterSet::new(), Some(1)).await {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(%error, table = %self.table, "connection test failed");
                false
            }
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(DatabaseError::from)?;
        let response = error_for_status(response).await?;
        Ok(response.json().await.map_err(DatabaseError::from)?)
    }
}
