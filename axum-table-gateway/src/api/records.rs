//! CRUD handlers for the gateway endpoint

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use url::form_urlencoded;

use super::GatewayState;
use crate::client::FILTER_PREFIX;
use crate::gateway::TableGateway;
use crate::query::MAX_LIMIT;
use crate::schema::{FilterSet, ScalarValue, WriteBody};
use crate::{Error, Result};

/// Query-string parameters consumed by the endpoint itself
#[derive(Debug, Default)]
struct QueryParams {
    table: Option<String>,
    limit: Option<String>,
    filters: FilterSet,
}

impl QueryParams {
    /// `table` and `limit` are reserved; `f_<col>` filters on `<col>`; any
    /// other parameter filters on its own name
    fn parse(raw: Option<&str>) -> Self {
        let mut params = QueryParams::default();

        for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            if let Some(column) = key.strip_prefix(FILTER_PREFIX) {
                params.filters.insert(column, ScalarValue::Text(value.into_owned()));
                continue;
            }

            match &*key {
                "table" => params.table = Some(value.into_owned()),
                "limit" => params.limit = Some(value.into_owned()),
                _ => params.filters.insert(key.into_owned(), ScalarValue::Text(value.into_owned())),
            }
        }

        params
    }
}

/// Positive row limit; fractional values are truncated and oversized values
/// are capped at [`MAX_LIMIT`]
fn parse_limit(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();

    let limit = match trimmed.parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            let value: f64 = trimmed
                .parse()
                .map_err(|_| Error::InvalidLimit(raw.to_string()))?;

            let truncated = value.trunc();
            if !truncated.is_finite() || truncated < 1.0 {
                return Err(Error::InvalidLimit(raw.to_string()));
            }
            // saturating cast
            truncated as u64
        }
    };

    if limit == 0 {
        return Err(Error::InvalidLimit(raw.to_string()));
    }

    Ok(limit.min(MAX_LIMIT))
}

/// Empty bodies are read as `{}`
fn parse_body(body: &Bytes) -> Result<WriteBody> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(WriteBody::default());
    }

    serde_json::from_slice(body).map_err(|error| Error::InvalidBody(error.to_string()))
}

/// Body table, then query-string table, then the configured default
fn resolve_table<G>(state: &GatewayState<G>, body: Option<String>, query: Option<String>) -> String {
    body.or(query)
        .unwrap_or_else(|| state.default_table.to_string())
}

/// Handler for GET {base}
///
/// Query parameters:
/// - table: Target table (optional, defaults to the configured table)
/// - limit: Maximum rows to return (optional, positive)
/// - anything else: equality filter, `f_` prefix stripped
pub async fn select_handler<G: TableGateway>(
    State(state): State<GatewayState<G>>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<Value>>> {
    let params = QueryParams::parse(raw_query.as_deref());
    let limit = params.limit.as_deref().map(parse_limit).transpose()?;
    let table = resolve_table(&state, None, params.table);

    let rows = state.gateway.select(&table, &params.filters, limit).await?;
    tracing::debug!(table = %table, rows = rows.len(), "select completed");

    Ok(Json(rows))
}

/// Handler for POST {base}
///
/// Body: `{"table": "...", "data": {...}}`. Answers with the inserted row,
/// or `[]` when the store returned none.
pub async fn insert_handler<G: TableGateway>(
    State(state): State<GatewayState<G>>,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response> {
    let body = parse_body(&body)?;
    let params = QueryParams::parse(raw_query.as_deref());
    let table = resolve_table(&state, body.table, params.table);
    let data = body.data.unwrap_or_default();

    let rows = state.gateway.insert(&table, &data).await?;
    tracing::debug!(table = %table, "insert completed");

    let inserted = rows
        .into_iter()
        .next()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    Ok(Json(inserted).into_response())
}

/// Handler for PATCH {base}
///
/// Body: `{"table": "...", "data": {...}, "filters": {...}}`. Without a
/// `filters` key the query-string filters are used.
pub async fn update_handler<G: TableGateway>(
    State(state): State<GatewayState<G>>,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response> {
    let body = parse_body(&body)?;
    let params = QueryParams::parse(raw_query.as_deref());
    let table = resolve_table(&state, body.table, params.table);
    let filters = body.filters.unwrap_or(params.filters);
    let data = body.data.unwrap_or_default();

    let result = state.gateway.update(&table, &data, &filters).await?;
    tracing::debug!(table = %table, rows_affected = result.rows_affected, "update completed");

    Ok(Json(result).into_response())
}

/// Handler for DELETE {base}
///
/// Body: `{"table": "...", "filters": {...}}`. Without a `filters` key the
/// query-string filters are used.
pub async fn delete_handler<G: TableGateway>(
    State(state): State<GatewayState<G>>,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response> {
    let body = parse_body(&body)?;
    let params = QueryParams::parse(raw_query.as_deref());
    let table = resolve_table(&state, body.table, params.table);
    let filters = body.filters.unwrap_or(params.filters);

    let result = state.gateway.delete(&table, &filters).await?;
    tracing::debug!(table = %table, rows_affected = result.rows_affected, "delete completed");

    Ok(Json(result).into_response())
}

/// Fallback for methods the endpoint does not serve
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}
