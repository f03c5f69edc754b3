//! TableGatewayLayer - Main Axum integration layer
//!
//! This module provides the entry point for mounting the gateway into an Axum
//! application.

use axum::http::{header, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use url::Url;

use crate::api::{create_api_router, GatewayState};
use crate::gateway::{SqlGateway, TableGateway};
use crate::rest::RestGateway;

#[cfg(feature = "sqlite")]
use crate::database::sqlite::SqliteProvider;

#[cfg(feature = "postgres")]
use crate::database::postgres::PostgresProvider;

/// Table used when neither the body nor the query string names one
pub const DEFAULT_TABLE: &str = "hospital_records";

/// Main layer for mounting a table gateway into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use axum_table_gateway::TableGatewayLayer;
/// use sqlx::SqlitePool;
///
/// # async fn example() {
/// let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
/// let gateway = TableGatewayLayer::sqlite("/api/db", pool);
/// let app = Router::new().merge(gateway.into_router());
/// # }
/// ```
pub struct TableGatewayLayer<G: TableGateway> {
    base_path: String,
    gateway: Arc<G>,
    default_table: String,
}

impl<G: TableGateway> TableGatewayLayer<G> {
    /// Create a new gateway at the given base path
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path of the CRUD endpoint (e.g., "/api/db")
    /// * `gateway` - The gateway implementation
    pub fn new(base_path: impl Into<String>, gateway: G) -> Self {
        Self::from_arc(base_path, Arc::new(gateway))
    }

    /// Share a gateway that is also held elsewhere (for example to close it
    /// on shutdown)
    pub fn from_arc(base_path: impl Into<String>, gateway: Arc<G>) -> Self {
        Self {
            base_path: base_path.into(),
            gateway,
            default_table: DEFAULT_TABLE.to_string(),
        }
    }

    pub fn with_default_table(mut self, table: impl Into<String>) -> Self {
        self.default_table = table.into();
        self
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router includes:
    /// - The CRUD endpoint at `{base_path}`
    /// - A connectivity check at `{base_path}/health`
    /// - CORS for any origin with the methods the endpoint serves
    pub fn into_router(self) -> Router {
        let state = GatewayState {
            gateway: self.gateway,
            default_table: Arc::from(self.default_table),
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        create_api_router(&self.base_path, state).layer(cors)
    }
}

#[cfg(feature = "sqlite")]
impl TableGatewayLayer<SqlGateway<SqliteProvider>> {
    /// Create a new gateway for SQLite
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path of the CRUD endpoint
    /// * `pool` - The SQLite connection pool
    pub fn sqlite(base_path: impl Into<String>, pool: sqlx::SqlitePool) -> Self {
        Self::new(base_path, SqlGateway::new(SqliteProvider::new(pool)))
    }
}

#[cfg(feature = "postgres")]
impl TableGatewayLayer<SqlGateway<PostgresProvider>> {
    /// Create a new gateway for PostgreSQL
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path of the CRUD endpoint
    /// * `pool` - The PostgreSQL connection pool
    pub fn postgres(base_path: impl Into<String>, pool: sqlx::PgPool) -> Self {
        Self::new(base_path, SqlGateway::new(PostgresProvider::new(pool)))
    }
}

impl TableGatewayLayer<RestGateway> {
    /// Create a new gateway proxying to a PostgREST endpoint
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path of the CRUD endpoint
    /// * `base_url` - Project URL; requests go to `{base_url}/rest/v1/{table}`
    /// * `api_key` - Key sent as `apikey` and bearer token
    pub fn rest(base_path: impl Into<String>, base_url: Url, api_key: impl Into<String>) -> Self {
        Self::new(base_path, RestGateway::new(base_url, api_key))
    }
}
