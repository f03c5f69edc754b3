//! Standalone table gateway server
//!
//! Serves the CRUD endpoint over Postgres, SQLite or a PostgREST project,
//! depending on configuration.

use std::str::FromStr;
use std::sync::Arc;

use axum::{routing::get, Router};
use axum_table_gateway::{
    PostgresProvider, RestGateway, SqlGateway, SqliteProvider, TableGateway, TableGatewayLayer,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;

use config::{Backend, Config, DEFAULT_SQLITE_URL};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "gateway_server=debug,axum_table_gateway=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        address = %config.address,
        base_path = %config.base_path,
        backend = config.backend.name(),
        default_table = %config.default_table,
        "starting table gateway"
    );

    match &config.backend {
        Backend::Postgres { url } => {
            let options = PgConnectOptions::from_str(url)?
                .options([("search_path", config.schema.as_str())]);
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect_with(options)
                .await?;

            let gateway = SqlGateway::new(PostgresProvider::new(pool));
            serve(&config, Arc::new(gateway)).await
        }
        Backend::Sqlite { url } => {
            if url == DEFAULT_SQLITE_URL {
                tokio::fs::create_dir_all("./data").await?;
            }

            let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?;

            // Run database setup and seed sample data
            database::setup(&pool, &config.default_table).await?;

            let gateway = SqlGateway::new(SqliteProvider::new(pool));
            serve(&config, Arc::new(gateway)).await
        }
        Backend::Rest { base_url, api_key } => {
            let gateway =
                RestGateway::new(base_url.clone(), api_key.clone()).with_schema(&config.schema);
            serve(&config, Arc::new(gateway)).await
        }
    }
}

async fn serve<G: TableGateway>(config: &Config, gateway: Arc<G>) -> anyhow::Result<()> {
    if let Err(error) = gateway.ping().await {
        // The health endpoint keeps reporting this; requests may still succeed later
        tracing::warn!(%error, "store is not reachable yet");
    }

    let app = Router::new()
        .route("/", get(root_handler))
        .merge(
            TableGatewayLayer::from_arc(config.base_path.clone(), gateway.clone())
                .with_default_table(config.default_table.clone())
                .into_router(),
        )
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.address).await?;
    tracing::info!("gateway listening on http://{}{}", config.address, config.base_path);
    tracing::info!("health check at http://{}{}/health", config.address, config.base_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down, closing store connections");
    gateway.close().await;

    Ok(())
}

async fn root_handler() -> &'static str {
    "Table gateway is running"
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
