//! # axum-table-gateway
//!
//! A CRUD gateway over caller-named SQL tables, mountable as an Axum router.
//!
//! Clients send a table name, a set of column values and a set of equality
//! filters. The gateway turns them into a parameterized statement, runs it
//! against a database it holds the credentials for, and answers with a
//! uniform JSON shape.
//!
//! ## Features
//!
//! - Identifier validation for every table and column name placed in SQL text
//! - Positional binding for every value
//! - UPDATE and DELETE refuse to run without at least one usable filter
//! - PostgreSQL and SQLite through sqlx, or a hosted PostgREST endpoint
//! - Typed HTTP client for talking to a mounted gateway
//!
//! ## Response shapes
//!
//! | Method   | Operation | Body                                  |
//! |----------|-----------|---------------------------------------|
//! | `GET`    | select    | `[row, ...]`                          |
//! | `POST`   | insert    | `row` (the first inserted row)        |
//! | `PATCH`  | update    | `{"rows": [...], "rowsAffected": n}`  |
//! | `DELETE` | delete    | `{"rows": [...], "rowsAffected": n}`  |
//! | any      | error     | `{"error": "...", "message": "..."}`  |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::Router;
//! use axum_table_gateway::TableGatewayLayer;
//! use sqlx::SqlitePool;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = SqlitePool::connect("sqlite::memory:")
//!         .await
//!         .unwrap();
//!
//!     let app = Router::new().merge(
//!         TableGatewayLayer::sqlite("/api/db", pool)
//!             .with_default_table("hospital_records")
//!             .into_router(),
//!     );
//!
//!     // Serve the application...
//! }
//! ```

// Public modules
pub mod api;
pub mod client;
pub mod database;
pub mod gateway;
pub mod identifier;
pub mod layer;
pub mod query;
pub mod rest;
pub mod schema;

// Public exports
pub use client::GatewayClient;
pub use gateway::{SqlGateway, TableGateway};
pub use identifier::{is_valid_identifier, Identifier};
pub use layer::{TableGatewayLayer, DEFAULT_TABLE};
pub use query::{QueryBuilder, Statement};
pub use rest::RestGateway;
pub use schema::{
    ColumnValues, FieldSet, FilterSet, Mutation, MutationResult, ScalarValue, Write,
};

// Re-export database providers
pub use database::traits::{DatabaseError, DatabaseProvider};

#[cfg(feature = "sqlite")]
pub use database::sqlite::SqliteProvider;

#[cfg(feature = "postgres")]
pub use database::postgres::PostgresProvider;

// Error type
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Table name failed identifier validation
    #[error("Invalid table name: {0:?}")]
    InvalidIdentifier(String),

    /// Every supplied column name was rejected
    #[error("No valid column names were supplied")]
    NoValidColumns,

    #[error("{0} requires at least one field")]
    MissingData(Write),

    /// Refusal to run an UPDATE or DELETE without a predicate
    #[error("{0} requires at least one filter to prevent accidental mass {noun}", noun = .0.mass_noun())]
    MissingFilter(Mutation),

    #[error("Invalid limit: {0:?}")]
    InvalidLimit(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, Error>;
