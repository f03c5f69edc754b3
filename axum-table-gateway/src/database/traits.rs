//! Database provider trait
//!
//! This trait defines the interface that all SQL backends must provide. A
//! provider only executes statements; it never sees raw identifiers or
//! decides whether a statement is safe to run.

use crate::query::Statement;
use crate::schema::MutationResult;
use async_trait::async_trait;
use thiserror::Error;

/// Executes prepared statements against a connection pool
///
/// The provider owns the pool for the lifetime of the process. Handlers only
/// ever reach it through the gateway state.
#[async_trait]
pub trait DatabaseProvider: Send + Sync + 'static {
    /// Run a row-returning statement
    ///
    /// # Returns
    ///
    /// Every row as a JSON object, in the order the store produced them
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<serde_json::Value>, DatabaseError>;

    /// Run a data-modifying statement with a `RETURNING` clause
    ///
    /// # Returns
    ///
    /// The returned rows together with the affected-row count reported by
    /// the store
    async fn execute_returning(&self, statement: &Statement) -> Result<MutationResult, DatabaseError>;

    /// Round trip to the store to check connectivity
    async fn ping(&self) -> Result<(), DatabaseError>;

    /// Stop handing out connections and wait for in-flight ones to return
    async fn close(&self) {}
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Statement failed in the store (constraint violation, missing table,
    /// connectivity, ...)
    #[error("Database error: {0}")]
    Query(String),

    /// A returned value could not be converted to JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// Remote REST endpoint answered with a non-success status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Remote REST endpoint could not be reached
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::Decode(error.to_string())
            }
            _ => DatabaseError::Query(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for DatabaseError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            DatabaseError::Decode(error.to_string())
        } else {
            DatabaseError::Transport(error.to_string())
        }
    }
}
