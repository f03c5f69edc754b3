//! Operation-level gateway
//!
//! [`TableGateway`] is what the HTTP handlers talk to. [`SqlGateway`] builds a
//! statement with [`QueryBuilder`] and hands it to a [`DatabaseProvider`];
//! [`crate::RestGateway`] forwards the same operations to a PostgREST endpoint.
//! Validation always completes before the store is contacted.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::database::traits::DatabaseProvider;
use crate::query::{QueryBuilder, Statement};
use crate::schema::{FieldSet, FilterSet, MutationResult};
use crate::Result;

/// CRUD operations over a caller-named table
#[async_trait]
pub trait TableGateway: Send + Sync + 'static {
    /// Rows matching every filter, at most `limit` of them
    async fn select(&self, table: &str, filters: &FilterSet, limit: Option<u64>) -> Result<Vec<Value>>;

    /// Insert one record and return what the store wrote
    ///
    /// The first element is the inserted row.
    async fn insert(&self, table: &str, data: &FieldSet) -> Result<Vec<Value>>;

    async fn update(&self, table: &str, data: &FieldSet, filters: &FilterSet) -> Result<MutationResult>;

    async fn delete(&self, table: &str, filters: &FilterSet) -> Result<MutationResult>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;

    /// Release the underlying pool or client
    async fn close(&self) {}
}

/// Gateway backed by a SQL database
pub struct SqlGateway<DB: DatabaseProvider> {
    database: Arc<DB>,
    builder: QueryBuilder,
}

impl<DB: DatabaseProvider> SqlGateway<DB> {
    pub fn new(database: DB) -> Self {
        Self::from_arc(Arc::new(database))
    }

    /// Share an existing provider handle
    pub fn from_arc(database: Arc<DB>) -> Self {
        Self {
            database,
            builder: QueryBuilder::new(),
        }
    }

    pub fn database(&self) -> &Arc<DB> {
        &self.database
    }

    fn log_statement(statement: &Statement) {
        // Values are bound, never logged
        tracing::debug!(
            sql = statement.sql(),
            arguments = statement.arguments().len(),
            "dispatching statement"
        );
    }
}

#[async_trait]
impl<DB: DatabaseProvider> TableGateway for SqlGateway<DB> {
    async fn select(&self, table: &str, filters: &FilterSet, limit: Option<u64>) -> Result<Vec<Value>> {
        let statement = self.builder.select(table, filters, limit)?;
        Self::log_statement(&statement);
        Ok(self.database.fetch_rows(&statement).await?)
    }

    async fn insert(&self, table: &str, data: &FieldSet) -> Result<Vec<Value>> {
        let statement = self.builder.insert(table, data)?;
        Self::log_statement(&statement);
        let result = self.database.execute_returning(&statement).await?;
        Ok(result.rows)
    }

    async fn update(&self, table: &str, data: &FieldSet, filters: &FilterSet) -> Result<MutationResult> {
        let statement = self.builder.update(table, data, filters)?;
        Self::log_statement(&statement);
        Ok(self.database.execute_returning(&statement).await?)
    }

    async fn delete(&self, table: &str, filters: &FilterSet) -> Result<MutationResult> {
        let statement = self.builder.delete(table, filters)?;
        Self::log_statement(&statement);
        Ok(self.database.execute_returning(&statement).await?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.database.ping().await?)
    }

    async fn close(&self) {
        self.database.close().await;
    }
}
