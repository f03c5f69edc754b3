//! SQLite database provider implementation

use crate::database::traits::{DatabaseError, DatabaseProvider};
use crate::query::Statement;
use crate::schema::{MutationResult, ScalarValue};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteColumn, SqliteRow};
use sqlx::{Column, Either, Executor, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

/// SQLite database provider
pub struct SqliteProvider {
    pool: SqlitePool,
}

impl SqliteProvider {
    /// Create a new SQLite provider
    ///
    /// # Arguments
    ///
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attach the statement's arguments in placeholder order
    fn bind_arguments(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        statement
            .arguments()
            .iter()
            .fold(sqlx::query(statement.sql()), |query, argument| match argument {
                ScalarValue::Null => query.bind(None::<String>),
                ScalarValue::Bool(value) => query.bind(*value),
                ScalarValue::Int(value) => query.bind(*value),
                ScalarValue::Float(value) => query.bind(*value),
                ScalarValue::Text(value) => query.bind(value.as_str()),
            })
    }

    /// Convert a SQLite row to a JSON object
    fn row_to_json(row: &SqliteRow) -> Result<Value, DatabaseError> {
        let mut map = serde_json::Map::new();

        for column in row.columns() {
            let value = Self::extract_column_value(row, column)?;
            map.insert(column.name().to_string(), value);
        }

        Ok(Value::Object(map))
    }

    /// Extract a column value from a SQLite row and convert to JSON
    ///
    /// SQLite reports the declared type for table columns and the storage
    /// class for expressions. Both are tried before trying each decoder in turn.
    fn extract_column_value(row: &SqliteRow, column: &SqliteColumn) -> Result<Value, DatabaseError> {
        let index = column.ordinal();

        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }

        match column.type_info().name() {
            "INTEGER" | "BIGINT" | "INT" => {
                if let Ok(value) = row.try_get::<i64, _>(index) {
                    return Ok(Value::Number(value.into()));
                }
            }
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
                if let Ok(value) = row.try_get::<f64, _>(index) {
                    if let Some(number) = serde_json::Number::from_f64(value) {
                        return Ok(Value::Number(number));
                    }
                }
            }
            "TEXT" | "VARCHAR" | "CHAR" | "CLOB" | "DATE" | "DATETIME" | "TIMESTAMP" => {
                if let Ok(value) = row.try_get::<String, _>(index) {
                    return Ok(Value::String(value));
                }
            }
            "BOOLEAN" | "BOOL" => {
                if let Ok(value) = row.try_get::<bool, _>(index) {
                    return Ok(Value::Bool(value));
                }
            }
            "BLOB" => {
                if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
                    return Ok(Value::String(format!("[BLOB: {} bytes]", value.len())));
                }
            }
            _ => {}
        }

        // Fallback: try common types in order
        if let Ok(value) = row.try_get::<i64, _>(index) {
            return Ok(Value::Number(value.into()));
        }
        if let Ok(value) = row.try_get::<f64, _>(index) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                return Ok(Value::Number(number));
            }
        }
        if let Ok(value) = row.try_get::<String, _>(index) {
            return Ok(Value::String(value));
        }
        if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
            return Ok(Value::String(format!("[BLOB: {} bytes]", value.len())));
        }

        Err(DatabaseError::Decode(format!(
            "unsupported value in column {:?}",
            column.name()
        )))
    }
}

#[async_trait]
impl DatabaseProvider for SqliteProvider {
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<Value>, DatabaseError> {
        let rows = Self::bind_arguments(statement)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_json).collect()
    }

    async fn execute_returning(&self, statement: &Statement) -> Result<MutationResult, DatabaseError> {
        let mut stream = (&self.pool).fetch_many(Self::bind_arguments(statement));

        let mut rows = Vec::new();
        let mut rows_affected = 0;

        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => rows_affected += done.rows_affected(),
                Either::Right(row) => rows.push(Self::row_to_json(&row)?),
            }
        }

        Ok(MutationResult {
            rows,
            rows_affected,
        })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
