//! PostgreSQL database provider implementation
//!
//! Query-string values always arrive as text while JSON bodies carry typed
//! numbers and booleans. Before a statement runs, Postgres is asked which
//! type each placeholder stands for. Every non-null placeholder is then
//! written with the type it is bound as, followed by the column type when
//! the two differ (`$1::TEXT::INT4` for text into an integer column,
//! `$1::INT8::TEXT` for a number into a text column).
//!
//! sqlx caches prepared statements by their text alone, so the text has to
//! determine the parameter types.

use std::borrow::Cow;

use crate::database::traits::{DatabaseError, DatabaseProvider};
use crate::identifier::is_valid_identifier;
use crate::query::Statement;
use crate::schema::{MutationResult, ScalarValue};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::Statement as _;
use sqlx::{Column, Either, Executor, PgPool, Postgres, Row, Type, TypeInfo};

/// PostgreSQL database provider
pub struct PostgresProvider {
    pool: PgPool,
}

/// A NULL whose type Postgres infers from where it is used
///
/// A typed NULL (say `Option<String>`) would be rejected when assigned to an
/// integer column.
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("unknown")
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buffer: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

impl PostgresProvider {
    /// Create a new PostgreSQL provider
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Statement text with every non-null placeholder cast
    async fn typed_sql<'s>(&self, statement: &'s Statement) -> Result<Cow<'s, str>, DatabaseError> {
        let sql = statement.sql();
        let arguments = statement.arguments();

        if arguments.iter().all(|argument| matches!(argument, ScalarValue::Null)) {
            return Ok(Cow::Borrowed(sql));
        }

        // Cached per connection, so repeated statements skip the round trip
        let prepared = (&self.pool).prepare_with(sql, &[]).await?;
        let Some(Either::Left(inferred)) = prepared.parameters() else {
            return Ok(Cow::Borrowed(sql));
        };

        let casts: Vec<Option<String>> = arguments
            .iter()
            .zip(inferred)
            .map(|(argument, type_info)| placeholder_cast(argument, type_info.name()))
            .collect();

        Ok(Cow::Owned(rewrite_placeholders(sql, &casts)))
    }

    /// Attach the arguments in placeholder order
    fn bind_arguments<'q>(sql: &'q str, arguments: &'q [ScalarValue]) -> Query<'q, Postgres, PgArguments> {
        arguments
            .iter()
            .fold(sqlx::query(sql), |query, argument| match argument {
                ScalarValue::Null => query.bind(UntypedNull),
                ScalarValue::Bool(value) => query.bind(*value),
                ScalarValue::Int(value) => query.bind(*value),
                ScalarValue::Float(value) => query.bind(*value),
                ScalarValue::Text(value) => query.bind(value.as_str()),
            })
    }

    /// Convert a PostgreSQL row to a JSON object
    fn row_to_json(row: &PgRow) -> Result<Value, DatabaseError> {
        let mut map = serde_json::Map::new();

        for column in row.columns() {
            let index = column.ordinal();
            let type_info = column.type_info();

            let value = match type_info.name() {
                "BOOL" => decode(row, index, Value::Bool)?,
                "INT2" => decode(row, index, |value: i16| Value::Number(value.into()))?,
                "INT4" => decode(row, index, |value: i32| Value::Number(value.into()))?,
                "INT8" => decode(row, index, |value: i64| Value::Number(value.into()))?,
                "FLOAT4" => decode(row, index, |value: f32| float_to_json(value.into()))?,
                "FLOAT8" => decode(row, index, float_to_json)?,
                // Kept as text so no digits are lost
                "NUMERIC" => decode(row, index, |value: Decimal| Value::String(value.to_string()))?,
                "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "BPCHAR" | "CITEXT" => {
                    decode(row, index, Value::String)?
                }
                "BYTEA" => decode(row, index, |bytes: Vec<u8>| {
                    Value::String(format!("[BLOB: {} bytes]", bytes.len()))
                })?,
                "TIMESTAMPTZ" => decode(row, index, |value: DateTime<Utc>| {
                    Value::String(value.to_rfc3339())
                })?,
                "TIMESTAMP" => decode(row, index, |value: NaiveDateTime| {
                    Value::String(value.to_string())
                })?,
                "DATE" => decode(row, index, |value: NaiveDate| Value::String(value.to_string()))?,
                "TIME" => decode(row, index, |value: NaiveTime| Value::String(value.to_string()))?,
                "INTERVAL" => decode(row, index, |value: PgInterval| {
                    Value::String(interval_to_iso8601(value.months, value.days, value.microseconds))
                })?,
                "UUID" => decode(row, index, |value: Uuid| Value::String(value.to_string()))?,
                "JSON" | "JSONB" => decode(row, index, |value: Value| value)?,
                // Enum labels travel as their text
                _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => {
                    let value: Option<String> = row.try_get_unchecked(index)?;
                    value.map(Value::String).unwrap_or(Value::Null)
                }
                name => {
                    let value: Option<String> = row.try_get(index).map_err(|_| {
                        DatabaseError::Decode(format!(
                            "unsupported type {} in column {:?}",
                            name,
                            column.name()
                        ))
                    })?;
                    value.map(Value::String).unwrap_or(Value::Null)
                }
            };

            map.insert(column.name().to_string(), value);
        }

        Ok(Value::Object(map))
    }
}

/// Decode a nullable column and convert it with `convert`
fn decode<'r, T>(
    row: &'r PgRow,
    index: usize,
    convert: impl FnOnce(T) -> Value,
) -> Result<Value, DatabaseError>
where
    T: sqlx::Decode<'r, Postgres> + Type<Postgres>,
{
    let value: Option<T> = row.try_get(index)?;
    Ok(value.map(convert).unwrap_or(Value::Null))
}

fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Types a text argument is already accepted as
fn is_textual(type_name: &str) -> bool {
    matches!(
        type_name,
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" | "UNKNOWN"
    )
}

/// Cast to append to a placeholder: the bound type, then the column type
/// when the value has to be converted
///
/// NULLs stay uncast. Column type names that could not be written back as a
/// bare (optionally array) type name are not converted to.
fn placeholder_cast(argument: &ScalarValue, column_type: &str) -> Option<String> {
    let bound = match argument {
        ScalarValue::Null => return None,
        ScalarValue::Bool(_) => "BOOL",
        ScalarValue::Int(_) => "INT8",
        ScalarValue::Float(_) => "FLOAT8",
        ScalarValue::Text(_) => "TEXT",
    };

    let element = column_type.strip_suffix("[]").unwrap_or(column_type);
    let target = match argument {
        ScalarValue::Text(_) if !is_textual(column_type) && is_valid_identifier(element) => {
            Some(column_type)
        }
        ScalarValue::Text(_) => None,
        _ if is_textual(column_type) => Some("TEXT"),
        _ => None,
    };

    Some(match target {
        Some(target) => format!("{bound}::{target}"),
        None => bound.to_string(),
    })
}

/// Append `::<cast>` to each `$n` that has one
///
/// Identifiers are validated and values are bound, so every `$` in the
/// statement text starts a placeholder.
fn rewrite_placeholders(sql: &str, casts: &[Option<String>]) -> String {
    let mut rewritten = String::with_capacity(sql.len() + casts.len() * 8);
    let mut rest = sql;

    while let Some(position) = rest.find('$') {
        rewritten.push_str(&rest[..=position]);
        rest = &rest[position + 1..];

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (number, tail) = rest.split_at(digits);
        rewritten.push_str(number);

        let cast = number
            .parse::<usize>()
            .ok()
            .and_then(|number| number.checked_sub(1))
            .and_then(|index| casts.get(index)?.as_deref());
        if let Some(cast) = cast {
            rewritten.push_str("::");
            rewritten.push_str(cast);
        }

        rest = tail;
    }

    rewritten.push_str(rest);
    rewritten
}

/// ISO 8601 duration (`P1Y2M3DT4H5M6.5S`)
fn interval_to_iso8601(months: i32, days: i32, microseconds: i64) -> String {
    let mut duration = String::from("P");

    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        duration.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        duration.push_str(&format!("{months}M"));
    }
    if days != 0 {
        duration.push_str(&format!("{days}D"));
    }

    if microseconds != 0 {
        duration.push('T');

        let sign = if microseconds < 0 { "-" } else { "" };
        let total = microseconds.unsigned_abs();
        let hours = total / 3_600_000_000;
        let minutes = total % 3_600_000_000 / 60_000_000;
        let seconds = total % 60_000_000 / 1_000_000;
        let fraction = total % 1_000_000;

        if hours != 0 {
            duration.push_str(&format!("{sign}{hours}H"));
        }
        if minutes != 0 {
            duration.push_str(&format!("{sign}{minutes}M"));
        }
        if seconds != 0 || fraction != 0 {
            duration.push_str(&format!("{sign}{seconds}"));
            if fraction != 0 {
                let fraction = format!("{fraction:06}");
                duration.push('.');
                duration.push_str(fraction.trim_end_matches('0'));
            }
            duration.push('S');
        }
    }

    if duration == "P" {
        duration.push_str("T0S");
    }

    duration
}

#[async_trait]
impl DatabaseProvider for PostgresProvider {
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<Value>, DatabaseError> {
        let sql = self.typed_sql(statement).await?;
        let rows = Self::bind_arguments(&sql, statement.arguments())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_json).collect()
    }

    async fn execute_returning(&self, statement: &Statement) -> Result<MutationResult, DatabaseError> {
        let sql = self.typed_sql(statement).await?;
        let mut stream = (&self.pool).fetch_many(Self::bind_arguments(&sql, statement.arguments()));

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
