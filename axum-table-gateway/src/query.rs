//! Parameterized statement construction
//!
//! Every identifier is validated before it is written into the statement text.
//! Every value becomes a positional argument (`$1`, `$2`, ...). Both sqlx
//! drivers accept `$N` placeholders, so one statement text serves every
//! provider.

use crate::identifier::Identifier;
use crate::schema::{ColumnValues, FieldSet, FilterSet, Mutation, ScalarValue, Write};
use crate::{Error, Result};

/// Largest `LIMIT` both stores accept (a signed 64-bit integer)
pub const MAX_LIMIT: u64 = i64::MAX as u64;

/// Statement text and its positional arguments, built fresh per request
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    arguments: Vec<ScalarValue>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn arguments(&self) -> &[ScalarValue] {
        &self.arguments
    }
}

/// Builds validated, parameterized statements
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// `SELECT * FROM <table> [WHERE ...] [LIMIT n]`
    ///
    /// Filter keys that are not valid identifiers are dropped rather than
    /// rejected. A limit above [`MAX_LIMIT`] is capped.
    pub fn select(&self, table: &str, filters: &FilterSet, limit: Option<u64>) -> Result<Statement> {
        let table = table_identifier(table)?;
        let filters = retain_valid(filters);

        let mut sql = format!("SELECT * FROM {}", table.quoted());
        let mut arguments = Vec::with_capacity(filters.len());
        self.push_where_clause(&mut sql, &mut arguments, &filters);

        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit.min(MAX_LIMIT)));
        }

        Ok(Statement { sql, arguments })
    }

    /// `INSERT INTO <table> (...) VALUES (...) RETURNING *`
    ///
    /// The statement returns every inserted row. Callers that insert a single
    /// record treat the first returned row as the result.
    pub fn insert(&self, table: &str, data: &FieldSet) -> Result<Statement> {
        let table = table_identifier(table)?;

        if data.is_empty() {
            return Err(Error::MissingData(Write::Insert));
        }
        let fields = retain_valid(data);
        if fields.is_empty() {
            return Err(Error::NoValidColumns);
        }

        let columns: Vec<String> = fields.iter().map(|(column, _)| column.quoted()).collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|index| format!("${}", index)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table.quoted(),
            columns.join(", "),
            placeholders.join(", ")
        );
        let arguments = fields.into_iter().map(|(_, value)| value.clone()).collect();

        Ok(Statement { sql, arguments })
    }

    /// `UPDATE <table> SET ... WHERE ... RETURNING *`
    ///
    /// The filter check runs before the data check so that a request without
    /// a usable predicate is always reported as `MissingFilter`.
    pub fn update(&self, table: &str, data: &FieldSet, filters: &FilterSet) -> Result<Statement> {
        let table = table_identifier(table)?;
        let filters = required_filters(filters, Mutation::Update)?;

        let fields = retain_valid(data);
        if fields.is_empty() {
            return Err(Error::MissingData(Write::Update));
        }

        let mut arguments = Vec::with_capacity(fields.len() + filters.len());
        let assignments: Vec<String> = fields
            .iter()
            .map(|(column, value)| {
                arguments.push((*value).clone());
                format!("{} = ${}", column.quoted(), arguments.len())
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", table.quoted(), assignments.join(", "));
        self.push_where_clause(&mut sql, &mut arguments, &filters);
        sql.push_str(" RETURNING *");

        Ok(Statement { sql, arguments })
    }

    /// `DELETE FROM <table> WHERE ... RETURNING *`
    pub fn delete(&self, table: &str, filters: &FilterSet) -> Result<Statement> {
        let table = table_identifier(table)?;
        let filters = required_filters(filters, Mutation::Delete)?;

        let mut sql = format!("DELETE FROM {}", table.quoted());
        let mut arguments = Vec::with_capacity(filters.len());
        self.push_where_clause(&mut sql, &mut arguments, &filters);
        sql.push_str(" RETURNING *");

        Ok(Statement { sql, arguments })
    }

    /// Append ` WHERE a = $n AND b = $n+1`, numbering after existing arguments
    fn push_where_clause(
        &self,
        sql: &mut String,
        arguments: &mut Vec<ScalarValue>,
        filters: &[(Identifier, &ScalarValue)],
    ) {
        if filters.is_empty() {
            return;
        }

        let conditions: Vec<String> = filters
            .iter()
            .map(|(column, value)| {
                arguments.push((*value).clone());
                format!("{} = ${}", column.quoted(), arguments.len())
            })
            .collect();

        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
}

fn table_identifier(table: &str) -> Result<Identifier> {
    Identifier::parse(table).ok_or_else(|| Error::InvalidIdentifier(table.to_string()))
}

/// Keep entries whose key is a valid identifier, in their original order
fn retain_valid(values: &ColumnValues) -> Vec<(Identifier, &ScalarValue)> {
    values
        .iter()
        .filter_map(|(column, value)| Identifier::parse(column).map(|column| (column, value)))
        .collect()
}

/// Non-empty both as supplied and after dropping invalid keys
fn required_filters(filters: &FilterSet, operation: Mutation) -> Result<Vec<(Identifier, &ScalarValue)>> {
    if filters.is_empty() {
        return Err(Error::MissingFilter(operation));
    }

    let retained = retain_valid(filters);
    if retained.is_empty() {
        return Err(Error::MissingFilter(operation));
    }

    Ok(retained)
}
