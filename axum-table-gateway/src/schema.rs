//! Request and response types
//!
//! Column/value maps arrive as loosely-typed JSON objects. They are narrowed
//! here into [`ColumnValues`], an insertion-ordered map whose values are
//! restricted to JSON scalars.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A single bindable value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Text form used on the wire by the REST proxy (`col=eq.<text>`)
    pub fn to_filter_text(&self) -> Cow<'_, str> {
        match self {
            ScalarValue::Null => Cow::Borrowed("null"),
            ScalarValue::Bool(true) => Cow::Borrowed("true"),
            ScalarValue::Bool(false) => Cow::Borrowed("false"),
            ScalarValue::Int(value) => Cow::Owned(value.to_string()),
            ScalarValue::Float(value) => Cow::Owned(value.to_string()),
            ScalarValue::Text(value) => Cow::Borrowed(value),
        }
    }
}

/// Rejection produced for arrays and objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonScalarValue(&'static str);

impl fmt::Display for NonScalarValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "expected a string, number, boolean or null, found {}",
            self.0
        )
    }
}

impl std::error::Error for NonScalarValue {}

impl TryFrom<serde_json::Value> for ScalarValue {
    type Error = NonScalarValue;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(ScalarValue::Null),
            serde_json::Value::Bool(value) => Ok(ScalarValue::Bool(value)),
            serde_json::Value::Number(number) => Ok(match number.as_i64() {
                Some(value) => ScalarValue::Int(value),
                // u64 beyond i64::MAX and all fractional numbers
                None => ScalarValue::Float(number.as_f64().unwrap_or(f64::NAN)),
            }),
            serde_json::Value::String(value) => Ok(ScalarValue::Text(value)),
            serde_json::Value::Array(_) => Err(NonScalarValue("an array")),
            serde_json::Value::Object(_) => Err(NonScalarValue("an object")),
        }
    }
}

impl<'de> Deserialize<'de> for ScalarValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        ScalarValue::try_from(value).map_err(de::Error::custom)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Text(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int(value.into())
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ScalarValue::Null)
    }
}

/// Insertion-ordered column → value map
///
/// Keys are not validated here; the query builder decides which keys survive.
/// Inserting an existing key replaces its value in place, matching how a JSON
/// object with duplicate keys is read (last one wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    entries: Vec<(String, ScalarValue)>,
}

/// Columns and new values for INSERT/UPDATE
pub type FieldSet = ColumnValues;

/// Equality predicates for SELECT/UPDATE/DELETE
pub type FilterSet = ColumnValues;

impl ColumnValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<ScalarValue>) {
        let column = column.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(existing, _)| *existing == column) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.entries
            .iter()
            .map(|(column, value)| (column.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(column, _)| column.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for ColumnValues
where
    K: Into<String>,
    V: Into<ScalarValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = ColumnValues::new();
        for (column, value) in iter {
            values.insert(column, value);
        }
        values
    }
}

impl Serialize for ColumnValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, value) in &self.entries {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ColumnValuesVisitor;

        impl<'de> Visitor<'de> for ColumnValuesVisitor {
            type Value = ColumnValues;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping column names to scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ColumnValues, A::Error> {
                let mut values = ColumnValues::new();

                while let Some((column, raw)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    let value = ScalarValue::try_from(raw).map_err(|error| {
                        de::Error::custom(format!("column {column:?}: {error}"))
                    })?;
                    values.insert(column, value);
                }

                Ok(values)
            }
        }

        deserializer.deserialize_map(ColumnValuesVisitor)
    }
}

/// Operations that must carry data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Insert,
    Update,
}

impl fmt::Display for Write {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Write::Insert => "Insert",
            Write::Update => "Update",
        })
    }
}

/// Operations that must carry a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Update,
    Delete,
}

impl Mutation {
    /// Noun used in the mass-mutation rejection message
    pub(crate) fn mass_noun(self) -> &'static str {
        match self {
            Mutation::Update => "updates",
            Mutation::Delete => "deletion",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Mutation::Update => "Update",
            Mutation::Delete => "Delete",
        })
    }
}

/// JSON body accepted by POST, PATCH and DELETE
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WriteBody {
    /// Target table; falls back to the query string, then the default table
    pub table: Option<String>,

    /// Values to write (insert/update)
    pub data: Option<FieldSet>,

    /// Equality predicates (update/delete)
    pub filters: Option<FilterSet>,
}

/// Envelope returned by UPDATE and DELETE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    /// Rows returned by the statement
    pub rows: Vec<serde_json::Value>,

    /// Affected-row count as reported by the store
    pub rows_affected: u64,
}

/// Response for the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
