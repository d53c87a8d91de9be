//! Query result types for Lookout.
//!
//! Defines the structures used to represent query results from the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The structured output of a successful query execution.
///
/// Built once by the gateway and never mutated afterwards; sessions share it
/// behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
    #[serde(with = "duration_serde")]
    execution_time: Duration,
    total_rows: usize,
    was_truncated: bool,
}

impl TabularResult {
    /// Creates a result with the given columns and rows.
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let total_rows = rows.len();
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
            total_rows,
            was_truncated: false,
        }
    }

    /// Records that the engine produced `total_rows`, of which only `rows` were kept.
    pub fn truncated_from(mut self, total_rows: usize) -> Self {
        self.was_truncated = total_rows > self.rows.len();
        self.total_rows = total_rows.max(self.rows.len());
        self
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn execution_time(&self) -> Duration {
        self.execution_time
    }

    /// Number of rows held in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of rows the engine produced, before truncation.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn was_truncated(&self) -> bool {
        self.was_truncated
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a value by row index and column name.
    ///
    /// With duplicate column names the first matching column wins.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c.name == column)?;
        self.rows.get(row)?.get(index)
    }

    /// Returns a truncation warning message if the result was truncated.
    pub fn truncation_warning(&self) -> Option<String> {
        self.was_truncated.then(|| {
            format!(
                "⚠ Result truncated: showing {} of {} rows",
                self.rows.len(),
                self.total_rows
            )
        })
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the engine.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data, aligned with the result's columns.
pub type Row = Vec<Value>;

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }

    /// Converts the value to JSON for the explorer payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(_) => serde_json::Value::String(self.to_display_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_nanos().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u128::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularResult {
        TabularResult::new(
            vec![ColumnInfo::new("id", "int4"), ColumnInfo::new("name", "text")],
            vec![
                vec![Value::Int(1), Value::from("Alice")],
                vec![Value::Int(2), Value::Null],
            ],
        )
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(true).to_display_string(), "true");
        assert_eq!(Value::Int(42).to_display_string(), "42");
        assert_eq!(Value::Float(2.71).to_display_string(), "2.71");
        assert_eq!(Value::from("hello").to_display_string(), "hello");
        assert_eq!(Value::Bytes(vec![1, 2, 3]).to_display_string(), "<3 bytes>");
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
        assert_eq!(Value::Int(7).to_json(), serde_json::json!(7));
        assert_eq!(Value::Float(1.5).to_json(), serde_json::json!(1.5));
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::from("x").to_json(), serde_json::json!("x"));
        assert_eq!(Value::Bytes(vec![0; 4]).to_json(), serde_json::json!("<4 bytes>"));
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(42i64)), Value::Int(42));
    }

    #[test]
    fn test_get_by_column_name() {
        let result = sample();
        assert_eq!(result.get(0, "name"), Some(&Value::from("Alice")));
        assert_eq!(result.get(1, "name"), Some(&Value::Null));
        assert_eq!(result.get(0, "missing"), None);
        assert_eq!(result.get(5, "id"), None);
    }

    #[test]
    fn test_truncation() {
        let result = sample().truncated_from(10);
        assert!(result.was_truncated());
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.total_rows(), 10);
        assert_eq!(
            result.truncation_warning().as_deref(),
            Some("⚠ Result truncated: showing 2 of 10 rows")
        );

        let exact = sample().truncated_from(2);
        assert!(!exact.was_truncated());
        assert!(exact.truncation_warning().is_none());
    }

    #[test]
    fn test_new_result() {
        let result = sample().with_execution_time(Duration::from_millis(12));
        assert!(!result.is_empty());
        assert_eq!(result.columns().len(), 2);
        assert_eq!(result.total_rows(), 2);
        assert_eq!(result.execution_time(), Duration::from_millis(12));
        assert!(TabularResult::default().is_empty());
    }
}
