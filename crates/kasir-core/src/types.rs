//! # Value Types
//!
//! Typed values, ordered field maps and result rows.
//!
//! ## Why an Ordered List and Not a HashMap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Fields::new().with("name", "Ned").with("role", "user")                 │
//! │                                                                         │
//! │  INSERT INTO users (name, role) VALUES (?, ?)                          │
//! │                      ────  ────          │  │                           │
//! │                       │     └────────────┼──┘  binds[1] = "user"       │
//! │                       └──────────────────┘     binds[0] = "Ned"        │
//! │                                                                         │
//! │  Clause order == bind order == insertion order.                        │
//! │  A HashMap would make the SQL text differ run to run.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

// =============================================================================
// SqlValue
// =============================================================================

/// A scalar that can be bound to a statement or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean (stored as 0/1 on engines without a native type).
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Borrow the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Renders the value as display text.
    ///
    /// NULL renders as the empty string; bytes are decoded lossily.
    pub fn to_text(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Bool(value) => if *value { "1" } else { "0" }.to_string(),
            SqlValue::Int(value) => value.to_string(),
            SqlValue::Float(value) => value.to_string(),
            SqlValue::Text(value) => value.clone(),
            SqlValue::Bytes(value) => String::from_utf8_lossy(value).into_owned(),
        }
    }

    /// Converts a JSON scalar into a SQL value.
    ///
    /// Arrays and objects are stored as their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

// =============================================================================
// Fields
// =============================================================================

/// Ordered column → value map used to build INSERT/UPDATE/WHERE clauses.
///
/// ## Example
/// ```rust
/// use kasir_core::Fields;
///
/// let fields = Fields::new().with("name", "Ned").with("role", "user");
/// assert_eq!(fields.columns(), vec!["name", "role"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, SqlValue)>,
}

impl Fields {
    /// Creates an empty field map.
    pub fn new() -> Self {
        Fields::default()
    }

    /// Builder form of [`Fields::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column. An existing column keeps its position.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Looks up a column value.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns true if the column is present.
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterates (column, value) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no columns are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if both maps hold the same column set (order ignored).
    pub fn same_columns(&self, other: &Fields) -> bool {
        self.len() == other.len() && self.iter().all(|(name, _)| other.contains(name))
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<SqlValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (column, value) in iter {
            fields.set(column, value);
        }
        fields
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, value) in &self.entries {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// =============================================================================
// Row
// =============================================================================

/// One result row: column name → value, in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates a row from (column, value) pairs.
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Row { columns }
    }

    /// Looks up a column by name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Looks up a column and renders it as text.
    pub fn get_text(&self, column: &str) -> Option<String> {
        self.get(column).map(SqlValue::to_text)
    }

    /// Column names in select-list order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Converts the row into a field map (e.g. to re-insert it elsewhere).
    pub fn into_fields(self) -> Fields {
        self.columns.into_iter().collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// =============================================================================
// Params
// =============================================================================

/// Parameters for a raw query.
///
/// The binding style is chosen by the caller, never inferred from shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// No parameters: the SQL is sent as-is.
    #[default]
    None,
    /// Values for `?` placeholders, in order.
    Positional(Vec<SqlValue>),
    /// Values for `:name` references.
    Named(Vec<(String, SqlValue)>),
}

impl Params {
    /// Positional parameters from anything convertible to values.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Named parameters from (name, value) pairs.
    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        Params::Named(
            values
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    /// Returns true if there is nothing to bind.
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(values) => values.is_empty(),
            Params::Named(values) => values.is_empty(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_preserve_insertion_order() {
        let fields = Fields::new().with("role", "user").with("name", "Ned").with("age", 40);
        assert_eq!(fields.columns(), vec!["role", "name", "age"]);
    }

    #[test]
    fn test_fields_set_replaces_in_place() {
        let mut fields = Fields::new().with("a", 1).with("b", 2);
        fields.set("a", 10);
        assert_eq!(fields.columns(), vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&SqlValue::Int(10)));
    }

    #[test]
    fn test_same_columns_ignores_order() {
        let a = Fields::new().with("name", "A").with("role", "user");
        let b = Fields::new().with("role", "admin").with("name", "B");
        let c = Fields::new().with("name", "C");
        assert!(a.same_columns(&b));
        assert!(!a.same_columns(&c));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(SqlValue::Null.to_text(), "");
        assert_eq!(SqlValue::Int(7).to_text(), "7");
        assert_eq!(SqlValue::Bool(true).to_text(), "1");
        assert_eq!(SqlValue::from("x").to_text(), "x");
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new(vec![
            ("name".to_string(), SqlValue::from("Ned")),
            ("id".to_string(), SqlValue::Int(1)),
        ]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"name":"Ned","id":1}"#);
    }
}
