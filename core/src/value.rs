//! Dynamic SQL values, rows and bound parameters.
//!
//! [`Value`] is the currency exchanged between entities, the statement
//! builder and the execution layer. Entities convert their fields into
//! values through `From` impls and back through [`FromValue`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Text layout used when a timestamp is written to the database.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A dynamically-typed SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Double precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Boolean, stored as 0/1.
    Bool(bool),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Timestamp without zone, stored as text.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL-side name of the value kind, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Bool(_) => "BOOL",
            Value::Blob(_) => "BLOB",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Integer view of the value, accepting booleans.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Whether this value marks an identity that the database has not
    /// assigned yet.
    ///
    /// Both `0` and `NULL` count: a non-zero identity is always treated as
    /// already persisted, even when the caller chose it.
    pub fn is_unassigned_identity(&self) -> bool {
        matches!(self, Value::Integer(0) | Value::Null)
    }

    /// Converts the value into a Rust type.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::TypeMismatch`] if the value has the wrong shape.
    pub fn decode<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }
}

/// Parses timestamp-shaped text as written by SQLite or by this crate.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, the same with a `T` separator,
/// RFC 3339 (converted to UTC) and a bare `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Formats a timestamp the way it is stored.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Conversion from a [`Value`] into a Rust field type.
pub trait FromValue: Sized {
    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::TypeMismatch`] when the value cannot represent
    /// `Self`.
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &'static str, value: &Value) -> Result<T> {
    Err(ModelError::TypeMismatch {
        expected,
        found: value.type_name(),
    })
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value.as_i64() {
            Some(v) => Ok(v),
            None => mismatch("i64", &value),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        match value.as_i64().map(i32::try_from) {
            Some(Ok(v)) => Ok(v),
            _ => mismatch("i32", &value),
        }
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self> {
        match value.as_i64().map(u32::try_from) {
            Some(Ok(v)) => Ok(v),
            _ => mismatch("u32", &value),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            other => mismatch("f64", &other),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Integer(v) => Ok(v != 0),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => mismatch("String", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            other => mismatch("Vec<u8>", &other),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Text(text) => match parse_timestamp(text) {
                Some(ts) => Ok(ts),
                None => mismatch("NaiveDateTime", &value),
            },
            _ => mismatch("NaiveDateTime", &value),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self> {
        NaiveDateTime::from_value(value).map(|ts| ts.and_utc())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.naive_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A result row: column names paired with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value.into());
        self
    }

    /// Value of the first column with the given name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Iterates columns in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Named parameters bound to a statement, in generation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A parameter set holding one value.
    pub fn single(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut params = Self::new();
        params.push(name, value);
        params
    }

    /// Appends a parameter.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Iterates parameters in generation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Placeholder names in generation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameters are bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
