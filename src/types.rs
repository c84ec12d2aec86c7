//! Core value and row types for sqlmapper.
//!
//! Defines the runtime-typed value union exchanged with drivers and the row
//! shapes consumed by the materializer.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, Result};

/// A single runtime-typed value, either bound as a parameter or produced by
/// a driver in a result row.
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

    /// Text value.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the declared type this value carries, or `None` for NULL.
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(SqlType::Bool),
            Value::Int(_) => Some(SqlType::Int),
            Value::Float(_) => Some(SqlType::Float),
            Value::Text(_) => Some(SqlType::Text),
            Value::Bytes(_) => Some(SqlType::Bytes),
        }
    }

    /// Converts the value to a string representation for display.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
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
        Value::Bytes(v)
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

/// Declared SQL-side type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
}

impl SqlType {
    /// Returns the type as a string for messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    /// Column name as reported by the driver.
    pub name: String,

    /// Driver-reported type name.
    pub type_name: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A single result row: ordered named columns with runtime-typed values.
///
/// Column metadata is shared across all rows of one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<ColumnInfo>>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from shared column metadata and its values.
    pub fn new(columns: Arc<Vec<ColumnInfo>>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Creates a standalone row from (column name, value) pairs.
    ///
    /// Column type names are inferred from the values. Intended for scripted
    /// drivers and tests; real backends share one `Arc` across the result.
    pub fn from_pairs<I, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, value) in pairs {
            let type_name = value
                .sql_type()
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| "null".to_string());
            columns.push(ColumnInfo::new(name, type_name));
            values.push(value);
        }
        Self {
            columns: Arc::new(columns),
            values,
        }
    }

    /// Number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column metadata for this row.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Shared column metadata handle.
    pub fn columns_arc(&self) -> Arc<Vec<ColumnInfo>> {
        Arc::clone(&self.columns)
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// A view over the whole row.
    pub fn view(&self) -> RowView<'_> {
        RowView {
            columns: &self.columns,
            values: &self.values,
        }
    }

    /// Looks up a value by case-insensitive column name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.view().value(name)
    }
}

/// A contiguous slice of a row's columns.
///
/// Flat-object mapping uses the whole row as one view; split mapping narrows
/// one view per target shape.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [ColumnInfo],
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    /// Number of columns in the view.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the view covers no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column metadata covered by the view.
    pub fn columns(&self) -> &'a [ColumnInfo] {
        self.columns
    }

    /// Values covered by the view.
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Narrows the view to a column range.
    ///
    /// The range is clamped to the view's bounds.
    pub fn narrow(&self, range: Range<usize>) -> RowView<'a> {
        let start = range.start.min(self.values.len());
        let end = range.end.clamp(start, self.values.len());
        RowView {
            columns: &self.columns[start..end],
            values: &self.values[start..end],
        }
    }

    /// Position of the first column matching `name`, case-insensitively.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Value of the first column matching `name`, case-insensitively.
    pub fn value(&self, name: &str) -> Option<&'a Value> {
        self.position(name).map(|i| &self.values[i])
    }

    /// Value at a column index within the view.
    pub fn value_at(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    /// Converts the named column to `T`.
    ///
    /// A column the view does not contain yields `T::default()`, so target
    /// fields without a matching column stay default-valued. Cast failures
    /// are a `TypeMismatch`.
    pub fn get<T>(&self, name: &str) -> Result<T>
    where
        T: FromValue + Default,
    {
        match self.value(name) {
            Some(v) => T::from_value(v),
            None => Ok(T::default()),
        }
    }

    /// Converts the named column to `Some(T)`, or `None` when the column is
    /// absent or NULL.
    pub fn get_opt<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromValue,
    {
        match self.value(name) {
            Some(Value::Null) | None => Ok(None),
            Some(v) => T::from_value(v).map(Some),
        }
    }
}

/// Conversion from a driver [`Value`] into a native type.
///
/// Conversions are conservative: integers narrow with range checks, `Int`
/// widens to floats, `0`/`1` convert to `bool`, and NULL converts only into
/// `Option`. Anything else is a `TypeMismatch`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(value: &Value, target: &str) -> MapperError {
    MapperError::type_mismatch(format!("cannot cast {value:?} to {target}"))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(mismatch(other, "bool")),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch(other, "i64")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i).map_err(|_| mismatch(value, "i32")),
            other => Err(mismatch(other, "i32")),
        }
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => i16::try_from(*i).map_err(|_| mismatch(value, "i16")),
            other => Err(mismatch(other, "i16")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch(other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f as f32),
            Value::Int(i) => Ok(*i as f32),
            other => Err(mismatch(other, "f32")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch(other, "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch(other, "Vec<u8>")),
        }
    }
}

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
