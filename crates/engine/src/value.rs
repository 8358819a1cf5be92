//! Cell values and column types.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A single cell in a dataset column.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value. Booleans and text are not numbers here.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_)) || matches!(self, Value::Float(f) if !f.is_nan())
    }

    /// Which family of values this belongs to. Range comparisons only make
    /// sense within one family.
    pub fn family(&self) -> Option<ValueFamily> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ValueFamily::Number),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(_) => Some(ValueFamily::Number),
            Value::Bool(_) => Some(ValueFamily::Bool),
            Value::DateTime(_) => Some(ValueFamily::DateTime),
            Value::Text(_) => Some(ValueFamily::Text),
        }
    }

    /// Normalized key for hashing, grouping and ordering.
    ///
    /// `Int(3)` and `Float(3.0)` produce the same key.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Int(i) => ValueKey::Number(OrderedFloat(*i as f64)),
            Value::Float(f) if f.is_nan() => ValueKey::Null,
            Value::Float(f) => ValueKey::Number(OrderedFloat(*f)),
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::DateTime(dt) => ValueKey::DateTime(*dt),
            Value::Text(s) => ValueKey::Text(s.clone()),
        }
    }

    /// Total order used by sorting: same-family values compare naturally,
    /// nulls sort after everything else.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        self.key().cmp(&other.key())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::DateTime(_) => "datetime",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NaN"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Bool(b) => write!(f, "{b}"),
            Value::DateTime(dt) => {
                if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Render a float the way a data table shows it: integral values keep one
/// decimal, others are trimmed to six decimals.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if x.fract() == 0.0 && x.abs() < 1e15 {
        return format!("{x:.1}");
    }
    let s = format!("{x:.6}");
    let trimmed = s.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

/// Value families for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFamily {
    Number,
    Bool,
    DateTime,
    Text,
}

impl ValueFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueFamily::Number => "number",
            ValueFamily::Bool => "bool",
            ValueFamily::DateTime => "datetime",
            ValueFamily::Text => "text",
        }
    }
}

/// Hashable, totally ordered form of a [`Value`].
///
/// Variant order defines cross-family ordering; `Null` is last so nulls
/// sort after real values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Bool(bool),
    Number(OrderedFloat<f64>),
    DateTime(NaiveDateTime),
    Text(String),
    Null,
}

/// Semantic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Numeric,
    Text,
    Boolean,
    DateTime,
    Categorical,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Numeric => "numeric",
            DType::Text => "text",
            DType::Boolean => "boolean",
            DType::DateTime => "datetime",
            DType::Categorical => "categorical",
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, DType::Text | DType::Categorical)
    }

    /// Family that range bounds on a column of this type must belong to.
    pub fn family(&self) -> ValueFamily {
        match self {
            DType::Numeric => ValueFamily::Number,
            DType::Boolean => ValueFamily::Bool,
            DType::DateTime => ValueFamily::DateTime,
            DType::Text | DType::Categorical => ValueFamily::Text,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text columns with fewer distinct values than this are categorical.
pub const CATEGORICAL_MAX_DISTINCT: usize = 10;

/// Infer the semantic type of a column from its values.
///
/// All-null columns are numeric, matching how dataframes type a column of
/// missing floats.
pub fn infer_dtype(values: &[Value]) -> DType {
    let mut numeric = true;
    let mut boolean = true;
    let mut datetime = true;
    let mut non_null = 0usize;

    for v in values.iter().filter(|v| !v.is_null()) {
        non_null += 1;
        numeric &= v.is_numeric();
        boolean &= matches!(v, Value::Bool(_));
        datetime &= matches!(v, Value::DateTime(_));
    }

    if non_null == 0 || numeric {
        return DType::Numeric;
    }
    if boolean {
        return DType::Boolean;
    }
    if datetime {
        return DType::DateTime;
    }

    let distinct: rustc_hash::FxHashSet<ValueKey> = values
        .iter()
        .filter(|v| !v.is_null())
        .map(Value::key)
        .collect();
    if distinct.len() < CATEGORICAL_MAX_DISTINCT && distinct.len() < non_null {
        DType::Categorical
    } else {
        DType::Text
    }
}
