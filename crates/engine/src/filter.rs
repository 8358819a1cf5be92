//! Row filtering.
//!
//! A [`Conditions`] value is a conjunction of per-column clauses. Nulls never
//! satisfy a clause, and the receiver dataset is never modified.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset};
use crate::error::EngineError;
use crate::value::{Value, ValueKey};

/// A condition on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Cell equals the value (`Int(3)` equals `Float(3.0)`).
    Equals(Value),
    /// Cell equals any of the values.
    OneOf(Vec<Value>),
    /// Inclusive range. Either bound may be absent.
    Range { min: Option<Value>, max: Option<Value> },
}

impl Condition {
    pub fn between(min: impl Into<Value>, max: impl Into<Value>) -> Self {
        Condition::Range { min: Some(min.into()), max: Some(max.into()) }
    }

    pub fn at_least(min: impl Into<Value>) -> Self {
        Condition::Range { min: Some(min.into()), max: None }
    }

    pub fn at_most(max: impl Into<Value>) -> Self {
        Condition::Range { min: None, max: Some(max.into()) }
    }
}

/// Conjunction of column conditions, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    clauses: Vec<(String, Condition)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push((column.into(), condition));
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Equals(value.into()))
    }

    pub fn one_of(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.with(column, Condition::OneOf(values))
    }

    pub fn range(self, column: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        self.with(column, Condition::Range { min, max })
    }

    /// Both sets of conditions must hold.
    pub fn and(mut self, other: Conditions) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }
}

impl FromIterator<(String, Condition)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (String, Condition)>>(iter: I) -> Self {
        Self { clauses: iter.into_iter().collect() }
    }
}

/// Serializable form used by callers that build conditions from JSON:
/// a scalar means equality, an array means membership, an object with
/// `min`/`max` means an inclusive range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionSpec {
    OneOf(Vec<serde_json::Value>),
    Range {
        #[serde(default)]
        min: Option<serde_json::Value>,
        #[serde(default)]
        max: Option<serde_json::Value>,
    },
    Equals(serde_json::Value),
}

impl ConditionSpec {
    pub fn into_condition(self) -> Condition {
        match self {
            ConditionSpec::Range { min, max } => Condition::Range {
                min: min.map(json_to_value),
                max: max.map(json_to_value),
            },
            ConditionSpec::OneOf(values) => Condition::OneOf(values.into_iter().map(json_to_value).collect()),
            ConditionSpec::Equals(value) => Condition::Equals(json_to_value(value)),
        }
    }
}

fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Text(s),
        other => Value::Text(other.to_string()),
    }
}

/// A clause compiled against a specific column.
enum Compiled<'a> {
    Equals(ValueKey),
    OneOf(FxHashSet<ValueKey>),
    Range { min: Option<&'a Value>, max: Option<&'a Value> },
}

fn compile<'a>(column: &Column, condition: &'a Condition) -> Result<Compiled<'a>, EngineError> {
    match condition {
        Condition::Equals(v) => Ok(Compiled::Equals(v.key())),
        Condition::OneOf(vs) => Ok(Compiled::OneOf(vs.iter().map(Value::key).collect())),
        Condition::Range { min, max } => {
            let expected = column.dtype().family();
            for bound in [min, max].into_iter().flatten() {
                match bound.family() {
                    Some(family) if family == expected => {}
                    _ => {
                        return Err(EngineError::TypeMismatch {
                            column: column.name().to_string(),
                            expected: format!("{} bound", expected.as_str()),
                            found: bound.type_name().to_string(),
                        })
                    }
                }
            }
            Ok(Compiled::Range { min: min.as_ref(), max: max.as_ref() })
        }
    }
}

impl Compiled<'_> {
    fn matches(&self, cell: &Value) -> bool {
        if cell.is_null() {
            return false;
        }
        match self {
            Compiled::Equals(key) => &cell.key() == key,
            Compiled::OneOf(keys) => keys.contains(&cell.key()),
            Compiled::Range { min, max } => {
                // Cells of another family (mixed text columns) never match.
                let family = cell.family();
                let in_family = |b: &Value| b.family() == family;
                if let Some(lo) = min {
                    if !in_family(lo) || cell.total_cmp(lo).is_lt() {
                        return false;
                    }
                }
                if let Some(hi) = max {
                    if !in_family(hi) || cell.total_cmp(hi).is_gt() {
                        return false;
                    }
                }
                true
            }
        }
    }
}

impl Dataset {
    /// Rows satisfying every condition, in original order.
    pub fn filter(&self, conditions: &Conditions) -> Result<Dataset, EngineError> {
        let mut compiled = Vec::with_capacity(conditions.clauses.len());
        for (name, condition) in &conditions.clauses {
            let column = self.column(name)?;
            compiled.push((column, compile(column, condition)?));
        }

        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&row| compiled.iter().all(|(col, c)| c.matches(&col.values()[row])))
            .collect();

        log::debug!(
            "filter: {} clause(s) kept {} of {} rows",
            conditions.clauses.len(),
            keep.len(),
            self.n_rows()
        );
        Ok(self.take_rows(&keep))
    }
}
