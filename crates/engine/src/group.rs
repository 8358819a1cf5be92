//! Group-by aggregation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset};
use crate::error::EngineError;
use crate::stats::{mean, median};
use crate::value::{DType, Value, ValueKey};

/// Aggregate functions supported by [`Dataset::group_aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Mean,
    Sum,
    Count,
    Min,
    Max,
    Median,
}

impl AggFunc {
    pub const ALL: [AggFunc; 6] =
        [AggFunc::Mean, AggFunc::Sum, AggFunc::Count, AggFunc::Min, AggFunc::Max, AggFunc::Median];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunc::Mean => "mean",
            AggFunc::Sum => "sum",
            AggFunc::Count => "count",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Median => "median",
        }
    }

    fn needs_numeric(&self) -> bool {
        matches!(self, AggFunc::Mean | AggFunc::Sum | AggFunc::Median)
    }

    /// Aggregate one group's values (nulls included; they are skipped).
    pub fn apply(&self, values: &[&Value]) -> Value {
        let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
        match self {
            AggFunc::Count => Value::Int(present.len() as i64),
            AggFunc::Sum => {
                if present.iter().all(|v| matches!(v, Value::Int(_))) {
                    let total = present
                        .iter()
                        .filter_map(|v| match v {
                            Value::Int(i) => Some(*i),
                            _ => None,
                        })
                        .fold(0i64, |acc, i| acc.saturating_add(i));
                    Value::Int(total)
                } else {
                    Value::Float(present.iter().filter_map(|v| v.as_f64()).sum())
                }
            }
            AggFunc::Mean => {
                let nums: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
                mean(&nums).map(Value::Float).unwrap_or(Value::Null)
            }
            AggFunc::Median => {
                let nums: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
                median(&nums).map(Value::Float).unwrap_or(Value::Null)
            }
            AggFunc::Min => present
                .iter()
                .min_by(|a, b| a.total_cmp(b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
            AggFunc::Max => present
                .iter()
                .max_by(|a, b| a.total_cmp(b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggFunc {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(AggFunc::Mean),
            "sum" | "total" => Ok(AggFunc::Sum),
            "count" => Ok(AggFunc::Count),
            "min" => Ok(AggFunc::Min),
            "max" => Ok(AggFunc::Max),
            "median" => Ok(AggFunc::Median),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown aggregate '{other}' (expected one of mean, sum, count, min, max, median)"
            ))),
        }
    }
}

impl Dataset {
    /// One row per distinct non-null value of `group_column`, in ascending
    /// order, with `func` applied to `agg_column` within each group.
    pub fn group_aggregate(
        &self,
        group_column: &str,
        agg_column: &str,
        func: AggFunc,
    ) -> Result<Dataset, EngineError> {
        let group = self.column(group_column)?;
        let agg = self.column(agg_column)?;

        if func.needs_numeric() && !agg.is_numeric() {
            return Err(EngineError::TypeMismatch {
                column: agg_column.to_string(),
                expected: format!("numeric column for {func}"),
                found: agg.dtype().as_str().to_string(),
            });
        }

        let mut groups: BTreeMap<ValueKey, (Value, Vec<&Value>)> = BTreeMap::new();
        for (key_value, v) in group.values().iter().zip(agg.values()) {
            if key_value.is_null() {
                continue;
            }
            groups
                .entry(key_value.key())
                .or_insert_with(|| (key_value.clone(), Vec::new()))
                .1
                .push(v);
        }

        let mut keys = Vec::with_capacity(groups.len());
        let mut results = Vec::with_capacity(groups.len());
        for (_, (key_value, members)) in groups {
            keys.push(key_value);
            results.push(func.apply(&members));
        }

        let result_dtype = match func {
            AggFunc::Min | AggFunc::Max => agg.dtype(),
            _ => DType::Numeric,
        };
        // Grouping a column by itself still needs distinct output names.
        let result_name = if group_column == agg_column {
            format!("{agg_column}_{func}")
        } else {
            agg_column.to_string()
        };

        Dataset::new(vec![
            Column::with_dtype(group_column, group.dtype(), keys),
            Column::with_dtype(result_name, result_dtype, results),
        ])
    }
}
