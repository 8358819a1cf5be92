//! Dataset profiling: column overview, missing values, data quality.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::dataset::{Column, Dataset};
use crate::error::EngineError;
use crate::stats::{mean, round_to};
use crate::value::{DType, Value, ValueKey, CATEGORICAL_MAX_DISTINCT};

/// Columns of [`Dataset::column_info`], in order.
pub const COLUMN_INFO_HEADERS: [&str; 10] = [
    "Column",
    "Data Type",
    "Non-Null Count",
    "Null Count",
    "Unique Values",
    "Memory Usage (KB)",
    "Min",
    "Max",
    "Mean",
    "Sample Values",
];

/// How many distinct values are listed for low-cardinality text columns.
const SAMPLE_VALUES: usize = 5;

/// One row of the column overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: DType,
    pub non_null: usize,
    pub nulls: usize,
    pub unique: usize,
    pub memory_kb: f64,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub mean: Option<f64>,
    pub samples: Option<Vec<Value>>,
}

impl ColumnInfo {
    pub fn from_column(col: &Column) -> Self {
        let unique = col.unique_count();
        let (min, max, avg) = if col.is_numeric() {
            let present = col.values().iter().filter(|v| !v.is_null());
            let min = present.clone().min_by(|a, b| a.total_cmp(b)).cloned();
            let max = present.max_by(|a, b| a.total_cmp(b)).cloned();
            (min, max, mean(&col.numeric_values()).map(|m| round_to(m, 2)))
        } else {
            (None, None, None)
        };
        let samples = if col.dtype().is_textual() && unique < CATEGORICAL_MAX_DISTINCT {
            Some(col.unique_values().into_iter().take(SAMPLE_VALUES).collect())
        } else {
            None
        };

        Self {
            name: col.name().to_string(),
            dtype: col.dtype(),
            non_null: col.non_null_count(),
            nulls: col.null_count(),
            unique,
            memory_kb: round_to(col.memory_estimate() as f64 / 1024.0, 2),
            min,
            max,
            mean: avg,
            samples,
        }
    }

    fn into_row(self) -> Vec<Value> {
        vec![
            Value::Text(self.name),
            Value::from(self.dtype.as_str()),
            Value::Int(self.non_null as i64),
            Value::Int(self.nulls as i64),
            Value::Int(self.unique as i64),
            Value::Float(self.memory_kb),
            self.min.unwrap_or(Value::Null),
            self.max.unwrap_or(Value::Null),
            self.mean.map(Value::Float).unwrap_or(Value::Null),
            self.samples
                .map(|s| Value::Text(s.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")))
                .unwrap_or(Value::Null),
        ]
    }
}

impl Dataset {
    /// Per-column overview as a table, one row per column.
    pub fn column_info(&self) -> Dataset {
        let rows = self.columns().iter().map(|c| ColumnInfo::from_column(c).into_row()).collect();
        let dtypes = [
            DType::Text,
            DType::Categorical,
            DType::Numeric,
            DType::Numeric,
            DType::Numeric,
            DType::Numeric,
            DType::Text,
            DType::Text,
            DType::Numeric,
            DType::Text,
        ];
        from_rows_typed(&COLUMN_INFO_HEADERS, &dtypes, rows)
    }

    /// Null count and percentage for every column that has nulls, most
    /// missing first. No rows when nothing is missing.
    pub fn missing_report(&self) -> Dataset {
        let total = self.n_rows();
        let mut missing: Vec<(&str, usize)> = self
            .columns()
            .iter()
            .map(|c| (c.name(), c.null_count()))
            .filter(|(_, n)| *n > 0)
            .collect();
        // stable: ties keep column order
        missing.sort_by(|a, b| b.1.cmp(&a.1));

        let rows = missing
            .into_iter()
            .map(|(name, n)| {
                let pct = if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 };
                vec![Value::from(name), Value::Int(n as i64), Value::Float(round_to(pct, 2))]
            })
            .collect();
        from_rows_typed(
            &["Column", "Missing Count", "Missing Percentage"],
            &[DType::Text, DType::Numeric, DType::Numeric],
            rows,
        )
    }

    pub fn quality_report(&self) -> QualityReport {
        let mut seen: FxHashSet<Vec<ValueKey>> = FxHashSet::default();
        let mut duplicates = 0usize;
        let mut complete = 0usize;
        for r in 0..self.n_rows() {
            let keys: Vec<ValueKey> = self.columns().iter().map(|c| c.values()[r].key()).collect();
            if keys.iter().all(|k| *k != ValueKey::Null) {
                complete += 1;
            }
            if !seen.insert(keys) {
                duplicates += 1;
            }
        }

        let count = |pred: fn(DType) -> bool| self.columns().iter().filter(|c| pred(c.dtype())).count();
        QualityReport {
            total_records: self.n_rows(),
            total_columns: self.n_cols(),
            duplicate_rows: duplicates,
            complete_records: complete,
            numeric_columns: count(|t| t == DType::Numeric),
            text_columns: count(|t| t.is_textual()),
            date_columns: count(|t| t == DType::DateTime),
        }
    }

    /// Analyses worth trying given the column mix, most broadly useful first.
    pub fn suggest_analyses(&self) -> Vec<&'static str> {
        let report = self.quality_report();
        let mut out = Vec::new();
        if report.numeric_columns >= 2 {
            out.push("Correlation analysis between numeric variables");
            out.push("Statistical summary of numeric columns");
        }
        if report.text_columns > 0 {
            out.push("Frequency analysis of categorical variables");
        }
        if report.numeric_columns > 0 && report.text_columns > 0 {
            out.push("Group-by analysis (numeric by categories)");
        }
        if report.date_columns > 0 {
            out.push("Time series analysis");
        }
        if report.numeric_columns > 0 {
            out.push("Outlier detection and analysis");
        }
        out
    }
}

fn from_rows_typed(headers: &[&str], dtypes: &[DType], rows: Vec<Vec<Value>>) -> Dataset {
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); headers.len()];
    for row in rows {
        for (col, v) in columns.iter_mut().zip(row) {
            col.push(v);
        }
    }
    let columns = headers
        .iter()
        .zip(dtypes)
        .zip(columns)
        .map(|((name, dtype), values)| Column::with_dtype(*name, *dtype, values))
        .collect();
    // Headers are fixed, distinct literals and every row has one value per header.
    Dataset::new(columns).unwrap_or_else(|_: EngineError| Dataset::empty())
}

/// Dataset-level quality metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub total_records: usize,
    pub total_columns: usize,
    pub duplicate_rows: usize,
    pub complete_records: usize,
    pub numeric_columns: usize,
    pub text_columns: usize,
    pub date_columns: usize,
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records:     {}", crate::render::group_thousands(self.total_records as i64))?;
        writeln!(f, "Total columns:     {}", self.total_columns)?;
        writeln!(f, "Duplicate rows:    {}", self.duplicate_rows)?;
        writeln!(f, "Complete records:  {}", self.complete_records)?;
        writeln!(f, "Numeric columns:   {}", self.numeric_columns)?;
        writeln!(f, "Text columns:      {}", self.text_columns)?;
        write!(f, "Date columns:      {}", self.date_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns(vec![
            ("id", vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(3)]),
            ("dept", vec!["eng".into(), Value::Null, "eng".into(), "eng".into()]),
            ("score", vec![Value::Float(1.5), Value::Null, Value::Null, Value::Null]),
        ])
        .unwrap()
    }

    #[test]
    fn column_info_rows() {
        let info = sample().column_info();
        assert_eq!(info.column_names(), COLUMN_INFO_HEADERS.to_vec());
        assert_eq!(info.n_rows(), 3);

        let id = info.row(0).unwrap();
        assert_eq!(id[0], Value::from("id"));
        assert_eq!(id[2], Value::Int(4));
        assert_eq!(id[6], Value::Int(1));
        assert_eq!(id[7], Value::Int(3));
        assert_eq!(id[8], Value::Float(2.25));
        assert!(id[9].is_null());

        let dept = info.row(1).unwrap();
        assert_eq!(dept[1], Value::from("categorical"));
        assert_eq!(dept[3], Value::Int(1));
        assert_eq!(dept[9], Value::from("eng"));
        assert!(dept[8].is_null());
    }

    #[test]
    fn missing_report_sorted_desc() {
        let report = sample().missing_report();
        assert_eq!(report.n_rows(), 2);
        assert_eq!(report.row(0).unwrap(), vec![Value::from("score"), Value::Int(3), Value::Float(75.0)]);
        assert_eq!(report.row(1).unwrap(), vec![Value::from("dept"), Value::Int(1), Value::Float(25.0)]);
    }

    #[test]
    fn missing_report_empty_without_nulls() {
        let ds = Dataset::from_columns(vec![("a", vec![Value::Int(1)])]).unwrap();
        let report = ds.missing_report();
        assert_eq!(report.n_rows(), 0);
        assert_eq!(report.n_cols(), 3);
    }

    #[test]
    fn quality_counts() {
        let q = sample().quality_report();
        assert_eq!(q.total_records, 4);
        assert_eq!(q.duplicate_rows, 1);
        assert_eq!(q.complete_records, 1);
        assert_eq!(q.numeric_columns, 2);
        assert_eq!(q.text_columns, 1);
    }

    #[test]
    fn suggestions_follow_column_mix() {
        let s = sample().suggest_analyses();
        assert_eq!(s.first(), Some(&"Correlation analysis between numeric variables"));
        assert!(s.contains(&"Group-by analysis (numeric by categories)"));
        assert!(!s.contains(&"Time series analysis"));
    }
}
