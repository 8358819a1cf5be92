//! The dataset handle.
//!
//! A `Dataset` is an immutable columnar table. Every operation returns a new
//! handle; the receiver is never mutated. The store sits behind an `Arc`, so
//! clones are cheap and handles can be shared across threads.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::EngineError;
use crate::value::{infer_dtype, DType, Value, ValueKey};

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: DType,
    values: Vec<Value>,
}

impl Column {
    /// Build a column, inferring its type from the values.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = infer_dtype(&values);
        Self { name: name.into(), dtype, values }
    }

    /// Build a column with an explicit type.
    pub fn with_dtype(name: impl Into<String>, dtype: DType, values: Vec<Value>) -> Self {
        Self { name: name.into(), dtype, values }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype == DType::Numeric
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn non_null_count(&self) -> usize {
        self.values.len() - self.null_count()
    }

    /// Number of distinct non-null values.
    pub fn unique_count(&self) -> usize {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .map(Value::key)
            .collect::<FxHashSet<_>>()
            .len()
    }

    /// Distinct non-null values in first-seen order.
    pub fn unique_values(&self) -> Vec<Value> {
        let mut seen = FxHashSet::default();
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .filter(|v| seen.insert(v.key()))
            .cloned()
            .collect()
    }

    /// Non-null numeric values, in row order.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }

    /// Numeric values, failing if the column is not numeric.
    pub fn require_numeric(&self) -> Result<Vec<f64>, EngineError> {
        if !self.is_numeric() {
            return Err(EngineError::TypeMismatch {
                column: self.name.clone(),
                expected: "numeric".to_string(),
                found: self.dtype.as_str().to_string(),
            });
        }
        Ok(self.numeric_values())
    }

    /// Rough in-memory footprint in bytes.
    pub fn memory_estimate(&self) -> usize {
        self.values
            .iter()
            .map(|v| match v {
                Value::Text(s) => s.len() + 24,
                _ => 8,
            })
            .sum()
    }

    fn take(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            dtype: self.dtype,
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

#[derive(Debug)]
struct Frame {
    columns: Vec<Column>,
    rows: usize,
}

/// Immutable tabular dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: Arc<Frame>,
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.frame, &other.frame)
            || (self.frame.rows == other.frame.rows && self.frame.columns == other.frame.columns)
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self::empty()
    }
}

impl Dataset {
    /// A dataset with no columns and no rows.
    pub fn empty() -> Self {
        Self { frame: Arc::new(Frame { columns: Vec::new(), rows: 0 }) }
    }

    /// Build from typed columns. Names must be unique and lengths equal.
    pub fn new(columns: Vec<Column>) -> Result<Self, EngineError> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut names = FxHashSet::default();
        for col in &columns {
            if !names.insert(col.name.as_str()) {
                return Err(EngineError::DuplicateColumn(col.name.clone()));
            }
            if col.len() != rows {
                return Err(EngineError::RaggedColumns {
                    column: col.name.clone(),
                    expected: rows,
                    found: col.len(),
                });
            }
        }
        Ok(Self { frame: Arc::new(Frame { columns, rows }) })
    }

    /// Build from `(name, values)` pairs, inferring each column's type.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Result<Self, EngineError> {
        Self::new(columns.into_iter().map(|(name, values)| Column::new(name, values)).collect())
    }

    /// Build from a header row and row-major data. Short rows are padded
    /// with nulls; long rows are an error.
    pub fn from_rows<S: Into<String>>(headers: Vec<S>, rows: Vec<Vec<Value>>) -> Result<Self, EngineError> {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let width = headers.len();
        let mut columns: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(EngineError::InvalidArgument(format!(
                    "row {} has {} values but there are {} columns",
                    r + 1,
                    row.len(),
                    width
                )));
            }
            let mut cells = row.into_iter();
            for col in columns.iter_mut() {
                col.push(cells.next().unwrap_or(Value::Null));
            }
        }
        Self::from_columns(headers.into_iter().zip(columns).collect())
    }

    pub fn n_rows(&self) -> usize {
        self.frame.rows
    }

    pub fn n_cols(&self) -> usize {
        self.frame.columns.len()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.frame.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame.columns.iter().map(Column::name).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.frame.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, EngineError> {
        self.frame
            .columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| EngineError::UnknownColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `(row, column index)`.
    pub fn value(&self, row: usize, col: usize) -> Option<&Value> {
        self.frame.columns.get(col).and_then(|c| c.values.get(row))
    }

    /// A full row, in column order.
    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        if row >= self.n_rows() {
            return None;
        }
        Some(self.frame.columns.iter().map(|c| c.values[row].clone()).collect())
    }

    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.frame.columns.iter().filter(|c| c.is_numeric()).collect()
    }

    /// New dataset holding the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Dataset {
        let columns = self.frame.columns.iter().map(|c| c.take(indices)).collect();
        Dataset { frame: Arc::new(Frame { columns, rows: indices.len() }) }
    }

    /// First `n` rows in original order.
    pub fn head(&self, n: usize) -> Dataset {
        let end = n.min(self.n_rows());
        self.take_rows(&(0..end).collect::<Vec<_>>())
    }

    /// Last `n` rows in original order.
    pub fn tail(&self, n: usize) -> Dataset {
        let start = self.n_rows().saturating_sub(n);
        self.take_rows(&(start..self.n_rows()).collect::<Vec<_>>())
    }

    /// Project onto the named columns, in the requested order.
    pub fn select(&self, names: &[&str]) -> Result<Dataset, EngineError> {
        let columns = names
            .iter()
            .map(|name| self.column(name).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Dataset::new(columns)
    }

    /// Stable sort by one column. Nulls always go last.
    pub fn sort_by(&self, column: &str, descending: bool) -> Result<Dataset, EngineError> {
        let col = self.column(column)?;
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by(|&a, &b| {
            let (va, vb) = (&col.values[a], &col.values[b]);
            match (va.is_null(), vb.is_null()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) if descending => vb.total_cmp(va),
                (false, false) => va.total_cmp(vb),
            }
        });
        Ok(self.take_rows(&order))
    }

    /// Frequency of each distinct non-null value, most frequent first.
    /// Ties are broken by value order. `top_n` of `None` keeps all.
    pub fn value_counts(&self, column: &str, top_n: Option<usize>) -> Result<Dataset, EngineError> {
        let col = self.column(column)?;
        let mut counts: FxHashMap<ValueKey, (Value, i64)> = FxHashMap::default();
        for v in col.values.iter().filter(|v| !v.is_null()) {
            counts.entry(v.key()).or_insert_with(|| (v.clone(), 0)).1 += 1;
        }
        let mut entries: Vec<(ValueKey, (Value, i64))> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1 .1.cmp(&a.1 .1).then_with(|| a.0.cmp(&b.0)));
        if let Some(n) = top_n {
            entries.truncate(n);
        }

        let (values, freqs): (Vec<Value>, Vec<Value>) =
            entries.into_iter().map(|(_, (v, n))| (v, Value::Int(n))).unzip();
        let count_name = if column == "count" { "frequency" } else { "count" };
        Dataset::new(vec![
            Column::with_dtype(col.name.clone(), col.dtype, values),
            Column::with_dtype(count_name, DType::Numeric, freqs),
        ])
    }

    /// Rows as `Vec<Vec<Value>>`, row-major.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        (0..self.n_rows())
            .map(|r| self.frame.columns.iter().map(|c| c.values[r].clone()).collect())
            .collect()
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Schema<'a> {
            name: &'a str,
            dtype: DType,
        }

        let schema: Vec<Schema<'_>> = self
            .columns()
            .iter()
            .map(|c| Schema { name: c.name(), dtype: c.dtype() })
            .collect();
        let rows = self.to_rows();

        let mut state = serializer.serialize_struct("Dataset", 2)?;
        state.serialize_field("columns", &schema)?;
        state.serialize_field("rows", &rows)?;
        state.end()
    }
}
