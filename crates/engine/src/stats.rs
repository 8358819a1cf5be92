//! Summary statistics and correlation.

use crate::dataset::{Column, Dataset};
use crate::error::EngineError;
use crate::value::{DType, Value};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). `None` below two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile with linear interpolation between closest ranks.
/// `sorted` must be ascending.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, 0.5)
}

/// Pearson correlation of paired samples. `None` when undefined.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

pub fn round_to(x: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (x * factor).round() / factor
}

/// Row labels of [`Dataset::describe`], in order.
pub const DESCRIBE_STATS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

fn describe_column(col: &Column) -> Vec<Value> {
    let mut sorted = col.numeric_values();
    sorted.sort_by(f64::total_cmp);
    let f = |x: Option<f64>| x.map(Value::Float).unwrap_or(Value::Null);
    vec![
        Value::Float(sorted.len() as f64),
        f(mean(&sorted)),
        f(std_dev(&sorted)),
        f(sorted.first().copied()),
        f(quantile_sorted(&sorted, 0.25)),
        f(quantile_sorted(&sorted, 0.5)),
        f(quantile_sorted(&sorted, 0.75)),
        f(sorted.last().copied()),
    ]
}

impl Dataset {
    /// count, mean, std, min, quartiles and max for each numeric column.
    ///
    /// The first column, `statistic`, labels each row.
    pub fn describe(&self) -> Result<Dataset, EngineError> {
        let numeric = self.numeric_columns();
        if numeric.is_empty() {
            return Err(EngineError::NoNumericColumns);
        }

        let mut columns = Vec::with_capacity(numeric.len() + 1);
        columns.push(Column::with_dtype(
            label_column_name(self, "statistic"),
            DType::Text,
            DESCRIBE_STATS.iter().map(|s| Value::from(*s)).collect(),
        ));
        for col in numeric {
            columns.push(Column::with_dtype(col.name(), DType::Numeric, describe_column(col)));
        }
        Dataset::new(columns)
    }

    /// Pairwise Pearson correlation across numeric columns.
    ///
    /// Each pair uses the rows where both values are present. Undefined
    /// coefficients (constant column, fewer than two pairs) are null.
    pub fn correlation_matrix(&self) -> Result<Dataset, EngineError> {
        let numeric = self.numeric_columns();
        if numeric.len() < 2 {
            return Err(EngineError::InsufficientNumericColumns { found: numeric.len() });
        }

        let n = numeric.len();
        let mut matrix = vec![vec![Value::Null; n]; n];
        for i in 0..n {
            for j in i..n {
                let pairs: Vec<(f64, f64)> = numeric[i]
                    .values()
                    .iter()
                    .zip(numeric[j].values())
                    .filter_map(|(a, b)| Some((a.as_f64()?, b.as_f64()?)))
                    .collect();
                let r = if i == j {
                    // Diagonal is 1.0 whenever the column has any variance.
                    pearson(&pairs).map(|_| 1.0)
                } else {
                    pearson(&pairs)
                };
                let cell = r.map(Value::Float).unwrap_or(Value::Null);
                matrix[i][j] = cell.clone();
                matrix[j][i] = cell;
            }
        }

        let mut columns = Vec::with_capacity(n + 1);
        columns.push(Column::with_dtype(
            label_column_name(self, "column"),
            DType::Text,
            numeric.iter().map(|c| Value::from(c.name())).collect(),
        ));
        for (j, col) in numeric.iter().enumerate() {
            let values = matrix.iter().map(|row| row[j].clone()).collect();
            columns.push(Column::with_dtype(col.name(), DType::Numeric, values));
        }
        Dataset::new(columns)
    }
}

/// Name for a leading label column that cannot collide with a data column.
fn label_column_name(ds: &Dataset, preferred: &str) -> String {
    let mut name = preferred.to_string();
    while ds.has_column(&name) {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn quantiles_interpolate() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(quantile_sorted(&v, 0.25).unwrap(), 1.75));
        assert!(approx(quantile_sorted(&v, 0.5).unwrap(), 2.5));
        assert!(approx(quantile_sorted(&v, 0.75).unwrap(), 3.25));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn sample_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(std_dev(&v).unwrap(), 2.138089935299395));
        assert_eq!(std_dev(&[1.0]), None);
    }

    #[test]
    fn describe_shape_and_values() {
        let ds = Dataset::from_columns(vec![
            ("x", vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4), Value::Null]),
            ("label", vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()]),
        ])
        .unwrap();
        let d = ds.describe().unwrap();
        assert_eq!(d.column_names(), vec!["statistic", "x"]);
        assert_eq!(d.n_rows(), 8);
        let x = d.column("x").unwrap().values();
        assert_eq!(x[0], Value::Float(4.0));
        assert_eq!(x[1], Value::Float(2.5));
        assert_eq!(x[3], Value::Float(1.0));
        assert_eq!(x[7], Value::Float(4.0));
    }

    #[test]
    fn describe_without_numeric_columns() {
        let ds = Dataset::from_columns(vec![("label", vec!["a".into()])]).unwrap();
        assert_eq!(ds.describe().unwrap_err(), EngineError::NoNumericColumns);
    }

    #[test]
    fn correlation_perfect_and_inverse() {
        let ds = Dataset::from_columns(vec![
            ("a", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            ("b", vec![Value::Int(2), Value::Int(4), Value::Int(6)]),
            ("c", vec![Value::Int(3), Value::Int(2), Value::Int(1)]),
        ])
        .unwrap();
        let m = ds.correlation_matrix().unwrap();
        assert_eq!(m.shape(), (3, 4));
        let b = m.column("b").unwrap().values();
        assert!(approx(b[0].as_f64().unwrap(), 1.0));
        assert!(approx(b[1].as_f64().unwrap(), 1.0));
        assert!(approx(b[2].as_f64().unwrap(), -1.0));
    }

    #[test]
    fn correlation_needs_two_numeric_columns() {
        let ds = Dataset::from_columns(vec![
            ("x", vec![Value::Int(1), Value::Int(2)]),
            ("name", vec!["p".into(), "q".into()]),
        ])
        .unwrap();
        assert_eq!(
            ds.correlation_matrix().unwrap_err(),
            EngineError::InsufficientNumericColumns { found: 1 }
        );
    }

    #[test]
    fn constant_column_correlation_is_null() {
        let ds = Dataset::from_columns(vec![
            ("a", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            ("k", vec![Value::Int(5), Value::Int(5), Value::Int(5)]),
        ])
        .unwrap();
        let m = ds.correlation_matrix().unwrap();
        assert!(m.column("k").unwrap().values()[0].is_null());
        assert!(m.column("k").unwrap().values()[1].is_null());
    }
}
