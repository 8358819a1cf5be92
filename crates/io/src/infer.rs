//! Header cleanup and per-column typing of raw text cells.

use chrono::{NaiveDate, NaiveDateTime};
use rustc_hash::FxHashSet;

use gridask_engine::value::ValueFamily;
use gridask_engine::Value;

/// Cell texts read as missing values.
pub const NULL_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "null", "NULL", "None"];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

pub fn is_null_token(s: &str) -> bool {
    NULL_TOKENS.contains(&s.trim())
}

/// Blank headers become `column_N` (1-based position); repeats get `.1`,
/// `.2` suffixes.
pub fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut out = Vec::with_capacity(raw.len());

    for (i, name) in raw.into_iter().enumerate() {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            format!("column_{}", i + 1)
        } else {
            trimmed.to_string()
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn parse_int(s: &str) -> Option<i64> {
    s.parse::<i64>().ok()
}

fn parse_float(s: &str) -> Option<f64> {
    // Rust accepts "inf" and "infinity"; a column of words is not numeric.
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Type a column of raw cells. The first parser that accepts every non-null
/// cell wins: integer, float, boolean, date/datetime, then text.
pub fn type_column(raw: &[Option<String>]) -> Vec<Value> {
    let cells: Vec<Option<&str>> = raw
        .iter()
        .map(|c| c.as_deref().map(str::trim).filter(|s| !is_null_token(s)))
        .collect();

    fn all<T>(cells: &[Option<&str>], parse: impl Fn(&str) -> Option<T>) -> Option<Vec<Option<T>>> {
        cells
            .iter()
            .map(|c| match c {
                None => Some(None),
                Some(s) => parse(s).map(Some),
            })
            .collect()
    }

    if cells.iter().all(Option::is_none) {
        return vec![Value::Null; cells.len()];
    }
    if let Some(v) = all(&cells, parse_int) {
        return v.into_iter().map(|x| x.map_or(Value::Null, Value::Int)).collect();
    }
    if let Some(v) = all(&cells, parse_float) {
        return v.into_iter().map(|x| x.map_or(Value::Null, Value::Float)).collect();
    }
    if let Some(v) = all(&cells, parse_bool) {
        return v.into_iter().map(|x| x.map_or(Value::Null, Value::Bool)).collect();
    }
    if let Some(v) = all(&cells, parse_datetime) {
        return v.into_iter().map(|x| x.map_or(Value::Null, Value::DateTime)).collect();
    }
    cells
        .into_iter()
        .map(|c| c.map_or(Value::Null, |s| Value::Text(s.to_string())))
        .collect()
}

/// Make a column of already-typed cells consistent.
///
/// Text-only columns go through [`type_column`]. Integral floats collapse to
/// integers. Columns that mix families fall back to text.
pub fn unify_column(values: Vec<Value>) -> Vec<Value> {
    let families: FxHashSet<ValueFamily> = values.iter().filter_map(Value::family).collect();

    match families.len() {
        0 => vec![Value::Null; values.len()],
        1 if families.contains(&ValueFamily::Text) => {
            let raw: Vec<Option<String>> = values
                .into_iter()
                .map(|v| match v {
                    Value::Text(s) => Some(s),
                    _ => None,
                })
                .collect();
            type_column(&raw)
        }
        1 if families.contains(&ValueFamily::Number) => {
            let integral = values.iter().all(|v| match v {
                Value::Float(f) => f.is_nan() || (f.fract() == 0.0 && f.abs() < 1e15),
                _ => true,
            });
            if integral {
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Float(f) if !f.is_nan() => Value::Int(f as i64),
                        other => other,
                    })
                    .collect()
            } else {
                values
            }
        }
        1 => values,
        _ => values
            .into_iter()
            .map(|v| if v.is_null() { Value::Null } else { Value::Text(v.to_string()) })
            .collect(),
    }
}
