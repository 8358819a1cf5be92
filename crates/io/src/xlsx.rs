// Excel import (xlsx, xlsm, xls)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use gridask_engine::{Column, Dataset, Value};

use crate::error::IngestError;
use crate::infer::{normalize_headers, parse_datetime, unify_column};

/// Excel stores dates as days since 1899-12-30 (1900 date system).
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..3_000_000.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(n) => Value::Float(*n),
        Data::Int(n) => Value::Int(*n),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Import one worksheet (the first, unless `sheet` names another). The first
/// row is the header.
pub fn import(path: &Path, sheet: Option<&str>) -> Result<Dataset, IngestError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| IngestError::Parse(format!("Failed to open Excel file: {}", e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| IngestError::Parse(format!("Sheet '{}' not found", wanted)))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| IngestError::Parse("Excel file contains no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| IngestError::Parse(format!("Failed to read sheet '{}': {}", name, e)))?;

    let mut rows = range.rows();
    let header = rows.next().ok_or(IngestError::Empty)?;
    let headers = normalize_headers(header.iter().map(header_text).collect());
    let width = headers.len();

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); width];
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        for (j, col) in cells.iter_mut().enumerate() {
            col.push(row.get(j).map(cell_value).unwrap_or(Value::Null));
        }
    }

    log::debug!("read sheet '{}' ({} columns)", name, width);

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column::new(name, unify_column(values)))
        .collect();
    Ok(Dataset::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_dates() {
        let dt = serial_to_datetime(45306.5).unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 12:00:00");
        assert!(serial_to_datetime(f64::NAN).is_none());
        assert!(serial_to_datetime(-1.0).is_none());
    }

    #[test]
    fn test_header_text() {
        assert_eq!(header_text(&Data::Float(2024.0)), "2024");
        assert_eq!(header_text(&Data::Empty), "");
    }
}
