//! End-to-end loading from files on disk.

use std::fs;
use std::path::PathBuf;

use gridask_engine::{DType, Value};
use gridask_io::{load_path, IngestError, LoadOptions};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn loads_utf8_csv_with_typed_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "sales.csv",
        b"region,units,price,shipped,date\n\
          north,10,2.5,yes,2024-01-01\n\
          south,,3.0,no,2024-01-02\n\
          north,7,N/A,yes,2024-01-03\n",
    );

    let loaded = load_path(&path, &LoadOptions::default()).unwrap();
    let ds = &loaded.dataset;
    assert_eq!(ds.shape(), (3, 5));
    assert_eq!(ds.column("region").unwrap().dtype(), DType::Categorical);
    assert_eq!(ds.column("units").unwrap().dtype(), DType::Numeric);
    assert_eq!(ds.column("shipped").unwrap().dtype(), DType::Boolean);
    assert_eq!(ds.column("date").unwrap().dtype(), DType::DateTime);
    assert_eq!(ds.value(1, 1), Some(&Value::Null));
    assert_eq!(ds.value(2, 2), Some(&Value::Null));

    assert_eq!(loaded.source.file_name, "sales.csv");
    assert_eq!(loaded.source.encoding, "utf-8");
    assert_eq!(loaded.source.fingerprint.len(), 64);
    assert_eq!(loaded.source.bytes, fs::metadata(&path).unwrap().len());
}

#[test]
fn loads_latin1_csv() {
    let dir = tempfile::tempdir().unwrap();
    // "Zürich;Köln" in ISO-8859-1 with a semicolon delimiter
    let path = write(&dir, "cities.csv", b"city;pop\nZ\xFCrich;415\nK\xF6ln;1084\n");

    let loaded = load_path(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.source.encoding, "latin-1");
    assert_eq!(loaded.dataset.value(0, 0), Some(&Value::Text("Zürich".into())));
    assert_eq!(loaded.dataset.value(1, 1), Some(&Value::Int(1084)));
}

#[test]
fn tsv_uses_tab_delimiter() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "t.tsv", b"a\tb\n1\tx,y\n");
    let ds = load_path(&path, &LoadOptions::default()).unwrap().dataset;
    assert_eq!(ds.value(0, 1), Some(&Value::Text("x,y".into())));
}

#[test]
fn blank_and_duplicate_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "h.csv", b"id,,id\n1,2,3\n");
    let ds = load_path(&path, &LoadOptions::default()).unwrap().dataset;
    assert_eq!(ds.column_names(), vec!["id", "column_2", "id.1"]);
}

#[test]
fn same_bytes_same_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(&dir, "a.csv", b"x\n1\n");
    let b = write(&dir, "b.csv", b"x\n1\n");
    let c = write(&dir, "c.csv", b"x\n2\n");
    let opts = LoadOptions::default();
    let fa = load_path(&a, &opts).unwrap().source.fingerprint;
    let fb = load_path(&b, &opts).unwrap().source.fingerprint;
    let fc = load_path(&c, &opts).unwrap().source.fingerprint;
    assert_eq!(fa, fb);
    assert_ne!(fa, fc);
}

#[test]
fn rejects_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "data.json", b"[]");
    let err = load_path(&path, &LoadOptions::default()).unwrap_err();
    assert_eq!(err, IngestError::UnsupportedFormat("json".into()));
    assert!(err.to_string().contains(".json"));
}

#[test]
fn rejects_oversized_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "big.csv", b"a,b\n1,2\n3,4\n");
    let opts = LoadOptions { max_file_size: 4, ..LoadOptions::default() };
    let err = load_path(&path, &opts).unwrap_err();
    assert!(matches!(err, IngestError::TooLarge { limit: 4, .. }));
}

#[test]
fn undecodable_with_restricted_encodings() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "bad.csv", b"name\ncaf\xE9\n");
    let opts = LoadOptions { encodings: vec!["utf-8".into()], ..LoadOptions::default() };
    let err = load_path(&path, &opts).unwrap_err();
    assert!(matches!(err, IngestError::Unreadable { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_path(&dir.path().join("nope.csv"), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, IngestError::Io(_)));
}

#[test]
fn loads_first_excel_sheet() {
    use rust_xlsxwriter::Workbook;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "product").unwrap();
    sheet.write_string(0, 1, "qty").unwrap();
    sheet.write_string(0, 2, "price").unwrap();
    sheet.write_string(1, 0, "apple").unwrap();
    sheet.write_number(1, 1, 3.0).unwrap();
    sheet.write_number(1, 2, 1.25).unwrap();
    sheet.write_string(2, 0, "pear").unwrap();
    sheet.write_number(2, 1, 5.0).unwrap();
    sheet.write_number(2, 2, 0.8).unwrap();
    workbook.save(&path).unwrap();

    let loaded = load_path(&path, &LoadOptions::default()).unwrap();
    let ds = loaded.dataset;
    assert_eq!(loaded.source.encoding, "binary");
    assert_eq!(ds.column_names(), vec!["product", "qty", "price"]);
    assert_eq!(ds.value(1, 1), Some(&Value::Int(5)));
    assert_eq!(ds.value(0, 2), Some(&Value::Float(1.25)));
}
