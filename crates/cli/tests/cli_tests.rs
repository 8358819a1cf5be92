// End-to-end tests of the gridask binary.
//
// Every run gets its own settings file so the per-user config is never read
// or written, and AI keys are scrubbed from the environment.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const PEOPLE: &str = "name,age,salary\nann,31,50000\nbob,,61500\ncy,45,72000\n";

struct Fixture {
    dir: TempDir,
    config: PathBuf,
}

impl Fixture {
    /// AI disabled, so misses fail fast without network.
    fn new() -> Self {
        Self::with_settings(r#"{ "ai": { "provider": "none" } }"#)
    }

    fn with_settings(settings: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("settings.json");
        fs::write(&config, settings).unwrap();
        Self { dir, config }
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gridask"));
        cmd.arg("--config")
            .arg(&self.config)
            .env_remove("OPENAI_API_KEY")
            .env_remove("GRIDASK_OPENAI_KEY")
            .env_remove("GRIDASK_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    fn ask(&self, file: &Path, query: &str, extra: &[&str]) -> Output {
        self.cmd().arg("ask").arg(file).arg(query).args(extra).output().unwrap()
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn ask_row_count() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "how many rows", &[]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert!(stdout(&out).starts_with("Total rows: 3"));
    assert!(stdout(&out).contains("The dataset contains 3 rows"));
}

#[test]
fn verbose_logs_load_once() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "how many rows", &["-v"]);
    assert_eq!(out.status.code(), Some(0));
    let err = stderr(&out);
    assert_eq!(err.matches("loaded people.csv (3 rows x 3 columns, utf-8)").count(), 1, "{err}");
}

#[test]
fn ask_columns_show_code() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "list the columns", &["--show-code"]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.starts_with("name\nage\nsalary\n"));
    assert!(text.contains("-- code --\ndf:columns()"));
}

#[test]
fn ask_json_outcome() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "how many rows", &["--json"]);
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["success"], true);
    assert_eq!(v["tier"], "pattern_matched");
    assert_eq!(v["data"]["kind"], "scalar");
    assert_eq!(v["data"]["value"], "Total rows: 3");
    assert_eq!(v["code"], "len(df)");
}

#[test]
fn ask_missing_report_table() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "show missing values", &["--json"]);
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["data"]["kind"], "table");
}

#[test]
fn ask_unmatched_without_ai() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "median salary of people over thirty", &[]);
    assert_eq!(out.status.code(), Some(4));
    let err = stderr(&out);
    assert!(err.contains("[backend_unavailable] Complex queries require an API key"));
    assert!(err.contains("gridask doctor"));
}

#[test]
fn ask_unmatched_json_still_prints_outcome() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "median salary of people over thirty", &["--json"]);
    assert_eq!(out.status.code(), Some(4));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["success"], false);
    assert_eq!(v["error_kind"], "backend_unavailable");
    assert!(v.get("data").is_none());
}

#[test]
fn ask_unsupported_extension() {
    let fx = Fixture::new();
    let path = fx.file("notes.pdf", "not a table");
    let out = fx.ask(&path, "how many rows", &["--json"]);
    assert_eq!(out.status.code(), Some(3));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["error_kind"], "ingestion_failed");
}

#[test]
fn ask_file_over_size_limit() {
    let fx = Fixture::with_settings(r#"{ "ai": { "provider": "none" }, "data": { "max_file_size": 10 } }"#);
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "how many rows", &[]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn ask_empty_query_is_usage_error() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "   ", &[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("query is empty"));
}

#[test]
fn ask_respects_max_rows_display() {
    let fx = Fixture::with_settings(r#"{ "ai": { "provider": "none" }, "data": { "max_rows_display": 2 } }"#);
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.ask(&csv, "show top 3 rows", &[]);
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("... 1 more rows (3 total)"));
}

#[test]
fn info_json() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.cmd().arg("info").arg(&csv).arg("--json").output().unwrap();
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["rows"], 3);
    assert_eq!(v["source"]["file_name"], "people.csv");
    assert_eq!(v["quality"]["total_records"], 3);
    assert!(v["suggestions"].is_array());
}

#[test]
fn info_text() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let out = fx.cmd().arg("info").arg(&csv).output().unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("Total records:     3"));
}

#[test]
fn doctor_disabled() {
    let fx = Fixture::new();
    let out = fx.cmd().arg("doctor").arg("--json").output().unwrap();
    assert_eq!(out.status.code(), Some(10));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["status"], "disabled");
    assert_eq!(v["provider"], "none");
    assert_eq!(v["config_path"], fx.config.display().to_string());
}

#[test]
fn repl_session() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let mut child = fx
        .cmd()
        .arg("repl")
        .arg(&csv)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"how many rows\n\nlist columns\n:history\n:clear\n:history\n:quit\n")
        .unwrap();
    let out = child.wait_with_output().unwrap();
    assert_eq!(out.status.code(), Some(0));

    let text = stdout(&out);
    assert!(text.contains("people.csv: 3 rows x 3 columns"));
    assert!(text.contains("complex questions unavailable"));
    assert!(text.contains("Total rows: 3"));
    assert!(text.contains("  1  "));
    assert!(text.contains("how many rows"));
    assert!(text.contains("list columns"));
    assert!(text.contains("history cleared"));
    assert!(text.contains("(no queries yet)"));
}

#[test]
fn repl_ends_on_eof() {
    let fx = Fixture::new();
    let csv = fx.file("people.csv", PEOPLE);
    let mut child = fx
        .cmd()
        .arg("repl")
        .arg(&csv)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    drop(child.stdin.take());
    let out = child.wait_with_output().unwrap();
    assert_eq!(out.status.code(), Some(0));
}
