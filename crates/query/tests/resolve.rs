//! End-to-end resolution through both tiers.
//! Run with: cargo test -p gridask-query --test resolve

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gridask_engine::{Dataset, Value};
use gridask_query::{
    DatasetContext, ErrorKind, Outcome, Resolver, ResolverConfig, ResultData, Synthesis,
    SynthError, Synthesizer, Tier,
};

fn employees() -> Dataset {
    let ids = (1..=100).map(|i| Value::Text(format!("E{:03}", i))).collect();
    let ages = (1..=100).map(|i| Value::Int(20 + (i % 40))).collect();
    let salaries = (1..=100).map(|i| Value::Float(30_000.0 + 250.0 * i as f64)).collect();
    Dataset::from_columns(vec![("id", ids), ("age", ages), ("salary", salaries)]).unwrap()
}

fn table(outcome: &Outcome) -> &Dataset {
    match outcome.data() {
        Some(ResultData::Table(t)) => t,
        other => panic!("expected a table, got {other:?}"),
    }
}

/// Replies with fixed code and records what it was asked.
struct Scripted {
    code: &'static str,
    calls: Arc<AtomicUsize>,
    saw_preview: Arc<AtomicUsize>,
}

impl Synthesizer for Scripted {
    fn synthesize(&self, context: &DatasetContext, _query: &str) -> Result<Synthesis, SynthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if context.preview.is_some() {
            self.saw_preview.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Synthesis { code: self.code.to_string(), explanation: "Scripted answer.".into() })
    }
}

fn scripted(code: &'static str, privacy_mode: bool) -> (Resolver, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let saw_preview = Arc::new(AtomicUsize::new(0));
    let synth = Scripted { code, calls: calls.clone(), saw_preview: saw_preview.clone() };
    let config = ResolverConfig { privacy_mode, ..ResolverConfig::default() };
    (Resolver::new(config, Some(Box::new(synth))), calls, saw_preview)
}

#[test]
fn top_five_rows() {
    let ds = employees();
    let outcome = Resolver::pattern_only(ResolverConfig::default()).resolve(&ds, "show me the top 5 rows");
    assert!(outcome.is_success());
    assert_eq!(outcome.tier(), Some(Tier::PatternMatched));
    assert!(outcome.explanation().unwrap().contains('5'));

    let rows = table(&outcome);
    assert_eq!(rows.n_rows(), 5);
    for r in 0..5 {
        assert_eq!(rows.row(r), ds.row(r));
    }
}

#[test]
fn correlation_matrix_two_numeric_columns() {
    let outcome = Resolver::pattern_only(ResolverConfig::default()).resolve(&employees(), "correlation");
    assert!(outcome.is_success());

    let m = table(&outcome);
    assert_eq!(m.column_names(), vec!["column", "age", "salary"]);
    assert_eq!(m.n_rows(), 2);
    assert_eq!(m.value(0, 1), Some(&Value::Float(1.0)));
    assert_eq!(m.value(1, 2), Some(&Value::Float(1.0)));
}

#[test]
fn correlation_single_numeric_column() {
    let ds = Dataset::from_columns(vec![("x", vec![Value::Int(1), Value::Int(2), Value::Int(3)])]).unwrap();
    let outcome = Resolver::pattern_only(ResolverConfig::default()).resolve(&ds, "correlation between x and y");
    assert!(!outcome.is_success());
    assert_eq!(outcome.error_kind(), Some(ErrorKind::UnsupportedOperation));
}

#[test]
fn complex_query_without_backend() {
    let outcome = Resolver::pattern_only(ResolverConfig::default()).resolve(
        &employees(),
        "compute the median absolute deviation of salary grouped by department",
    );
    assert_eq!(outcome.error_kind(), Some(ErrorKind::BackendUnavailable));
    assert!(outcome.error_message().is_some());
}

#[test]
fn summary_always_resolves_to_overview() {
    let resolver = Resolver::pattern_only(ResolverConfig::default());
    let ds = employees();
    let first = resolver.resolve(&ds, "Give me a summary");
    for _ in 0..5 {
        assert_eq!(resolver.resolve(&ds, "Give me a summary"), first);
    }
    assert_eq!(first.code(), Some("df:column_info()"));
}

#[test]
fn tier_two_runs_generated_code() {
    let (resolver, calls, _) = scripted("older = df:filter({age = {min = 50}})\nresult = older.salary:mean()", false);
    let outcome = resolver.resolve(&employees(), "average salary of people aged 50 or more");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.tier(), Some(Tier::AiResolved));
    assert!(outcome.generated_code().unwrap().contains("df:filter"));
    match outcome.data() {
        Some(ResultData::Scalar(s)) => assert!(s.parse::<f64>().is_ok(), "{s}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn tier_one_hit_never_calls_synthesizer() {
    let (resolver, calls, _) = scripted("result = 1", false);
    resolver.resolve(&employees(), "list the columns");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn privacy_mode_withholds_preview() {
    let (private, _, private_previews) = scripted("result = len(df)", true);
    private.resolve(&employees(), "what is the salary spread");
    assert_eq!(private_previews.load(Ordering::SeqCst), 0);

    let (open, _, open_previews) = scripted("result = len(df)", false);
    open.resolve(&employees(), "what is the salary spread");
    assert_eq!(open_previews.load(Ordering::SeqCst), 1);
}

#[test]
fn dataset_survives_failed_queries() {
    let ds = employees();
    let (resolver, _, _) = scripted("result = df['bonus']:sum()", false);
    let failed = resolver.resolve(&ds, "total bonus");
    assert_eq!(failed.error_kind(), Some(ErrorKind::ExecutionFailed));

    let ok = resolver.resolve(&ds, "how many rows");
    assert_eq!(ok.data(), Some(&ResultData::Scalar("Total rows: 100".into())));
}
