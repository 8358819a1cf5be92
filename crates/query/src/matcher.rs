//! Tier 1: deterministic keyword rules.
//!
//! Rules are evaluated in table order and the first trigger that fires wins.
//! Matching is substring containment on the normalized query. Nothing here
//! calls out or executes generated code.

use std::sync::OnceLock;

use regex::Regex;

use gridask_engine::render::group_thousands;
use gridask_engine::Dataset;

use crate::outcome::{ErrorKind, Outcome, ResultData};
use crate::query::Query;

/// Rows shown by the top-N rule when the query names no number.
pub const DEFAULT_TOP_N: usize = 10;

/// Result of running the rule table.
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    /// A rule fired. The outcome may still be a failure (e.g. correlation on
    /// a dataset without enough numeric columns).
    Hit { rule: &'static str, outcome: Outcome },
    Miss,
}

/// Keyword predicate over the normalized query.
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    /// Every one of these must appear
    pub all: &'static [&'static str],
    /// At least one of these must appear (ignored when empty)
    pub any: &'static [&'static str],
}

impl Trigger {
    pub fn matches(&self, query: &Query) -> bool {
        self.all.iter().all(|k| query.mentions(k))
            && (self.any.is_empty() || self.any.iter().any(|k| query.mentions(k)))
    }
}

pub struct IntentRule {
    pub name: &'static str,
    pub trigger: Trigger,
    action: fn(&Dataset, &Query) -> Outcome,
}

impl IntentRule {
    pub fn apply(&self, ds: &Dataset, query: &Query) -> Outcome {
        (self.action)(ds, query)
    }
}

/// The rule table, highest priority first.
///
/// "summary" triggers both `overview` and `statistics`; the overview rule is
/// listed first and therefore always wins.
pub static RULES: [IntentRule; 7] = [
    IntentRule {
        name: "top_rows",
        trigger: Trigger { all: &["top"], any: &["rows", "records", "entries"] },
        action: top_rows,
    },
    IntentRule {
        name: "overview",
        trigger: Trigger { all: &[], any: &["info", "information", "overview", "summary"] },
        action: overview,
    },
    IntentRule {
        name: "statistics",
        trigger: Trigger { all: &[], any: &["statistics", "stats", "describe", "summary"] },
        action: statistics,
    },
    IntentRule {
        name: "row_count",
        trigger: Trigger { all: &[], any: &["count", "number of rows", "how many rows"] },
        action: row_count,
    },
    IntentRule {
        name: "columns",
        trigger: Trigger { all: &[], any: &["columns", "column names", "fields"] },
        action: columns,
    },
    IntentRule {
        name: "missing",
        trigger: Trigger { all: &[], any: &["missing", "null", "nan", "empty"] },
        action: missing,
    },
    IntentRule {
        name: "correlation",
        trigger: Trigger { all: &[], any: &["correlation", "corr"] },
        action: correlation,
    },
];

/// Run the rule table against a query.
pub fn match_query(ds: &Dataset, query: &Query) -> Match {
    for rule in RULES.iter() {
        if rule.trigger.matches(query) {
            log::debug!("rule '{}' matched query {:?}", rule.name, query.normalized());
            return Match::Hit { rule: rule.name, outcome: rule.apply(ds, query) };
        }
    }
    Match::Miss
}

fn integer_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

/// First run of digits in `text`, or `default`. Oversized literals saturate.
pub fn extract_number(text: &str, default: usize) -> usize {
    integer_pattern()
        .and_then(|re| re.find(text))
        .map(|m| m.as_str().parse::<usize>().unwrap_or(usize::MAX))
        .unwrap_or(default)
}

fn top_rows(ds: &Dataset, query: &Query) -> Outcome {
    let n = extract_number(query.raw(), DEFAULT_TOP_N);
    Outcome::pattern_matched(
        ResultData::Table(ds.head(n)),
        format!("Showing top {} rows from the dataset", n),
        format!("df:head({})", n),
    )
}

fn overview(ds: &Dataset, _query: &Query) -> Outcome {
    Outcome::pattern_matched(
        ResultData::Table(ds.column_info()),
        "Dataset overview and column information",
        "df:column_info()",
    )
}

fn statistics(ds: &Dataset, _query: &Query) -> Outcome {
    match ds.describe() {
        Ok(table) => Outcome::pattern_matched(
            ResultData::Table(table),
            "Statistical summary of numeric columns",
            "df:describe()",
        ),
        Err(e) => Outcome::failed(ErrorKind::UnsupportedOperation, e.to_string()),
    }
}

fn row_count(ds: &Dataset, _query: &Query) -> Outcome {
    let count = group_thousands(ds.n_rows() as i64);
    Outcome::pattern_matched(
        ResultData::Scalar(format!("Total rows: {}", count)),
        format!("The dataset contains {} rows", count),
        "len(df)",
    )
}

fn columns(ds: &Dataset, _query: &Query) -> Outcome {
    Outcome::pattern_matched(
        ResultData::Sequence(ds.column_names().into_iter().map(String::from).collect()),
        "List of all columns in the dataset",
        "df:columns()",
    )
}

fn missing(ds: &Dataset, _query: &Query) -> Outcome {
    let report = ds.missing_report();
    let data = if report.n_rows() == 0 {
        ResultData::Scalar("No missing values found!".to_string())
    } else {
        ResultData::Table(report)
    };
    Outcome::pattern_matched(data, "Analysis of missing values in the dataset", "df:missing_report()")
}

fn correlation(ds: &Dataset, _query: &Query) -> Outcome {
    match ds.correlation_matrix() {
        Ok(matrix) => Outcome::pattern_matched(
            ResultData::Table(matrix),
            "Correlation matrix for numeric columns",
            "df:corr()",
        ),
        Err(e) => Outcome::failed(ErrorKind::UnsupportedOperation, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridask_engine::Value;

    fn people() -> Dataset {
        Dataset::from_columns(vec![
            ("name", vec!["ann".into(), "bob".into(), "cy".into()]),
            ("age", vec![Value::Int(31), Value::Null, Value::Int(45)]),
            ("salary", vec![Value::Float(50.0), Value::Float(61.5), Value::Float(72.0)]),
        ])
        .unwrap()
    }

    fn hit(ds: &Dataset, q: &str) -> (&'static str, Outcome) {
        match match_query(ds, &Query::new(q)) {
            Match::Hit { rule, outcome } => (rule, outcome),
            Match::Miss => panic!("expected a rule to match {q:?}"),
        }
    }

    #[test]
    fn extract_number_first_integer() {
        assert_eq!(extract_number("top 5 rows of 20", 10), 5);
        assert_eq!(extract_number("top rows", 10), 10);
        assert_eq!(extract_number("top 99999999999999999999999 rows", 10), usize::MAX);
    }

    #[test]
    fn top_rows_rule() {
        let (rule, outcome) = hit(&people(), "Show me the top 2 rows");
        assert_eq!(rule, "top_rows");
        assert_eq!(outcome.code(), Some("df:head(2)"));
        assert!(outcome.explanation().unwrap().contains('2'));
        match outcome.data() {
            Some(ResultData::Table(t)) => assert_eq!(t.n_rows(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn top_without_row_word_is_not_top_rule() {
        assert!(matches!(match_query(&people(), &Query::new("top salary")), Match::Miss));
    }

    #[test]
    fn summary_resolves_to_overview() {
        for _ in 0..3 {
            let (rule, _) = hit(&people(), "Give me a summary");
            assert_eq!(rule, "overview");
        }
        let (rule, _) = hit(&people(), "describe the data");
        assert_eq!(rule, "statistics");
    }

    #[test]
    fn row_count_formats_thousands() {
        let big = Dataset::from_columns(vec![("x", vec![Value::Int(1); 1234])]).unwrap();
        let (_, outcome) = hit(&big, "how many rows are there?");
        assert_eq!(outcome.data(), Some(&ResultData::Scalar("Total rows: 1,234".into())));
    }

    #[test]
    fn column_listing() {
        let (_, outcome) = hit(&people(), "list the column names");
        assert_eq!(
            outcome.data(),
            Some(&ResultData::Sequence(vec!["name".into(), "age".into(), "salary".into()]))
        );
    }

    #[test]
    fn missing_values() {
        let (_, outcome) = hit(&people(), "any missing values?");
        match outcome.data() {
            Some(ResultData::Table(t)) => assert_eq!(t.n_rows(), 1),
            other => panic!("unexpected {other:?}"),
        }

        let clean = Dataset::from_columns(vec![("x", vec![Value::Int(1)])]).unwrap();
        let (_, outcome) = hit(&clean, "show missing");
        assert_eq!(outcome.data(), Some(&ResultData::Scalar("No missing values found!".into())));
    }

    #[test]
    fn correlation_needs_two_numeric_columns() {
        let (_, outcome) = hit(&people(), "correlation please");
        assert!(outcome.is_success());

        let single = Dataset::from_columns(vec![("x", vec![Value::Int(1), Value::Int(2)])]).unwrap();
        let (_, outcome) = hit(&single, "correlation between x and y");
        assert_eq!(outcome.error_kind(), Some(ErrorKind::UnsupportedOperation));
    }

    #[test]
    fn unmatched_query_misses() {
        let q = Query::new("compute the median absolute deviation of salary grouped by department");
        assert_eq!(match_query(&people(), &q), Match::Miss);
    }
}
