//! Property tests for dataset operations.
//! Run with: cargo test -p gridask-engine --test properties

use gridask_engine::{Condition, Conditions, Dataset, Value};
use proptest::prelude::*;

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        6 => (-50i64..50).prop_map(Value::Int),
    ]
}

fn dataset() -> impl Strategy<Value = Dataset> {
    (0usize..40).prop_flat_map(|rows| {
        (
            prop::collection::vec(cell(), rows),
            prop::collection::vec(cell(), rows),
        )
            .prop_map(|(a, b)| Dataset::from_columns(vec![("a", a), ("b", b)]).unwrap())
    })
}

proptest! {
    #[test]
    fn range_filter_respects_bounds(ds in dataset(), lo in -60i64..60, span in 0i64..60) {
        let hi = lo + span;
        let out = ds.filter(&Conditions::new().with("a", Condition::between(lo, hi))).unwrap();
        for v in out.column("a").unwrap().values() {
            let x = v.as_f64().unwrap();
            prop_assert!(lo as f64 <= x && x <= hi as f64);
        }
        // every qualifying row was kept
        let expected = ds
            .column("a")
            .unwrap()
            .values()
            .iter()
            .filter(|v| v.as_f64().map(|x| lo as f64 <= x && x <= hi as f64).unwrap_or(false))
            .count();
        prop_assert_eq!(out.n_rows(), expected);
    }

    #[test]
    fn chained_filters_equal_conjunction(ds in dataset(), a_min in -50i64..50, b_max in -50i64..50) {
        let first = Conditions::new().with("a", Condition::at_least(a_min));
        let second = Conditions::new().with("b", Condition::at_most(b_max));

        let chained = ds.filter(&first).unwrap().filter(&second).unwrap();
        let combined = ds.filter(&first.clone().and(second.clone())).unwrap();
        prop_assert_eq!(chained.to_rows(), combined.to_rows());
    }

    #[test]
    fn head_returns_prefix(ds in dataset(), n in 0usize..60) {
        let head = ds.head(n);
        prop_assert_eq!(head.n_rows(), n.min(ds.n_rows()));
        for r in 0..head.n_rows() {
            prop_assert_eq!(head.row(r), ds.row(r));
        }
    }

    #[test]
    fn missing_report_matches_nulls(ds in dataset()) {
        let report = ds.missing_report();
        let any_null = ds.columns().iter().any(|c| c.null_count() > 0);
        prop_assert_eq!(report.n_rows() == 0, !any_null);

        let counts: Vec<i64> = report
            .column("Missing Count")
            .unwrap()
            .values()
            .iter()
            .map(|v| match v { Value::Int(i) => *i, _ => -1 })
            .collect();
        prop_assert!(counts.windows(2).all(|w| w[0] >= w[1]));

        for row in report.to_rows() {
            let (Value::Int(n), Value::Float(pct)) = (&row[1], &row[2]) else {
                panic!("unexpected row {row:?}");
            };
            let expected = (*n as f64 / ds.n_rows() as f64 * 100.0 * 100.0).round() / 100.0;
            prop_assert!((pct - expected).abs() < 1e-9);
        }
    }
}
