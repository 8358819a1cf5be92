//! The sandbox never panics and always answers with a value or an error.
//! Run with: cargo test -p gridask-query --test sandbox_props

use gridask_engine::{Dataset, Value};
use gridask_query::{Sandbox, SandboxError};
use proptest::prelude::*;

fn dataset() -> Dataset {
    Dataset::from_columns(vec![
        ("k", vec!["a".into(), "b".into(), Value::Null]),
        ("v", vec![Value::Int(1), Value::Float(2.5), Value::Null]),
    ])
    .unwrap()
}

/// Fragments built from pieces of the dialect, so most of them get past
/// validation and reach the interpreter.
fn fragment() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        Just("df"), Just(":"), Just("."), Just("head("), Just("filter({"), Just("k"), Just("v"),
        Just("="), Just("'a'"), Just("1"), Just("-3"), Just(")"), Just("})"), Just("{"), Just("}"),
        Just("["), Just("]"), Just("\n"), Just("result"), Just(" = "), Just("len("), Just("sum("),
        Just("min("), Just("round("), Just(","), Just("+"), Just("/"), Just("#"), Just(".."),
        Just("mean()"), Just("values()"), Just("x"), Just("nil"), Just("0/0"),
    ];
    prop::collection::vec(piece, 0..24).prop_map(|parts| parts.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn arbitrary_text_never_panics(code in "\\PC{0,80}") {
        let result = Sandbox::default().execute(&dataset(), &code);
        prop_assert!(!matches!(result, Err(SandboxError::Panic(_))));
    }

    #[test]
    fn dialect_fragments_never_panic(code in fragment()) {
        let result = Sandbox::default().execute(&dataset(), &code);
        prop_assert!(!matches!(result, Err(SandboxError::Panic(_))));
        if let Err(e) = result {
            prop_assert!(!e.to_string().is_empty());
        }
    }
}
