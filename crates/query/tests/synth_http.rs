//! The chat-completions client against a mock server.
//! Run with: cargo test -p gridask-query --test synth_http

use std::time::Duration;

use httpmock::prelude::*;

use gridask_engine::{Dataset, Value};
use gridask_query::{
    DatasetContext, ErrorKind, OpenAiSynthesizer, Resolver, ResolverConfig, ResultData, SynthError,
    Synthesizer, Tier,
};

fn dataset() -> Dataset {
    Dataset::from_columns(vec![
        ("dept", vec!["ops".into(), "eng".into(), "eng".into()]),
        ("salary", vec![Value::Int(50), Value::Int(100), Value::Int(120)]),
    ])
    .unwrap()
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn client(server: &MockServer, timeout: Duration) -> OpenAiSynthesizer {
    OpenAiSynthesizer::new(server.url("/v1"), Some("sk-test".into()), "gpt-4", timeout).unwrap()
}

#[test]
fn test_request_shape_and_code_extraction() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .body_includes("\"model\":\"gpt-4\"")
            .body_includes("User Query: total salary by dept");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(completion(
                "Sum per department:\n```lua\nresult = df:group_aggregate(\"dept\", \"salary\", \"sum\")\n```",
            ));
    });

    let ctx = DatasetContext::from_dataset(&dataset(), false);
    let synthesis = client(&server, Duration::from_secs(5))
        .synthesize(&ctx, "total salary by dept")
        .unwrap();

    mock.assert();
    assert_eq!(synthesis.code, "result = df:group_aggregate(\"dept\", \"salary\", \"sum\")");
    assert_eq!(synthesis.explanation, "Sum per department:");
}

#[test]
fn test_api_error_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({ "error": { "message": "Incorrect API key provided" } }));
    });

    let ctx = DatasetContext::from_dataset(&dataset(), true);
    let err = client(&server, Duration::from_secs(5)).synthesize(&ctx, "q").unwrap_err();
    assert_eq!(err, SynthError::Api { status: 401, message: "Incorrect API key provided".into() });
}

#[test]
fn test_malformed_and_empty_responses() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions").body_includes("qq-alpha");
        then.status(200).body("not json");
    });
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions").body_includes("qq-beta");
        then.status(200).json_body(serde_json::json!({ "choices": [] }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions").body_includes("qq-gamma");
        then.status(200).json_body(completion("I am not able to help with that."));
    });

    let ctx = DatasetContext::from_dataset(&dataset(), true);
    let c = client(&server, Duration::from_secs(5));
    assert!(matches!(c.synthesize(&ctx, "qq-alpha"), Err(SynthError::Parse(_))));
    assert!(matches!(c.synthesize(&ctx, "qq-beta"), Err(SynthError::InvalidResponse(_))));
    assert_eq!(c.synthesize(&ctx, "qq-gamma"), Err(SynthError::NoCode));
}

#[test]
fn test_slow_service_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).delay(Duration::from_millis(1500)).json_body(completion("```lua\nresult = 1\n```"));
    });

    let ctx = DatasetContext::from_dataset(&dataset(), true);
    let err = client(&server, Duration::from_millis(200)).synthesize(&ctx, "q").unwrap_err();
    assert!(matches!(err, SynthError::Timeout(_)), "{err:?}");
}

#[test]
fn test_resolver_end_to_end_over_http() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200)
            .json_body(completion("```lua\nhigh = df:filter({salary = {min = 100}})\nlen(high)\n```"));
    });

    let resolver = Resolver::new(ResolverConfig::default(), Some(Box::new(client(&server, Duration::from_secs(5)))));
    let outcome = resolver.resolve(&dataset(), "people earning at least 100");
    assert_eq!(outcome.tier(), Some(Tier::AiResolved));
    assert_eq!(outcome.data(), Some(&ResultData::Scalar("2".into())));

    let bad = Resolver::new(ResolverConfig::default(), Some(Box::new(OpenAiSynthesizer::new(
        server.url("/missing"),
        None,
        "gpt-4",
        Duration::from_secs(5),
    )
    .unwrap())));
    let outcome = bad.resolve(&dataset(), "people earning at least 100");
    assert_eq!(outcome.error_kind(), Some(ErrorKind::SynthesisFailed));
}
