#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use apistream::context::RequestContext;
use apistream::defaults::DefaultSet;
use apistream::envelope::Envelope;
use apistream::error::ApiError;
use apistream::lineschema::Direction;
use apistream::pipeline::{request_pipeline, Exchange, Pipeline, PipelineError, Stage, StageOptions};
use apistream::schema::SchemaCache;
use common::{AdList, AD_LIST_IN, AD_LIST_OUT};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Trace = Vec<&'static str>;

fn tracing_stage(name: &'static str) -> Stage<Trace> {
    Stage::new(name, move |trace: &mut Trace, input: Vec<u8>| {
        trace.push(name);
        let mut out = input;
        out.extend_from_slice(name.as_bytes());
        Ok(out)
    })
}

fn renderer() -> apistream::pipeline::Renderer<Trace> {
    Arc::new(|_trace: &Trace, err: &PipelineError| {
        format!("{}@{}: {}", err.stage, err.index, err.error).into_bytes()
    })
}

#[test]
fn test_stages_run_in_order() {
    let pipeline = Pipeline::new(renderer(), vec![tracing_stage("a"), tracing_stage("b")])
        .stage("c", |trace: &mut Trace, input: Vec<u8>| {
            trace.push("c");
            Ok(input)
        });
    let mut trace = Trace::new();
    assert_eq!(pipeline.try_run(&mut trace, b">".to_vec()).unwrap(), b">ab");
    assert_eq!(trace, ["a", "b", "c"]);
    assert_eq!(pipeline.stage_names().collect::<Vec<_>>(), ["a", "b", "c"]);
}

#[test]
fn test_second_of_five_failing_stops_the_run() {
    let later_runs = Arc::new(AtomicUsize::new(0));
    let mut stages = vec![
        tracing_stage("one"),
        Stage::new("two", |trace: &mut Trace, _input: Vec<u8>| {
            trace.push("two");
            Err(ApiError::business("two refused"))
        }),
    ];
    for name in ["three", "four", "five"] {
        let later_runs = Arc::clone(&later_runs);
        stages.push(Stage::new(name, move |trace: &mut Trace, input: Vec<u8>| {
            later_runs.fetch_add(1, Ordering::SeqCst);
            trace.push(name);
            Ok(input)
        }));
    }
    let pipeline = Pipeline::new(renderer(), stages);
    assert_eq!(pipeline.len(), 5);

    let mut trace = Trace::new();
    let err = pipeline.try_run(&mut trace, Vec::new()).unwrap_err();
    assert_eq!(err.stage, "two");
    assert_eq!(err.index, 1);
    assert_eq!(err.category(), "business");

    let mut trace = Trace::new();
    let out = pipeline.run(&mut trace, Vec::new());
    assert_eq!(out, b"two@1: two refused");
    assert_eq!(trace, ["one", "two"]);
    assert_eq!(later_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_pipeline_is_identity() {
    let pipeline: Pipeline<Trace> = Pipeline::new(renderer(), Vec::new());
    assert!(pipeline.is_empty());
    assert_eq!(pipeline.run(&mut Trace::new(), b"same".to_vec()), b"same");
}

fn ad_list_pipeline(validate_output: bool) -> Pipeline<Exchange> {
    let cache = SchemaCache::new(true);
    let input = cache.get_or_compile(AD_LIST_IN, Direction::In).unwrap();
    let output = cache.get_or_compile(AD_LIST_OUT, Direction::Out).unwrap();
    let envelope = Envelope::default();
    request_pipeline(
        &input,
        &output,
        &Arc::new(envelope.success_defaults()),
        envelope.renderer(),
        StageOptions { validate_output },
    )
}

fn exchange() -> Exchange {
    Exchange::new(
        RequestContext::new(),
        Box::new(apistream::handler::Instance::<AdList>::new()),
    )
}

#[test]
fn test_request_pipeline_stage_order() {
    let names: Vec<_> = ad_list_pipeline(true).stage_names().collect();
    assert_eq!(
        names,
        [
            "merge_defaults",
            "validate_input",
            "coerce_input",
            "unmarshal",
            "invoke",
            "marshal",
            "format_output",
            "validate_output",
            "pack"
        ]
    );
    assert!(!ad_list_pipeline(false)
        .stage_names()
        .any(|name| name == "validate_output"));
}

#[test]
fn test_request_pipeline_runs_ad_list() {
    let pipeline = ad_list_pipeline(true);
    let mut ex = exchange();
    let out = pipeline
        .try_run(&mut ex, br#"{"title":"promo","size":"1","tag":"pipe-run"}"#.to_vec())
        .unwrap();
    let body: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        body,
        json!({
            "code": "0",
            "message": "ok",
            "index": 0,
            "size": 1,
            "total": 2,
            "items": [{"id": 1, "title": "promo #1"}]
        })
    );
}

#[test]
fn test_cancelled_request_stops_before_invoke() {
    let pipeline = ad_list_pipeline(true);
    let mut ex = exchange();
    ex.ctx.cancellation.cancel();
    let err = pipeline
        .try_run(&mut ex, br#"{"title":"promo","tag":"pipe-cancel"}"#.to_vec())
        .unwrap_err();
    assert_eq!(err.stage, "invoke");
    assert!(matches!(err.error, ApiError::Cancelled));
    assert!(common::calls("pipe-cancel").is_empty());
}

#[test]
fn test_pack_keeps_output_code() {
    let defaults = DefaultSet::from_document(&json!({"code": "0", "message": "ok"}));
    let merged = defaults.merge(br#"{"code":"7"}"#).unwrap();
    let value: Value = serde_json::from_slice(&merged).unwrap();
    assert_eq!(value, json!({"code": "7", "message": "ok"}));
}
