#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use apistream::runtime_config::{RuntimeConfig, ServiceConfig};
use apistream::{ApiError, Registry, RequestContext, RouteKey};
use common::{calls, AdList, MyAds};
use serde_json::Value;
use std::sync::Arc;
use std::thread;

#[test]
fn test_unknown_route_is_not_found() {
    let registry = Registry::new();
    registry.register(AdList::default()).unwrap();
    let err = registry.resolve("GET", "/api/v1/adList").unwrap_err();
    assert!(matches!(err, ApiError::RouteNotFound(ref r) if *r == RouteKey::get("/api/v1/adList")));
    assert!(registry.resolve("post", "/api/v1/adList").is_ok());
}

#[test]
fn test_list_routes_is_sorted() {
    let registry = Registry::new();
    registry.register(MyAds::default()).unwrap();
    registry.register(AdList::default()).unwrap();
    assert_eq!(
        registry.list_routes(),
        vec![RouteKey::get("/api/v1/myAds"), RouteKey::post("/api/v1/adList")]
    );
    let profiles = registry.profiles();
    assert_eq!(profiles[1].1.domain, "ads");
}

#[test]
fn test_identical_schemas_compile_once() {
    let registry = Registry::new();
    registry.register(AdList::default()).unwrap();
    let cached = registry.schema_cache().size();
    registry.deregister(&RouteKey::post("/api/v1/adList"));
    registry.register(AdList::default()).unwrap();
    assert_eq!(registry.schema_cache().size(), cached);
}

#[test]
fn test_cache_disabled_still_registers() {
    let runtime = RuntimeConfig {
        schema_cache: false,
        ..RuntimeConfig::default()
    };
    let registry = Registry::with_config(runtime, &ServiceConfig::default());
    registry.register(AdList::default()).unwrap();
    assert_eq!(registry.schema_cache().size(), 0);
    let mut invocation = registry.resolve("POST", "/api/v1/adList").unwrap();
    let body: Value = serde_json::from_slice(
        &invocation.run(RequestContext::new(), br#"{"title":"x","tag":"reg-nocache"}"#),
    )
    .unwrap();
    assert_eq!(body["code"], "0");
}

#[test]
fn test_concurrent_requests_are_isolated() {
    let registry = Arc::new(Registry::new());
    registry.register(AdList::default()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let tag = format!("reg-thread-{n}");
                for round in 0..25 {
                    let input = format!(
                        r#"{{"title":"t{n}","index":"{round}","size":"{n}","tag":"{tag}"}}"#
                    );
                    let mut invocation = registry.resolve("POST", "/api/v1/adList").unwrap();
                    let body: Value = serde_json::from_slice(
                        &invocation.run(RequestContext::new(), input.as_bytes()),
                    )
                    .unwrap();
                    assert_eq!(body["index"], round);
                    assert_eq!(body["size"], n);
                    let instance = invocation.instance::<AdList>().unwrap();
                    assert_eq!(instance.title, format!("t{n}"));
                }
                tag
            })
        })
        .collect();

    for handle in handles {
        let tag = handle.join().unwrap();
        let seen = calls(&tag);
        assert_eq!(seen.len(), 25);
        let title = &seen[0].0;
        assert!(seen.iter().all(|(t, _, _)| t == title));
    }
}

#[test]
fn test_concurrent_registration_has_one_winner() {
    let registry = Arc::new(Registry::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.register(AdList::default()).is_ok())
        })
        .collect();
    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(registry.len(), 1);
}
