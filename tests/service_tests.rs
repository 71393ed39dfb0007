#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use apistream::auth::{Authenticator, StaticTokenResolver};
use apistream::runtime_config::{AuthConfig, RuntimeConfig, ServiceConfig};
use apistream::{ApiService, Cancellation, Registry};
use common::{calls, AdList, MyAds};
use http::{Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const SECRET: &str = "test-secret";

fn service() -> ApiService {
    let registry = Arc::new(Registry::new());
    registry.register(AdList::default()).unwrap();
    registry.register(MyAds::default()).unwrap();
    let resolver = Arc::new(StaticTokenResolver::new().with_token("t-ann", "ann"));
    ApiService::new(registry).with_authenticator(Authenticator::new(resolver))
}

fn jwt_service() -> ApiService {
    let config = ServiceConfig {
        auth: AuthConfig {
            jwt_secret: Some(SECRET.into()),
            ..AuthConfig::default()
        },
        ..ServiceConfig::default()
    };
    let registry = Arc::new(Registry::with_config(RuntimeConfig::default(), &config));
    registry.register(MyAds::default()).unwrap();
    let authenticator =
        Authenticator::from_config(&config.auth, Arc::new(StaticTokenResolver::new()));
    ApiService::new(registry).with_authenticator(authenticator)
}

fn body(response: &http::Response<Vec<u8>>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[test]
fn test_query_string_reaches_handler_as_integers() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/adList?index=3&size=2&tag=svc-query")
        .header("content-type", "application/json")
        .body(br#"{"title":"promo"}"#.to_vec())
        .unwrap();
    let response = service().handle(request);

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(calls("svc-query"), vec![("promo".to_string(), 3, 2)]);
    assert_eq!(body(&response)["items"][1]["id"], 8);
}

#[test]
fn test_form_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/adList")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(b"title=spring%20sale&size=1&tag=svc-form".to_vec())
        .unwrap();
    let response = service().handle(request);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls("svc-form"), vec![("spring sale".to_string(), 0, 1)]);
}

#[test]
fn test_validation_failure_is_200_with_error_envelope() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/adList?tag=svc-invalid")
        .body(Vec::new())
        .unwrap();
    let response = service().handle(request);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["code"], "1");
    assert!(calls("svc-invalid").is_empty());
}

#[test]
fn test_malformed_json_is_400() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/adList")
        .header("content-type", "application/json")
        .body(b"{not json".to_vec())
        .unwrap();
    let response = service().handle(request);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&response)["code"], "1");
}

#[test]
fn test_request_id_is_echoed() {
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/adList")
        .header("x-request-id", id)
        .body(br#"{"title":"promo","tag":"svc-id"}"#.to_vec())
        .unwrap();
    let response = service().handle(request);
    assert_eq!(response.headers()["x-request-id"], id);
}

#[test]
fn test_auth_required_route() {
    let service = service();
    let missing = Request::builder().uri("/api/v1/myAds").body(Vec::new()).unwrap();
    let response = service.handle(missing);
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&response)["code"], "1");

    let wrong = Request::builder()
        .uri("/api/v1/myAds")
        .header("token", "t-bob")
        .body(Vec::new())
        .unwrap();
    assert_eq!(service.handle(wrong).status(), StatusCode::UNAUTHORIZED);

    let cookie = Request::builder()
        .uri("/api/v1/myAds")
        .header("cookie", "theme=dark; token=t-ann")
        .body(Vec::new())
        .unwrap();
    let response = service.handle(cookie);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), json!({"code": "0", "message": "ok", "owner": "ann"}));
}

#[test]
fn test_jwt_bearer_token() {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 600;
    let token = encode(
        &Header::default(),
        &json!({"sub": "user-7", "exp": exp}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    let request = Request::builder()
        .uri("/api/v1/myAds")
        .header("authorization", format!("Bearer {token}"))
        .body(Vec::new())
        .unwrap();
    let response = jwt_service().handle(request);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["owner"], "user-7");

    let forged = encode(
        &Header::default(),
        &json!({"sub": "user-7", "exp": exp}),
        &EncodingKey::from_secret(b"other"),
    )
    .unwrap();
    let request = Request::builder()
        .uri("/api/v1/myAds")
        .header("authorization", format!("Bearer {forged}"))
        .body(Vec::new())
        .unwrap();
    assert_eq!(jwt_service().handle(request).status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_cancelled_request_renders_error() {
    let cancellation = Cancellation::new();
    cancellation.cancel();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/adList")
        .body(br#"{"title":"promo","tag":"svc-cancel"}"#.to_vec())
        .unwrap();
    let response = service().handle_with_cancellation(request, cancellation);
    assert_eq!(body(&response), json!({"code": "1", "message": "request cancelled"}));
    assert!(calls("svc-cancel").is_empty());
}
