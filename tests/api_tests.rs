#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::*;
use lnurld::auth::BasicAuth;
use lnurld::lnurl::encode_lnurl;
use lnurld::observability::CORRELATION_ID_HEADER;
use lnurld::router::build_router;
use lnurld::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PASSWORD: &str = "api-password";

fn app(harness: &TestHarness) -> Router {
    build_router(
        AppState::new_with_core(harness.core.clone()),
        Arc::new(BasicAuth::new(Some(PASSWORD.to_string()))),
    )
}

fn authorization() -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("lnurld:{}", PASSWORD))
    )
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::AUTHORIZATION, authorization())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, authorization())
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_liveness_needs_no_auth() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_components() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // No event handlers and no rate source in the harness
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["ledger"]["status"], "healthy");
    assert_eq!(body["checks"]["payment_broker"]["status"], "healthy");
    assert_eq!(body["checks"]["dollar_rate"]["status"], "degraded");
}

#[tokio::test]
async fn test_health_fails_on_unbalanced_ledger() {
    let harness = TestHarness::new();
    harness.ledger.unbalance();

    let response = app(&harness)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_scan_without_lnurl() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(post_json(
            "/v1/lnurl/scan",
            json!({ "userId": USER, "text": "good morning", "messageId": 3 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "outcome": "no_lnurl" }));
}

#[tokio::test]
async fn test_handle_rejection_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pay"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "ERROR", "reason": "no balance" })),
        )
        .mount(&server)
        .await;
    let harness = TestHarness::new();
    let lnurl = encode_lnurl(&format!("{}/pay", server.uri())).unwrap();

    let response = app(&harness)
        .oneshot(post_json(
            "/v1/lnurl/handle",
            json!({ "userId": USER, "text": lnurl, "messageId": 3 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "LNURL_REJECTED");
    assert_eq!(body["error"]["rejection"]["reason"], "no balance");
    assert_eq!(harness.notifier.kinds(), vec!["lnurl_error"]);
}

#[tokio::test]
async fn test_confirm_unknown_prompt_is_not_found() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(post_json(
            "/v1/lnurl/pay/confirm",
            json!({
                "userId": USER,
                "promptMessageId": 55,
                "amountMsat": 1000,
                "messageId": 56
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(harness.notifier.sent()[0].reply_to, Some(56));
}

#[tokio::test]
async fn test_resolve_payment() {
    let harness = TestHarness::new();
    let waiter = harness.core.broker.wait_for_payment(&payment_hash_hex());

    let response = app(&harness)
        .oneshot(post_json(
            "/v1/payments/resolve",
            json!({ "paymentHash": payment_hash_hex(), "preimage": preimage_hex() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "delivered": 1 }));
    assert_eq!(waiter.wait().await.unwrap(), preimage_hex());

    let response = app(&harness)
        .oneshot(post_json(
            "/v1/payments/resolve",
            json!({ "paymentHash": payment_hash_hex(), "preimage": "zz" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ledger_check() {
    let harness = TestHarness::new();

    let response = app(&harness).oneshot(get("/v1/ledger/check")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "account": CLEARING_ACCOUNT, "balanced": true })
    );

    harness.ledger.unbalance();
    let response = app(&harness).oneshot(get("/v1/ledger/check")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["code"], "LEDGER_INVARIANT");
}

#[tokio::test]
async fn test_usd_estimate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "last": "50000.0" })))
        .mount(&server)
        .await;
    let harness = TestHarness::with_rate_source(&format!("{}/ticker", server.uri()));

    let response = app(&harness)
        .oneshot(get("/v1/rate/usd?msat=1000000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["formatted"], "0.50 USD");
    assert!((body["usd"].as_f64().unwrap() - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let harness = TestHarness::new();

    let response = app(&harness)
        .oneshot(
            Request::get("/health/live")
                .header(CORRELATION_ID_HEADER, "update-1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(CORRELATION_ID_HEADER).unwrap(),
        "update-1234"
    );
}
