#![allow(clippy::unwrap_used)]
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::core::PromptInput;

const SECRET: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay_ms: 10,
        max_delay_ms: 10,
        backoff_multiplier: 1.0,
        timeout_secs: 5,
    }
}

fn transport_config(url: String) -> WebhookConfig {
    WebhookConfig {
        transport: Some(
            WebhookEndpoint::new("chat".to_string(), url)
                .unwrap()
                .with_secret(SECRET.to_string())
                .unwrap()
                .with_retry_config(fast_retry()),
        ),
        ..Default::default()
    }
}

#[test]
fn test_webhook_endpoint_event_filtering() {
    let endpoint = WebhookEndpoint::new(
        "filtered".to_string(),
        "https://example.com/webhook".to_string(),
    )
    .unwrap()
    .with_events(vec!["payment_confirmed".to_string()]);

    assert!(endpoint.should_receive_event("payment_confirmed"));
    assert!(!endpoint.should_receive_event("lnurl_auth"));

    let all = WebhookEndpoint::new("all".to_string(), "http://127.0.0.1:9/hook".to_string())
        .unwrap();
    assert!(all.should_receive_event("any_event"));

    let mut disabled = all.clone();
    disabled.enabled = false;
    assert!(!disabled.should_receive_event("lnurl_auth"));
}

#[test]
fn test_url_validation() {
    assert!(WebhookEndpoint::new("ftp".to_string(), "ftp://example.com/hook".to_string()).is_err());
    assert!(WebhookEndpoint::new("file".to_string(), "file:///etc/passwd".to_string()).is_err());
    assert!(WebhookEndpoint::new("junk".to_string(), "not a url".to_string()).is_err());
}

#[test]
fn test_secret_validation() {
    let endpoint =
        WebhookEndpoint::new("e".to_string(), "https://example.com/hook".to_string()).unwrap();

    assert!(endpoint.clone().with_secret("short".to_string()).is_err());
    assert!(endpoint.clone().with_secret("a".repeat(40)).is_err());
    assert!(endpoint.with_secret(SECRET.to_string()).is_ok());
}

#[test]
fn test_hmac_signature_round_trip() {
    let payload = r#"{"test": "data"}"#;

    let signature = WebhookNotifier::calculate_hmac_signature(payload, SECRET).unwrap();
    assert!(signature.starts_with("sha256="));
    assert_eq!(signature.len(), 71);

    assert!(WebhookNotifier::verify_hmac_signature(payload, &signature, SECRET));
    assert!(!WebhookNotifier::verify_hmac_signature(payload, "sha256=00", SECRET));
    assert!(!WebhookNotifier::verify_hmac_signature(payload, &signature, "wrong-secret"));
}

#[test]
fn test_event_payload_redacts_preimage() {
    let notifier = WebhookNotifier::new(WebhookConfig::default()).unwrap();
    let event = WalletEvent::PaymentConfirmed {
        user_id: 7,
        domain: "shop.example".to_string(),
        payment_hash: "ab".repeat(32),
        preimage: "cd".repeat(32),
        timestamp: Utc::now(),
    };

    let payload = notifier.create_webhook_payload(&event, "evt-1").unwrap();

    assert_eq!(payload["id"], "evt-1");
    assert_eq!(payload["type"], "payment_confirmed");
    assert_eq!(payload["data"]["preimage"], "[REDACTED]");
    assert_eq!(payload["data"]["payment_hash"], "ab".repeat(32));
    assert_eq!(payload["data"]["user_id"], 7);
}

#[test]
fn test_debug_does_not_leak_secrets() {
    let endpoint = WebhookEndpoint::new("test".to_string(), "https://example.com/hook".to_string())
        .unwrap()
        .with_secret(SECRET.to_string())
        .unwrap();

    let debug_str = format!("{:?}", endpoint);
    assert!(!debug_str.contains(SECRET));
    assert!(debug_str.contains("[REDACTED]"));
}

#[tokio::test]
async fn test_notify_posts_signed_notification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header_exists("X-Signature-SHA256"))
        .and(body_partial_json(json!({
            "type": "notification",
            "user_id": 7,
            "reply_to": 3,
            "notification": {"kind": "lnurl_error", "host": "shop.example"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": 99})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(transport_config(format!("{}/chat", server.uri()))).unwrap();
    let sent = notifier
        .notify(
            7,
            Notification::LnurlError {
                host: "shop.example".to_string(),
                reason: "no balance".to_string(),
            },
            Some(3),
        )
        .await
        .unwrap();

    assert_eq!(sent, Some(99));
}

#[tokio::test]
async fn test_notify_retries_then_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(transport_config(server.uri())).unwrap();
    let sent = notifier.notify(1, Notification::Unsupported, None).await.unwrap();

    assert_eq!(sent, None);
}

#[tokio::test]
async fn test_pay_prompt_requires_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(transport_config(server.uri())).unwrap();
    let prompt = Notification::PayPrompt {
        domain: "shop.example".to_string(),
        text: "coffee".to_string(),
        image: None,
        fixed_amount: 0.0,
        min: 1.0,
        max: 100.0,
        usd: "~ USD".to_string(),
        input: PromptInput::AmountReply,
    };

    let err = notifier.notify(7, prompt, Some(3)).await.unwrap_err();
    assert!(err.to_string().contains("no message id"));
}

#[tokio::test]
async fn test_notify_without_transport_fails() {
    let notifier = WebhookNotifier::new(WebhookConfig::default()).unwrap();
    assert!(notifier.notify(1, Notification::Unsupported, None).await.is_err());
    assert!(notifier.retract(1, 5).await.is_err());
}
