use anyhow::anyhow;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::*;

#[test]
fn test_app_error_from_anyhow() {
    let app_error = AppError::from(anyhow!("wallet backend down").context("making invoice"));
    assert_eq!(app_error.category, ErrorCategory::InternalError);
    assert!(app_error.message.contains("making invoice"));
    assert!(app_error.message.contains("wallet backend down"));
}

#[test]
fn test_lnurl_rejected_carries_host_and_reason() {
    let error = AppError::lnurl_rejected("shop.example", "no balance");
    assert_eq!(error.category, ErrorCategory::LnurlRejected);

    let rejection = error.rejection.as_ref().unwrap();
    assert_eq!(rejection.host, "shop.example");
    assert_eq!(rejection.reason, "no balance");
    assert!(format!("{}", error).contains("no balance"));
}

#[test]
fn test_replying_to_pins_message() {
    let error = AppError::payment_failed("route not found").replying_to(55);
    assert_eq!(error.reply_to, Some(55));
    assert!(error.rejection.is_none());
}

#[test]
fn test_app_error_display() {
    let error = AppError::protocol_violation("Got invoice with wrong amount.");
    let display_string = format!("{}", error);
    assert!(display_string.starts_with("PROTOCOL_VIOLATION"));
    assert!(display_string.contains("wrong amount"));
}

#[test]
fn test_app_error_into_response() {
    let response = AppError::not_found("prompt expired").into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = AppError::ledger_invariant("proxy balance isn't 0").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
