use std::fmt;

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

pub mod categories;

pub use categories::ErrorCategory;

use crate::types::MessageId;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

/// A `{status: "ERROR", reason}` answer from an LNURL server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LnurlRejection {
    pub host: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub rejection: Option<LnurlRejection>,
    /// Chat message the user-facing report of this error should reply to
    pub reply_to: Option<MessageId>,
}

impl AppError {
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn replying_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    // Convenience constructors for common error types
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::ValidationError, message)
    }

    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::AuthenticationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::NotFound, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::Unsupported, message)
    }

    pub fn invalid_lnurl(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InvalidLnurl, message)
    }

    pub fn lnurl_rejected(host: impl Into<String>, reason: impl Into<String>) -> Self {
        let rejection = LnurlRejection {
            host: host.into(),
            reason: reason.into(),
        };
        let mut err = Self::with_category(
            ErrorCategory::LnurlRejected,
            format!("{} returned an error: {}", rejection.host, rejection.reason),
        );
        err.rejection = Some(rejection);
        err
    }

    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::ProtocolViolation, message)
    }

    pub fn decrypt_failed(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::DecryptFailed, message)
    }

    pub fn payment_failed(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::PaymentFailed, message)
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::NetworkError, message)
    }

    pub fn ledger_invariant(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::LedgerInvariant, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InternalError, message)
    }

    pub fn with_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            details: None,
            source: None,
            rejection: None,
            reply_to: None,
        }
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.category.status_code();

        if status.is_server_error() {
            error!(
                category = ?self.category,
                code = self.category.error_code(),
                message = %self.message,
                details = ?self.details,
                source = ?self.source,
                "Internal server error"
            );
        } else if status.is_client_error() {
            warn!(
                category = ?self.category,
                code = self.category.error_code(),
                message = %self.message,
                details = ?self.details,
                "Client error"
            );
        }

        let body = json!({
            "error": {
                "code": self.category.error_code(),
                "message": self.message,
                "details": self.details,
                "rejection": self.rejection,
            }
        });

        (status, Json(body)).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// Collaborator failures arrive as anyhow errors; their chain is already in
// the string representation
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal_error(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation_error(format!("JSON parsing error: {}", err)).with_source(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        Self::network_error(message).with_source(err)
    }
}
