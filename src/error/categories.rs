use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    // Client errors
    ValidationError,
    AuthenticationError,
    NotFound,
    Unsupported,

    // LNURL errors
    InvalidLnurl,
    LnurlRejected,
    ProtocolViolation,
    DecryptFailed,

    // Payment errors
    PaymentFailed,

    // System errors
    NetworkError,
    LedgerInvariant,
    InternalError,
}

impl ErrorCategory {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError | Self::InvalidLnurl => StatusCode::BAD_REQUEST,
            Self::AuthenticationError => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unsupported | Self::DecryptFailed => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentFailed => StatusCode::PAYMENT_REQUIRED,
            Self::LnurlRejected | Self::ProtocolViolation | Self::NetworkError => {
                StatusCode::BAD_GATEWAY
            }
            Self::LedgerInvariant | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AuthenticationError => "AUTH_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::Unsupported => "LNURL_UNSUPPORTED",
            Self::InvalidLnurl => "INVALID_LNURL",
            Self::LnurlRejected => "LNURL_REJECTED",
            Self::ProtocolViolation => "PROTOCOL_VIOLATION",
            Self::DecryptFailed => "DECRYPT_FAILED",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::LedgerInvariant => "LEDGER_INVARIANT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError
                | Self::AuthenticationError
                | Self::NotFound
                | Self::Unsupported
                | Self::InvalidLnurl
                | Self::DecryptFailed
                | Self::PaymentFailed
        )
    }

    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Errors that signal a defect in the accounting system rather than a
    /// failed user action
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LedgerInvariant)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_code())
    }
}
