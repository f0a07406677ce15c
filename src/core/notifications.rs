use serde::{Deserialize, Serialize};

use crate::lnurl::MetadataImage;

/// What the chat transport should offer under a pay prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptInput {
    /// Confirm/cancel buttons, the confirm button carrying the amount
    Confirm { amount_msat: u64 },
    /// Free-text amount reply to the prompt message
    AmountReply,
}

/// Messages the core asks the chat transport to deliver. Payloads are named
/// fields for the transport's templates; the core formats no display text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Error {
        err: String,
    },
    LnurlError {
        host: String,
        reason: String,
    },
    AuthSuccess {
        host: String,
        public_key: String,
    },
    /// Amounts are in satoshis
    PayPrompt {
        domain: String,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<MetadataImage>,
        fixed_amount: f64,
        min: f64,
        max: f64,
        usd: String,
        input: PromptInput,
    },
    Processing {
        invoice: String,
    },
    /// Raw metadata sent as a document so the payer can check it against
    /// the invoice's description hash
    PayMetadata {
        domain: String,
        lnurl: String,
        hash: String,
        hash_first_chars: String,
        file_name: String,
        content: String,
    },
    PaySuccess {
        domain: String,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        decipher_error: Option<String>,
    },
    Unsupported,
    QrCodeFailure {
        err: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::LnurlError { .. } => "lnurl_error",
            Self::AuthSuccess { .. } => "auth_success",
            Self::PayPrompt { .. } => "pay_prompt",
            Self::Processing { .. } => "processing",
            Self::PayMetadata { .. } => "pay_metadata",
            Self::PaySuccess { .. } => "pay_success",
            Self::Unsupported => "unsupported",
            Self::QrCodeFailure { .. } => "qr_code_failure",
        }
    }

    /// The user answers this message by replying to it, so delivery is only
    /// complete once the transport reports the message id
    pub fn expects_answer(&self) -> bool {
        matches!(self, Self::PayPrompt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(Notification::LnurlError {
            host: "shop.example".to_string(),
            reason: "no balance".to_string(),
        })
        .unwrap();
        assert_eq!(value["kind"], "lnurl_error");
        assert_eq!(value["host"], "shop.example");

        let value = serde_json::to_value(Notification::Unsupported).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "unsupported"}));
    }

    #[test]
    fn test_prompt_input_is_nested() {
        let value = serde_json::to_value(Notification::PayPrompt {
            domain: "shop.example".to_string(),
            text: "coffee".to_string(),
            image: None,
            fixed_amount: 1.0,
            min: 1.0,
            max: 1.0,
            usd: "~ USD".to_string(),
            input: PromptInput::Confirm { amount_msat: 1000 },
        })
        .unwrap();

        assert_eq!(value["input"]["type"], "confirm");
        assert_eq!(value["input"]["amount_msat"], 1000);
        assert!(value.get("image").is_none());
    }
}
