// Common types used across the library and API

use serde::{Deserialize, Serialize};

/// Chat-side user identifier
pub type UserId = i64;

/// Chat-side message identifier, used to thread replies and resume prompts
pub type MessageId = i64;

pub const MSATS_PER_SAT: u64 = 1000;

/// Convert millisatoshis to (fractional) satoshis for display payloads
pub fn msats_to_sats(msats: u64) -> f64 {
    msats as f64 / MSATS_PER_SAT as f64
}

/// Options shared by every flow started from a single user action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleLnurlOpts {
    /// Message that triggered the flow; prompts and "unsupported" replies
    /// are threaded to it
    pub message_id: MessageId,
    /// Skip the success notification and tracking of lnurl-auth
    #[serde(default)]
    pub login_silently: bool,
    /// Pay fixed-amount offers below this threshold (msat) without asking
    #[serde(default)]
    pub pay_without_prompt_if: Option<u64>,
}

/// State kept in the reply cache between an lnurl-pay prompt and the user's
/// answer to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub metadata: String,
    pub url: String,
    pub lnurl: String,
}

impl PendingPayRequest {
    pub const KIND: &'static str = "lnurlpay";

    pub fn new(
        metadata: impl Into<String>,
        url: impl Into<String>,
        lnurl: impl Into<String>,
    ) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            metadata: metadata.into(),
            url: url.into(),
            lnurl: lnurl.into(),
        }
    }

    /// Cache key of the prompt `message_id` sent to `user`
    pub fn cache_key(user: UserId, message_id: MessageId) -> String {
        format!("reply:{}:{}", user, message_id)
    }
}
