//! LNURL wire types and the HTTP client that resolves them.

pub mod client;
pub mod codec;
pub mod invoice;
pub mod metadata;
pub mod success_action;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub use client::LnurlClient;
pub use codec::{
    decode_lnurl, encode_lnurl, find_lnurl_in_text, lightning_address_url, lnurl_to_url,
    normalize_lnurl,
};
pub use invoice::{metadata_hash, Invoice};
pub use metadata::{Metadata, MetadataImage};
pub use success_action::{ResolvedSuccessAction, SuccessAction};

use crate::error::AppError;

/// Parameters an LNURL resolves to. Exactly one handshake per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum LnurlParams {
    Auth(AuthParams),
    Withdraw(WithdrawParams),
    /// First stage of lnurl-pay: the offer
    Pay(PayParams),
    /// Second stage of lnurl-pay: the invoice for a chosen amount
    PayValues(PayValues),
}

impl LnurlParams {
    /// Parse a successful (non-`ERROR`) LNURL response body.
    ///
    /// Tags for handshakes this wallet does not implement yield an
    /// `Unsupported` error; bodies matching no handshake fail to decode.
    pub fn from_json(body: Value) -> Result<Self, AppError> {
        let tag = body.get("tag").and_then(Value::as_str).map(str::to_string);

        match tag.as_deref() {
            Some("withdrawRequest") => Ok(Self::Withdraw(serde_json::from_value(body)?)),
            Some("payRequest") => Ok(Self::Pay(serde_json::from_value(body)?)),
            Some(tag @ ("channelRequest" | "hostedChannelRequest" | "login")) => Err(
                AppError::unsupported(format!("lnurl '{}' responses are not supported", tag)),
            ),
            Some(other) => Err(AppError::invalid_lnurl(format!(
                "unknown lnurl tag '{}'",
                other
            ))),
            None if body.get("pr").is_some() => Ok(Self::PayValues(serde_json::from_value(body)?)),
            None => Err(AppError::invalid_lnurl(
                "lnurl response matches no known handshake",
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "login",
            Self::Withdraw(_) => "withdrawRequest",
            Self::Pay(_) => "payRequest",
            Self::PayValues(_) => "payValues",
        }
    }
}

/// lnurl-auth (LUD-04). Carried entirely in the LNURL query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParams {
    pub host: String,
    /// 32-byte challenge, hex
    pub k1: String,
    pub callback: Url,
    /// LUD-04 `action` hint: register, login, link or auth
    pub action: Option<String>,
}

impl AuthParams {
    /// Recognize an auth LNURL (`tag=login`) without any network round-trip
    pub fn from_url(url: &Url) -> Option<Result<Self, AppError>> {
        let is_login = url.query_pairs().any(|(k, v)| k == "tag" && v == "login");
        if !is_login {
            return None;
        }

        let k1 = url
            .query_pairs()
            .find(|(k, _)| k == "k1")
            .map(|(_, v)| v.into_owned());
        let action = url
            .query_pairs()
            .find(|(k, _)| k == "action")
            .map(|(_, v)| v.into_owned());

        Some(match (k1, url.host_str()) {
            (Some(k1), Some(host)) => Ok(Self {
                host: host.to_string(),
                k1,
                callback: url.clone(),
                action,
            }),
            (None, _) => Err(AppError::invalid_lnurl("lnurl-auth without k1")),
            (_, None) => Err(AppError::invalid_lnurl("lnurl-auth without host")),
        })
    }
}

/// lnurl-withdraw (LUD-03)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawParams {
    pub callback: Url,
    pub k1: String,
    pub max_withdrawable: u64,
    #[serde(default)]
    pub min_withdrawable: u64,
    #[serde(default)]
    pub default_description: String,
}

impl WithdrawParams {
    pub fn host(&self) -> String {
        host_of(&self.callback)
    }
}

/// lnurl-pay offer (LUD-06)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayParams {
    pub callback: Url,
    pub min_sendable: u64,
    pub max_sendable: u64,
    /// Metadata exactly as received; its SHA-256 is what invoices commit to
    #[serde(rename = "metadata")]
    pub encoded_metadata: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_allowed: Option<u64>,
}

impl PayParams {
    /// The amount when min and max agree, 0 for variable-amount offers
    pub fn fixed_amount(&self) -> u64 {
        if self.min_sendable == self.max_sendable {
            self.max_sendable
        } else {
            0
        }
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::parse(&self.encoded_metadata)
    }

    pub fn domain(&self) -> String {
        host_of(&self.callback)
    }
}

/// Callback answer of lnurl-pay, carrying the invoice for the chosen amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayValues {
    pub pr: String,
    #[serde(default)]
    pub success_action: Option<SuccessAction>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub(crate) fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or("<unknown>").to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_parse_withdraw_request() {
        let params = LnurlParams::from_json(json!({
            "tag": "withdrawRequest",
            "callback": "https://faucet.example/withdraw",
            "k1": "abc",
            "maxWithdrawable": 50000,
            "minWithdrawable": 1000,
            "defaultDescription": "faucet"
        }))
        .unwrap();

        match params {
            LnurlParams::Withdraw(w) => {
                assert_eq!(w.max_withdrawable, 50_000);
                assert_eq!(w.default_description, "faucet");
                assert_eq!(w.host(), "faucet.example");
            }
            other => panic!("unexpected params {:?}", other),
        }
    }

    #[test]
    fn test_parse_pay_request_keeps_metadata_verbatim() {
        let metadata = r#"[["text/plain", "coffee"]]"#;
        let params = LnurlParams::from_json(json!({
            "tag": "payRequest",
            "callback": "https://shop.example/cb",
            "minSendable": 1000,
            "maxSendable": 1000,
            "metadata": metadata
        }))
        .unwrap();

        match params {
            LnurlParams::Pay(p) => {
                assert_eq!(p.encoded_metadata, metadata);
                assert_eq!(p.fixed_amount(), 1000);
                assert_eq!(p.domain(), "shop.example");
            }
            other => panic!("unexpected params {:?}", other),
        }
    }

    #[test]
    fn test_variable_offer_has_no_fixed_amount() {
        let params = PayParams {
            callback: Url::parse("https://shop.example/cb").unwrap(),
            min_sendable: 1000,
            max_sendable: 2000,
            encoded_metadata: "[]".to_string(),
            comment_allowed: None,
        };
        assert_eq!(params.fixed_amount(), 0);
    }

    #[test]
    fn test_parse_pay_values() {
        let params = LnurlParams::from_json(json!({
            "pr": "lnbc1...",
            "successAction": {"tag": "message", "message": "thanks"},
            "routes": []
        }))
        .unwrap();
        assert_eq!(params.kind(), "payValues");
    }

    #[test]
    fn test_unsupported_and_unknown_payloads() {
        let err = LnurlParams::from_json(json!({"tag": "channelRequest", "uri": "x"})).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Unsupported);

        let err = LnurlParams::from_json(json!({"tag": "somethingNew"})).unwrap_err();
        assert_eq!(err.category, ErrorCategory::InvalidLnurl);

        let err = LnurlParams::from_json(json!({"hello": "world"})).unwrap_err();
        assert_eq!(err.category, ErrorCategory::InvalidLnurl);

        // Missing required fields fail decode rather than populate a variant
        let err = LnurlParams::from_json(json!({"tag": "payRequest"})).unwrap_err();
        assert_eq!(err.category, ErrorCategory::ValidationError);
    }

    #[test]
    fn test_auth_from_url() {
        let url = Url::parse(
            "https://site.example/auth?tag=login&k1=e2af6254a8df433264fa23f67eb8188635d15ce883e8fc020989d5f82ae6f11e&action=login",
        )
        .unwrap();

        let auth = AuthParams::from_url(&url).unwrap().unwrap();
        assert_eq!(auth.host, "site.example");
        assert_eq!(auth.action.as_deref(), Some("login"));
        assert_eq!(auth.callback, url);

        let not_auth = Url::parse("https://site.example/pay").unwrap();
        assert!(AuthParams::from_url(&not_auth).is_none());

        let no_k1 = Url::parse("https://site.example/auth?tag=login").unwrap();
        assert!(AuthParams::from_url(&no_k1).unwrap().is_err());
    }
}
