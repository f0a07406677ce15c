use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{codec, host_of, AuthParams, LnurlParams, PayValues};
use crate::error::AppError;

/// HTTP side of the LNURL handshakes. Every request is a GET whose JSON
/// answer is either the flow-specific payload or `{status: "ERROR", reason}`.
#[derive(Debug, Clone)]
pub struct LnurlClient {
    http: Client,
}

impl LnurlClient {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lnurld/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http })
    }

    /// Resolve LNURL text to its parameters. Auth LNURLs are recognized from
    /// the URL alone; everything else costs exactly one GET.
    #[instrument(skip(self), fields(host = tracing::field::Empty))]
    pub async fn resolve(&self, text: &str) -> Result<LnurlParams, AppError> {
        let url = codec::lnurl_to_url(text)?;
        tracing::Span::current().record("host", url.host_str().unwrap_or_default());

        if let Some(auth) = AuthParams::from_url(&url) {
            return auth.map(LnurlParams::Auth);
        }

        let body = self.get_json(&url, &[], "lnurl endpoint").await?;
        let params = LnurlParams::from_json(body)?;

        debug!(kind = params.kind(), "Resolved lnurl params");
        Ok(params)
    }

    /// GET a handshake callback with extra query parameters
    pub async fn callback(
        &self,
        callback: &Url,
        query: &[(&str, String)],
    ) -> Result<Value, AppError> {
        self.get_json(callback, query, "callback").await
    }

    /// Second stage of lnurl-pay: ask the callback for an invoice of
    /// `amount_msat`
    #[instrument(skip(self, callback), fields(host = %host_of(callback)))]
    pub async fn fetch_invoice(
        &self,
        callback: &Url,
        amount_msat: u64,
    ) -> Result<PayValues, AppError> {
        let body = self
            .callback(callback, &[("amount", amount_msat.to_string())])
            .await?;

        Ok(serde_json::from_value(body)?)
    }

    async fn get_json(
        &self,
        url: &Url,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<Value, AppError> {
        let response = self.http.get(url.clone()).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network_error(format!(
                "Got status {} on {} {}",
                status.as_u16(),
                what,
                url
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::network_error(format!("invalid JSON from {}: {}", host_of(url), e))
        })?;

        if is_error_status(&body) {
            let reason = body
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(AppError::lnurl_rejected(host_of(url), reason));
        }

        Ok(body)
    }
}

fn is_error_status(body: &Value) -> bool {
    body.get("status")
        .and_then(Value::as_str)
        .map_or(false, |status| status.eq_ignore_ascii_case("ERROR"))
}
