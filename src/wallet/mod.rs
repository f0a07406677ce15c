//! Client of the wallet backend's REST API: invoices, payments and the
//! ledger entries behind the clearing-account check.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Ledger, LedgerEntry, MakeInvoiceArgs, Wallet};
use crate::observability::sanitize_invoice;
use crate::types::{MessageId, UserId};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceRequest<'a> {
    user_id: UserId,
    #[serde(flatten)]
    args: &'a MakeInvoiceArgs,
}

#[derive(Debug, Deserialize)]
struct InvoiceResponse {
    bolt11: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequest<'a> {
    user_id: UserId,
    bolt11: &'a str,
    message_id: MessageId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    payment_hash: String,
}

#[derive(Debug, Deserialize)]
struct EntriesResponse {
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone)]
pub struct HttpWallet {
    client: Client,
    base_url: String,
}

impl HttpWallet {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("wallet backend unreachable ({})", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed with status {}: {}", what, status, body));
        }

        response
            .json()
            .await
            .with_context(|| format!("invalid {} response", what))
    }
}

#[async_trait]
impl Wallet for HttpWallet {
    async fn make_invoice(&self, user: UserId, args: MakeInvoiceArgs) -> Result<String> {
        let request = self.client.post(self.url("/v1/invoices")).json(&InvoiceRequest {
            user_id: user,
            args: &args,
        });

        let response: InvoiceResponse = self.send(request, "invoice creation").await?;
        debug!(
            user_id = user,
            bolt11 = %sanitize_invoice(&response.bolt11),
            "Wallet created invoice"
        );
        Ok(response.bolt11)
    }

    async fn pay_invoice(&self, user: UserId, bolt11: &str, reply_to: MessageId) -> Result<String> {
        let request = self.client.post(self.url("/v1/payments")).json(&PaymentRequest {
            user_id: user,
            bolt11,
            message_id: reply_to,
        });

        let response: PaymentResponse = self.send(request, "payment").await?;
        Ok(response.payment_hash)
    }
}

#[async_trait]
impl Ledger for HttpWallet {
    async fn clearing_entries(&self, account: &str) -> Result<Vec<LedgerEntry>> {
        let request = self
            .client
            .get(self.url(&format!("/v1/accounts/{}/entries", account)));

        let response: EntriesResponse = self.send(request, "ledger snapshot").await?;
        Ok(response.entries)
    }
}
