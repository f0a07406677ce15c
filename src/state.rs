use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::info;

use crate::config::Config;
use crate::core::services::DollarRate;
use crate::core::{init_event_bus, Collaborators, FlowSettings, LnurlCore, MemoryReplyCache};
use crate::lnurl::LnurlClient;
use crate::wallet::HttpWallet;
use crate::webhooks::WebhookNotifier;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<LnurlCore>,
}

impl AppState {
    pub fn new_with_core(core: LnurlCore) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Wire the daemon's production collaborators: the wallet backend over
    /// REST, the chat transport and event webhooks, and an in-memory reply
    /// cache.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.http_timeout();

        let wallet = Arc::new(HttpWallet::new(&config.wallet_url, timeout)?);
        let webhooks = Arc::new(WebhookNotifier::new(config.webhooks.clone())?);

        let event_bus = if config.webhooks.has_event_endpoints() {
            init_event_bus(Some(webhooks.clone())).await
        } else {
            init_event_bus(None).await
        };

        let rate_http = Client::builder()
            .timeout(timeout.min(Duration::from_secs(10)))
            .build()?;
        let rate = DollarRate::new(
            rate_http,
            &config.rate_source_url,
            config.rate_refresh_interval(),
        );

        let collaborators = Collaborators {
            notifier: webhooks,
            wallet: wallet.clone(),
            cache: Arc::new(MemoryReplyCache::new()),
            ledger: wallet,
        };

        let core = LnurlCore::new(
            FlowSettings::from_config(config),
            LnurlClient::new(timeout)?,
            rate,
            collaborators,
            event_bus,
        );

        info!(
            wallet_url = %config.wallet_url,
            clearing_account = %config.clearing_account,
            "LNURL core initialized"
        );
        Ok(Self::new_with_core(core))
    }

    pub fn uptime(&self) -> Duration {
        self.core.uptime()
    }
}
