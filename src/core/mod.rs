pub mod cache;
pub mod flows;
pub mod ledger;
pub mod notifications;
pub mod services;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

pub use self::cache::MemoryReplyCache;
pub use self::ledger::{clearing_balance, ensure_balanced, LedgerEntry};
pub use self::notifications::{Notification, PromptInput};
use self::services::{DollarRate, PaymentBroker};
use crate::config::Config;
use crate::events::handlers::{LoggingEventHandler, MetricsEventHandler};
use crate::events::{EventBus, WalletEvent};
use crate::lnurl::LnurlClient;
use crate::types::{MessageId, UserId};
use crate::webhooks::WebhookNotifier;

/// Chat transport as seen from the flows
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification, optionally as a reply. Returns the id of the
    /// sent message when the transport reports one.
    async fn notify(
        &self,
        user: UserId,
        notification: Notification,
        reply_to: Option<MessageId>,
    ) -> anyhow::Result<Option<MessageId>>;

    /// Remove a previously sent message
    async fn retract(&self, user: UserId, message_id: MessageId) -> anyhow::Result<()>;
}

/// Invoice creation request passed to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeInvoiceArgs {
    pub msatoshi: u64,
    pub description: String,
    /// Server-set amounts (lnurl-withdraw) bypass the per-invoice cap
    pub ignore_invoice_size_limit: bool,
    pub skip_qr: bool,
    pub message_id: MessageId,
}

/// The user's wallet
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Returns the bolt11 invoice
    async fn make_invoice(&self, user: UserId, args: MakeInvoiceArgs) -> anyhow::Result<String>;

    /// Submit a payment. Returns its payment hash once the payment is in
    /// flight; completion arrives later through the payment broker.
    async fn pay_invoice(
        &self,
        user: UserId,
        bolt11: &str,
        reply_to: MessageId,
    ) -> anyhow::Result<String>;
}

/// Short-lived store used to resume a flow when the user answers a prompt
#[async_trait]
pub trait ReplyCache: Send + Sync {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Read access to the accounting system
#[async_trait]
pub trait Ledger: Send + Sync {
    /// All entries of `account`, read in a single transaction
    async fn clearing_entries(&self, account: &str) -> anyhow::Result<Vec<LedgerEntry>>;
}

/// Tunables of the flows
#[derive(Clone)]
pub struct FlowSettings {
    /// Input of the per-user lnurl-auth key derivation
    pub server_secret: String,
    pub clearing_account: String,
    pub pending_reply_ttl: Duration,
    /// Pause before the success notification so it lands last in the chat
    pub success_action_delay: Duration,
    pub confirmation_timeout: Duration,
}

impl fmt::Debug for FlowSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowSettings")
            .field("server_secret", &"[REDACTED]")
            .field("clearing_account", &self.clearing_account)
            .field("pending_reply_ttl", &self.pending_reply_ttl)
            .field("success_action_delay", &self.success_action_delay)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish()
    }
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_secret: config.server_secret.clone().unwrap_or_default(),
            clearing_account: config.clearing_account.clone(),
            pending_reply_ttl: config.pending_reply_ttl(),
            success_action_delay: config.success_action_delay(),
            confirmation_timeout: config.confirmation_timeout(),
        }
    }
}

/// External capabilities the core is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub wallet: Arc<dyn Wallet>,
    pub cache: Arc<dyn ReplyCache>,
    pub ledger: Arc<dyn Ledger>,
}

/// Main entry point for library consumers. Cheap to clone; clones share the
/// broker, rate cache and event bus.
#[derive(Clone)]
pub struct LnurlCore {
    pub client: LnurlClient,
    pub notifier: Arc<dyn Notifier>,
    pub wallet: Arc<dyn Wallet>,
    pub cache: Arc<dyn ReplyCache>,
    pub ledger: Arc<dyn Ledger>,
    pub broker: Arc<PaymentBroker>,
    pub rate: Arc<DollarRate>,
    pub event_bus: Arc<EventBus>,
    pub settings: FlowSettings,
    pub start_time: Instant,
}

impl LnurlCore {
    pub fn new(
        settings: FlowSettings,
        client: LnurlClient,
        rate: DollarRate,
        collaborators: Collaborators,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            client,
            notifier: collaborators.notifier,
            wallet: collaborators.wallet,
            cache: collaborators.cache,
            ledger: collaborators.ledger,
            broker: Arc::new(PaymentBroker::new()),
            rate: Arc::new(rate),
            event_bus,
            settings,
            start_time: Instant::now(),
        }
    }

    /// Get uptime since core was initialized
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Deliver a notification. Transport failures are logged, never
    /// reported back to the user through the same failing transport.
    pub(crate) async fn send(
        &self,
        user: UserId,
        notification: Notification,
        reply_to: Option<MessageId>,
    ) -> Option<MessageId> {
        let kind = notification.kind();
        match self.notifier.notify(user, notification, reply_to).await {
            Ok(message_id) => message_id,
            Err(e) => {
                warn!(user_id = user, kind, error = ?e, "Failed to deliver notification");
                None
            }
        }
    }

    /// Deliver a notification the user answers by replying to it. `None`
    /// means the answer could not be routed back; that is logged here and
    /// the user is not notified again.
    pub(crate) async fn send_prompt(
        &self,
        user: UserId,
        notification: Notification,
        reply_to: Option<MessageId>,
    ) -> Option<MessageId> {
        let kind = notification.kind();
        match self.notifier.notify(user, notification, reply_to).await {
            Ok(Some(message_id)) => Some(message_id),
            Ok(None) => {
                error!(
                    user_id = user,
                    kind, "Transport returned no message id, the answer cannot be matched"
                );
                None
            }
            Err(e) => {
                warn!(user_id = user, kind, error = ?e, "Failed to deliver notification");
                None
            }
        }
    }

    pub(crate) async fn track(&self, event: WalletEvent) {
        self.event_bus.publish(event).await;
    }
}

/// Event bus with the logging and metrics handlers, plus the webhook
/// forwarder when one is configured
pub async fn init_event_bus(webhooks: Option<Arc<WebhookNotifier>>) -> Arc<EventBus> {
    let event_bus = Arc::new(EventBus::new(1000));

    event_bus
        .register_handler(Arc::new(LoggingEventHandler::new(false)))
        .await;
    event_bus
        .register_handler(Arc::new(MetricsEventHandler::new("lnurld")))
        .await;

    if let Some(webhooks) = webhooks {
        event_bus.register_handler(webhooks).await;
        info!("Webhook notifier registered successfully");
    }

    info!("Event bus initialized with all handlers");
    event_bus
}
