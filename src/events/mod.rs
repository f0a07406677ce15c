use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::types::UserId;

pub mod handlers;

/// Tracking events emitted by the LNURL flows and the settlement pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletEvent {
    LnurlAuth {
        user_id: UserId,
        domain: String,
        timestamp: DateTime<Utc>,
    },
    LnurlWithdraw {
        user_id: UserId,
        domain: String,
        amount_msat: u64,
        timestamp: DateTime<Utc>,
    },
    /// A pay offer was opened; amounts are whole satoshis, `fixed_sat` is 0
    /// for variable offers
    LnurlPay {
        user_id: UserId,
        domain: String,
        fixed_sat: u64,
        min_sat: u64,
        max_sat: u64,
        timestamp: DateTime<Utc>,
    },
    PaymentSubmitted {
        user_id: UserId,
        domain: String,
        payment_hash: String,
        amount_msat: u64,
        timestamp: DateTime<Utc>,
    },
    PaymentConfirmed {
        user_id: UserId,
        domain: String,
        payment_hash: String,
        preimage: String,
        timestamp: DateTime<Utc>,
    },
    LedgerInvariantViolated {
        account: String,
        balance: i64,
        check_point: String,
        timestamp: DateTime<Utc>,
    },
}

impl WalletEvent {
    /// Generate a unique event ID
    pub fn event_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WalletEvent::LnurlAuth { timestamp, .. }
            | WalletEvent::LnurlWithdraw { timestamp, .. }
            | WalletEvent::LnurlPay { timestamp, .. }
            | WalletEvent::PaymentSubmitted { timestamp, .. }
            | WalletEvent::PaymentConfirmed { timestamp, .. }
            | WalletEvent::LedgerInvariantViolated { timestamp, .. } => *timestamp,
        }
    }

    /// User the event is about; ledger alerts belong to no user
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            WalletEvent::LnurlAuth { user_id, .. }
            | WalletEvent::LnurlWithdraw { user_id, .. }
            | WalletEvent::LnurlPay { user_id, .. }
            | WalletEvent::PaymentSubmitted { user_id, .. }
            | WalletEvent::PaymentConfirmed { user_id, .. } => Some(*user_id),
            WalletEvent::LedgerInvariantViolated { .. } => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            WalletEvent::LnurlAuth { .. } => "lnurl_auth",
            WalletEvent::LnurlWithdraw { .. } => "lnurl_withdraw",
            WalletEvent::LnurlPay { .. } => "lnurl_pay",
            WalletEvent::PaymentSubmitted { .. } => "payment_submitted",
            WalletEvent::PaymentConfirmed { .. } => "payment_confirmed",
            WalletEvent::LedgerInvariantViolated { .. } => "ledger_invariant_violated",
        }
    }
}

/// Trait for handling events asynchronously
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: WalletEvent) -> anyhow::Result<()>;

    /// Get the name of this handler for identification
    fn name(&self) -> &str;

    /// Critical handlers are awaited by `publish`, the rest run detached
    fn is_critical(&self) -> bool {
        false
    }
}

/// Event bus for distributing events to multiple handlers
pub struct EventBus {
    sender: broadcast::Sender<WalletEvent>,
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    max_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("max_capacity", &self.max_capacity)
            .field(
                "handlers_count",
                &self.handlers.try_read().map(|h| h.len()).unwrap_or(0),
            )
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            handlers: Arc::new(RwLock::new(Vec::new())),
            max_capacity: capacity,
        }
    }

    pub async fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        let handler_name = handler.name().to_string();
        handlers.push(handler);
        info!(
            handler_name = %handler_name,
            total_handlers = handlers.len(),
            "Event handler registered"
        );
    }

    /// Publish an event to subscribers and all registered handlers. Handler
    /// failures are logged and never returned.
    pub async fn publish(&self, event: WalletEvent) {
        let event_id = event.event_id();
        let event_type = event.event_type();

        debug!(
            event_id = %event_id,
            event_type = %event_type,
            user_id = ?event.user_id(),
            "Publishing event"
        );

        // No subscribers is not an error
        if let Ok(subscriber_count) = self.sender.send(event.clone()) {
            debug!(
                event_id = %event_id,
                subscriber_count,
                "Event broadcast to subscribers"
            );
        }

        let handlers = self.handlers.read().await;
        let mut critical = Vec::new();

        for handler in handlers.iter() {
            let is_critical = handler.is_critical();
            let run = run_handler(handler.clone(), event.clone(), event_id.clone());

            if is_critical {
                critical.push(run);
            } else {
                tokio::spawn(run);
            }
        }

        for run in critical {
            run.await;
        }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.sender.subscribe()
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

async fn run_handler(handler: Arc<dyn EventHandler>, event: WalletEvent, event_id: String) {
    match handler.handle(event).await {
        Ok(()) => {
            debug!(
                event_id = %event_id,
                handler_name = %handler.name(),
                "Event handler completed"
            );
        }
        Err(e) => {
            error!(
                event_id = %event_id,
                handler_name = %handler.name(),
                error = ?e,
                "Event handler failed"
            );
        }
    }
}
