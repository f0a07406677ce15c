use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::debug;

use crate::events::{EventHandler, WalletEvent};
use crate::metrics::{
    EVENT_BUS_EVENTS_TOTAL, LEDGER_INVARIANT_VIOLATIONS_TOTAL, LNURL_FLOWS_TOTAL,
    PAYMENTS_TOTAL, PAYMENT_AMOUNT_MSAT, WITHDRAW_AMOUNT_MSAT,
};

/// Event handler that collects metrics from events for Prometheus export
pub struct MetricsEventHandler {
    service_name: String,
}

impl MetricsEventHandler {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn record_flow(&self, flow: &'static str, domain: &str) {
        counter!(LNURL_FLOWS_TOTAL, "flow" => flow, "domain" => domain.to_string()).increment(1);
    }
}

#[async_trait]
impl EventHandler for MetricsEventHandler {
    async fn handle(&self, event: WalletEvent) -> anyhow::Result<()> {
        let event_type = event.event_type();

        match &event {
            WalletEvent::LnurlAuth { domain, .. } => self.record_flow("auth", domain),
            WalletEvent::LnurlWithdraw {
                domain,
                amount_msat,
                ..
            } => {
                self.record_flow("withdraw", domain);
                histogram!(WITHDRAW_AMOUNT_MSAT).record(*amount_msat as f64);
            }
            WalletEvent::LnurlPay { domain, .. } => self.record_flow("pay", domain),
            WalletEvent::PaymentSubmitted { amount_msat, .. } => {
                counter!(PAYMENTS_TOTAL, "status" => "submitted").increment(1);
                histogram!(PAYMENT_AMOUNT_MSAT).record(*amount_msat as f64);
            }
            WalletEvent::PaymentConfirmed { .. } => {
                counter!(PAYMENTS_TOTAL, "status" => "confirmed").increment(1);
            }
            WalletEvent::LedgerInvariantViolated { account, .. } => {
                counter!(LEDGER_INVARIANT_VIOLATIONS_TOTAL, "account" => account.clone())
                    .increment(1);
            }
        }

        counter!(
            EVENT_BUS_EVENTS_TOTAL,
            "event_type" => event_type,
            "service" => self.service_name.clone()
        )
        .increment(1);

        debug!(event_type, "Recorded event metrics");
        Ok(())
    }

    fn name(&self) -> &str {
        "metrics"
    }
}
