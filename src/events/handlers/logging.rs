use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::events::{EventHandler, WalletEvent};
use crate::observability::sanitization::sanitize_preimage;

/// Event handler that logs all events with appropriate levels and sanitization
pub struct LoggingEventHandler {
    include_debug_events: bool,
}

impl LoggingEventHandler {
    pub fn new(include_debug_events: bool) -> Self {
        Self {
            include_debug_events,
        }
    }
}

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, event: WalletEvent) -> anyhow::Result<()> {
        match event {
            WalletEvent::LnurlAuth {
                user_id,
                domain,
                timestamp,
            } => {
                info!(
                    event_type = "lnurl_auth",
                    user_id,
                    domain = %domain,
                    timestamp = %timestamp,
                    "lnurl-auth login"
                );
            }
            WalletEvent::LnurlWithdraw {
                user_id,
                domain,
                amount_msat,
                timestamp,
            } => {
                info!(
                    event_type = "lnurl_withdraw",
                    user_id,
                    domain = %domain,
                    amount_msat,
                    timestamp = %timestamp,
                    "lnurl-withdraw invoice submitted"
                );
            }
            WalletEvent::LnurlPay {
                user_id,
                domain,
                fixed_sat,
                min_sat,
                max_sat,
                timestamp,
            } => {
                // Offers are opened far more often than paid
                if self.include_debug_events {
                    debug!(
                        event_type = "lnurl_pay",
                        user_id,
                        domain = %domain,
                        fixed_sat,
                        min_sat,
                        max_sat,
                        timestamp = %timestamp,
                        "lnurl-pay offer opened"
                    );
                }
            }
            WalletEvent::PaymentSubmitted {
                user_id,
                domain,
                payment_hash,
                amount_msat,
                timestamp,
            } => {
                info!(
                    event_type = "payment_submitted",
                    user_id,
                    domain = %domain,
                    payment_hash = %payment_hash,
                    amount_msat,
                    timestamp = %timestamp,
                    "lnurl-pay payment submitted"
                );
            }
            WalletEvent::PaymentConfirmed {
                user_id,
                domain,
                payment_hash,
                preimage,
                timestamp,
            } => {
                info!(
                    event_type = "payment_confirmed",
                    user_id,
                    domain = %domain,
                    payment_hash = %payment_hash,
                    preimage = %sanitize_preimage(&preimage),
                    timestamp = %timestamp,
                    "lnurl-pay payment confirmed"
                );
            }
            WalletEvent::LedgerInvariantViolated {
                account,
                balance,
                check_point,
                timestamp,
            } => {
                error!(
                    event_type = "ledger_invariant_violated",
                    account = %account,
                    balance,
                    check_point = %check_point,
                    timestamp = %timestamp,
                    "Clearing account does not net to zero"
                );
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }

    /// Logs are written before publish returns
    fn is_critical(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tracing_test::traced_test;

    use super::*;

    #[tokio::test]
    #[traced_test]
    async fn test_logging_handler_withdraw_event() {
        let handler = LoggingEventHandler::new(false);

        let event = WalletEvent::LnurlWithdraw {
            user_id: 42,
            domain: "faucet.example".to_string(),
            amount_msat: 150_000,
            timestamp: Utc::now(),
        };

        handler.handle(event).await.unwrap();

        assert!(logs_contain("lnurl-withdraw invoice submitted"));
        assert!(logs_contain("faucet.example"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_logging_handler_sanitizes_preimage() {
        let handler = LoggingEventHandler::new(false);
        let preimage = "a1b2c3d4e5f6789012345678901234567890123456789012345678901234abcd";

        let event = WalletEvent::PaymentConfirmed {
            user_id: 42,
            domain: "shop.example".to_string(),
            payment_hash: "00".repeat(32),
            preimage: preimage.to_string(),
            timestamp: Utc::now(),
        };

        handler.handle(event).await.unwrap();

        assert!(logs_contain("lnurl-pay payment confirmed"));
        assert!(!logs_contain(preimage));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_logging_handler_debug_events() {
        let handler = LoggingEventHandler::new(false);

        let event = WalletEvent::LnurlPay {
            user_id: 42,
            domain: "shop.example".to_string(),
            fixed_sat: 0,
            min_sat: 1,
            max_sat: 100,
            timestamp: Utc::now(),
        };

        handler.handle(event).await.unwrap();
        assert!(!logs_contain("lnurl-pay offer opened"));
    }

    #[test]
    fn test_logging_handler_is_critical() {
        assert!(LoggingEventHandler::new(false).is_critical());
    }
}
