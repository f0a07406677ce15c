use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::FlowOutcome;
use crate::core::services::PaymentWaiter;
use crate::core::{LnurlCore, Notification};
use crate::error::AppError;
use crate::events::WalletEvent;
use crate::lnurl::{host_of, normalize_lnurl, Invoice, SuccessAction};
use crate::observability::{sanitize_payment_hash, sanitize_preimage};
use crate::types::{MessageId, UserId};

/// A confirmed lnurl-pay amount, ready to be invoiced and paid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaySettlement {
    pub user: UserId,
    pub amount_msat: u64,
    pub callback: Url,
    /// Offer metadata exactly as received
    pub metadata: String,
    /// LNURL text the flow started from
    pub lnurl: String,
    /// Message the outcome replies to
    pub reply_to: MessageId,
}

/// Everything the confirmation task needs once the payment is in flight
struct Confirmation {
    user: UserId,
    domain: String,
    lnurl: String,
    metadata: String,
    payment_hash: String,
    success_action: Option<SuccessAction>,
    reply_to: MessageId,
    waiter: PaymentWaiter,
}

impl LnurlCore {
    /// Second stage of lnurl-pay. Returns once the payment is submitted;
    /// confirmation is awaited and reported in the background. Failures are
    /// left to the calling entry point to report.
    #[instrument(
        skip(self, settlement),
        fields(
            user_id = settlement.user,
            amount_msat = settlement.amount_msat,
            host = %host_of(&settlement.callback)
        )
    )]
    pub(crate) async fn settle(&self, settlement: PaySettlement) -> Result<FlowOutcome, AppError> {
        let PaySettlement {
            user,
            amount_msat,
            callback,
            metadata,
            lnurl,
            reply_to,
        } = settlement;

        // Display only, a non-encodable LNURL is shown as given
        let lnurl = normalize_lnurl(&lnurl).unwrap_or(lnurl);

        let values = self.client.fetch_invoice(&callback, amount_msat).await?;
        let invoice = Invoice::decode(&values.pr)?;
        invoice.validate_against(&metadata, amount_msat)?;

        self.check_ledger("before_payment").await?;

        let processing = self
            .send(
                user,
                Notification::Processing {
                    invoice: invoice.bolt11.clone(),
                },
                None,
            )
            .await;

        // Registered before submission so an instantly settled payment is
        // not missed
        let mut waiter = self.broker.wait_for_payment(&invoice.payment_hash);

        let payment_hash = match self.wallet.pay_invoice(user, &invoice.bolt11, reply_to).await {
            Ok(payment_hash) => payment_hash,
            Err(e) => {
                self.broker.discard(waiter);
                let err = AppError::payment_failed(format!("{:#}", e));
                return Err(match processing {
                    Some(message_id) => err.replying_to(message_id),
                    None => err,
                });
            }
        };

        if !payment_hash.eq_ignore_ascii_case(&invoice.payment_hash) {
            warn!(
                invoice_hash = %sanitize_payment_hash(&invoice.payment_hash),
                wallet_hash = %sanitize_payment_hash(&payment_hash),
                "Wallet reported a different payment hash than the invoice"
            );
            self.broker.discard(waiter);
            waiter = self.broker.wait_for_payment(&payment_hash.to_ascii_lowercase());
        }

        if let Some(message_id) = processing {
            if let Err(e) = self.notifier.retract(user, message_id).await {
                warn!(
                    user_id = user,
                    message_id,
                    error = ?e,
                    "Failed to retract processing message"
                );
            }
        }

        let domain = host_of(&callback);
        info!(
            user_id = user,
            domain = %domain,
            payment_hash = %sanitize_payment_hash(&payment_hash),
            amount_msat,
            "Lnurl-pay payment submitted"
        );

        self.track(WalletEvent::PaymentSubmitted {
            user_id: user,
            domain: domain.clone(),
            payment_hash: payment_hash.clone(),
            amount_msat,
            timestamp: Utc::now(),
        })
        .await;

        let confirmation = Confirmation {
            user,
            domain,
            lnurl,
            metadata,
            payment_hash: invoice.payment_hash,
            success_action: values.success_action,
            reply_to,
            waiter,
        };
        let core = self.clone();
        tokio::spawn(async move { core.await_confirmation(confirmation).await });

        Ok(FlowOutcome::PaymentSubmitted {
            payment_hash,
            amount_msat,
        })
    }

    async fn await_confirmation(&self, confirmation: Confirmation) {
        let Confirmation {
            user,
            domain,
            lnurl,
            metadata,
            payment_hash,
            success_action,
            reply_to,
            waiter,
        } = confirmation;

        let preimage_hex = match waiter.wait_timeout(self.settings.confirmation_timeout).await {
            Ok(preimage) => preimage,
            Err(e) => {
                // The wallet reports failed payments itself
                warn!(
                    user_id = user,
                    error = %e,
                    "Gave up waiting for lnurl-pay confirmation"
                );
                return;
            }
        };

        let preimage = hex::decode(&preimage_hex).unwrap_or_else(|e| {
            warn!(error = %e, "Payment preimage is not hex");
            Vec::new()
        });

        self.send(
            user,
            Notification::PayMetadata {
                domain: domain.clone(),
                lnurl: lnurl.clone(),
                hash: payment_hash.clone(),
                hash_first_chars: payment_hash.get(..5).unwrap_or(&payment_hash).to_string(),
                file_name: format!("{}.json", lnurl),
                content: metadata,
            },
            None,
        )
        .await;

        if let Some(action) = success_action {
            let resolved = action.resolve(&preimage);
            if let Some(err) = &resolved.decipher_error {
                warn!(user_id = user, error = %err, "Failed to decipher success action");
            }

            tokio::time::sleep(self.settings.success_action_delay).await;

            self.send(
                user,
                Notification::PaySuccess {
                    domain: domain.clone(),
                    text: resolved.text,
                    url: resolved.url,
                    decipher_error: resolved.decipher_error,
                },
                Some(reply_to),
            )
            .await;
        }

        // Already logged and alerted inside; the payment itself went through
        let _ = self.check_ledger("after_payment").await;

        self.track(WalletEvent::PaymentConfirmed {
            user_id: user,
            domain,
            payment_hash,
            preimage: preimage_hex,
            timestamp: Utc::now(),
        })
        .await;
    }

    /// Completion hook of the payment engine: hand `preimage` to everyone
    /// waiting on `payment_hash`. The preimage must hash to the payment hash.
    pub fn resolve_payment(&self, payment_hash: &str, preimage: &str) -> Result<usize, AppError> {
        let bytes = hex::decode(preimage)
            .map_err(|e| AppError::validation_error(format!("preimage is not hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(AppError::validation_error("preimage must be 32 bytes"));
        }

        let expected = hex::encode(Sha256::digest(&bytes));
        if !expected.eq_ignore_ascii_case(payment_hash) {
            return Err(AppError::validation_error(
                "preimage does not match payment hash",
            ));
        }

        debug!(
            payment_hash = %sanitize_payment_hash(payment_hash),
            preimage = %sanitize_preimage(preimage),
            "Resolving payment"
        );
        Ok(self.broker.resolve_payment(
            &payment_hash.to_ascii_lowercase(),
            &preimage.to_ascii_lowercase(),
        ))
    }
}
