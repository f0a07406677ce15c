//! The LNURL handshakes, from raw user text to user notifications.
//!
//! Public entry points report their own failures: every error ends in exactly
//! one notification to the user and is then returned to the caller for its
//! own bookkeeping.

pub mod auth;
pub mod pay;
pub mod settle;
pub mod withdraw;

use serde::Serialize;
use tracing::{info, instrument, warn};

pub use self::auth::{derive_auth_key, sign_challenge};
pub use self::pay::{should_pay_without_prompt, FAST_PATH_GRACE_MSAT};
pub use self::settle::PaySettlement;
use super::{LnurlCore, Notification};
use crate::error::{AppError, ErrorCategory};
use crate::lnurl::{find_lnurl_in_text, LnurlParams};
use crate::types::{HandleLnurlOpts, MessageId, UserId};

const LEDGER_USER_MESSAGE: &str = "payment aborted by an internal consistency check";

/// What a flow did, for the caller's records. The user has already been told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlowOutcome {
    Authenticated {
        host: String,
        public_key: String,
    },
    Withdrawn {
        host: String,
        amount_msat: u64,
    },
    /// A pay prompt is waiting for the user's answer
    Prompted {
        prompt_message_id: MessageId,
    },
    /// The pay prompt could not be delivered with a message id to answer
    /// to; nothing was stored and nothing more was sent
    PromptUndelivered,
    /// Payment is in flight; confirmation is reported asynchronously
    PaymentSubmitted {
        payment_hash: String,
        amount_msat: u64,
    },
    /// The text carried no LNURL
    NoLnurl,
}

impl LnurlCore {
    /// Resolve `text` and run the handshake it designates
    #[instrument(skip(self, text, opts), fields(user_id = user, message_id = opts.message_id))]
    pub async fn handle_lnurl(
        &self,
        user: UserId,
        text: &str,
        opts: HandleLnurlOpts,
    ) -> Result<FlowOutcome, AppError> {
        let result = self.dispatch(user, text, &opts).await;
        self.report_failure(user, result).await
    }

    /// Look for an LNURL in a chat message or decoded QR code and handle it.
    /// Plain messages without one are ignored; QR codes without one are a
    /// reported failure.
    pub async fn handle_text(
        &self,
        user: UserId,
        text: &str,
        from_qr: bool,
        opts: HandleLnurlOpts,
    ) -> Result<FlowOutcome, AppError> {
        match find_lnurl_in_text(text) {
            Some(lnurl) => self.handle_lnurl(user, &lnurl, opts).await,
            None if from_qr => {
                let err = "no lnurl found in qr code";
                self.send(
                    user,
                    Notification::QrCodeFailure {
                        err: err.to_string(),
                    },
                    Some(opts.message_id),
                )
                .await;
                Err(AppError::not_found(err))
            }
            None => Ok(FlowOutcome::NoLnurl),
        }
    }

    async fn dispatch(
        &self,
        user: UserId,
        text: &str,
        opts: &HandleLnurlOpts,
    ) -> Result<FlowOutcome, AppError> {
        let params = self.client.resolve(text).await.map_err(|e| match e.category {
            ErrorCategory::LnurlRejected => e,
            ErrorCategory::Unsupported => e.replying_to(opts.message_id),
            category => AppError::with_category(
                category,
                format!("failed to fetch lnurl params: {}", e.message),
            ),
        })?;

        info!(kind = params.kind(), "Handling lnurl");

        match params {
            LnurlParams::Auth(params) => self.auth_flow(user, params, opts).await,
            LnurlParams::Withdraw(params) => self.withdraw_flow(user, params, opts).await,
            LnurlParams::Pay(params) => self.pay_flow(user, text, params, opts).await,
            // An invoice answer is only meaningful as the second stage of a
            // pay flow this wallet started
            LnurlParams::PayValues(_) => Err(AppError::unsupported(
                "lnurl-pay invoice answers cannot start a flow",
            )
            .replying_to(opts.message_id)),
        }
    }

    /// Turn a failed flow into its single user notification
    pub(crate) async fn report_failure(
        &self,
        user: UserId,
        result: Result<FlowOutcome, AppError>,
    ) -> Result<FlowOutcome, AppError> {
        let err = match result {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        let notification = match (&err.rejection, err.category) {
            (Some(rejection), _) => Notification::LnurlError {
                host: rejection.host.clone(),
                reason: rejection.reason.clone(),
            },
            (None, ErrorCategory::Unsupported) => Notification::Unsupported,
            // Balances stay out of chat
            (None, ErrorCategory::LedgerInvariant) => Notification::Error {
                err: LEDGER_USER_MESSAGE.to_string(),
            },
            (None, _) => Notification::Error {
                err: err.message.clone(),
            },
        };

        warn!(
            user_id = user,
            category = %err.category,
            error = %err.message,
            "Lnurl flow failed"
        );
        self.send(user, notification, err.reply_to).await;

        Err(err)
    }
}
