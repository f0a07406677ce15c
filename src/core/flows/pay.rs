use chrono::Utc;
use tracing::{debug, info, instrument};
use url::Url;

use super::{FlowOutcome, PaySettlement};
use crate::core::{LnurlCore, Notification, PromptInput};
use crate::error::AppError;
use crate::events::WalletEvent;
use crate::lnurl::PayParams;
use crate::types::{
    msats_to_sats, HandleLnurlOpts, MessageId, PendingPayRequest, UserId, MSATS_PER_SAT,
};

/// Fixed offers this far above the caller's threshold still skip the prompt
pub const FAST_PATH_GRACE_MSAT: u64 = 3000;

/// Whether a fixed-amount offer can be paid without asking. Variable offers
/// (`fixed_amount == 0`) always prompt.
pub fn should_pay_without_prompt(fixed_amount: u64, threshold: Option<u64>) -> bool {
    fixed_amount > 0
        && threshold.map_or(false, |threshold| {
            fixed_amount < threshold.saturating_add(FAST_PATH_GRACE_MSAT)
        })
}

impl LnurlCore {
    /// First stage of lnurl-pay: pay small fixed offers directly, otherwise
    /// prompt and park the offer until the user answers
    pub(crate) async fn pay_flow(
        &self,
        user: UserId,
        lnurl: &str,
        params: PayParams,
        opts: &HandleLnurlOpts,
    ) -> Result<FlowOutcome, AppError> {
        let fixed_amount = params.fixed_amount();
        let domain = params.domain();

        self.track(WalletEvent::LnurlPay {
            user_id: user,
            domain: domain.clone(),
            fixed_sat: fixed_amount / MSATS_PER_SAT,
            min_sat: params.min_sendable / MSATS_PER_SAT,
            max_sat: params.max_sendable / MSATS_PER_SAT,
            timestamp: Utc::now(),
        })
        .await;

        if should_pay_without_prompt(fixed_amount, opts.pay_without_prompt_if) {
            debug!(
                fixed_amount,
                threshold = ?opts.pay_without_prompt_if,
                "Paying fixed offer without prompt"
            );
            return self
                .settle(PaySettlement {
                    user,
                    amount_msat: fixed_amount,
                    callback: params.callback,
                    metadata: params.encoded_metadata,
                    lnurl: lnurl.to_string(),
                    reply_to: opts.message_id,
                })
                .await;
        }

        let metadata = params.metadata();
        let (input, estimate_msat) = if fixed_amount > 0 {
            (
                PromptInput::Confirm {
                    amount_msat: fixed_amount,
                },
                fixed_amount,
            )
        } else {
            (PromptInput::AmountReply, params.min_sendable)
        };

        let prompt = Notification::PayPrompt {
            domain,
            text: metadata.description().to_string(),
            image: metadata.image(),
            fixed_amount: msats_to_sats(fixed_amount),
            min: msats_to_sats(params.min_sendable),
            max: msats_to_sats(params.max_sendable),
            usd: self.rate.format_usd(estimate_msat).await,
            input,
        };

        let prompt_message_id = match self
            .send_prompt(user, prompt, Some(opts.message_id))
            .await
        {
            Some(prompt_message_id) => prompt_message_id,
            None => return Ok(FlowOutcome::PromptUndelivered),
        };

        let pending = PendingPayRequest::new(
            params.encoded_metadata,
            params.callback.as_str(),
            lnurl,
        );
        self.cache
            .put(
                &PendingPayRequest::cache_key(user, prompt_message_id),
                serde_json::to_string(&pending)?,
                self.settings.pending_reply_ttl,
            )
            .await?;

        info!(user_id = user, prompt_message_id, fixed_amount, "Lnurl-pay prompt sent");

        Ok(FlowOutcome::Prompted { prompt_message_id })
    }

    /// The user answered the pay prompt `prompt_message_id` with
    /// `amount_msat`; `message_id` is their answer
    #[instrument(skip(self), fields(user_id = user))]
    pub async fn confirm_pay(
        &self,
        user: UserId,
        prompt_message_id: MessageId,
        amount_msat: u64,
        message_id: MessageId,
    ) -> Result<FlowOutcome, AppError> {
        let result = self
            .resume_pay(user, prompt_message_id, amount_msat, message_id)
            .await;
        self.report_failure(user, result).await
    }

    async fn resume_pay(
        &self,
        user: UserId,
        prompt_message_id: MessageId,
        amount_msat: u64,
        message_id: MessageId,
    ) -> Result<FlowOutcome, AppError> {
        let key = PendingPayRequest::cache_key(user, prompt_message_id);
        let raw = self.cache.get(&key).await?.ok_or_else(|| {
            AppError::not_found("this payment request has expired or was already answered")
                .replying_to(message_id)
        })?;

        let pending: PendingPayRequest = serde_json::from_str(&raw)?;
        if pending.kind != PendingPayRequest::KIND {
            return Err(AppError::validation_error(format!(
                "pending reply of type '{}' is not an lnurl-pay prompt",
                pending.kind
            )));
        }

        // A rejected answer leaves the prompt open for another try
        if amount_msat == 0 {
            return Err(
                AppError::validation_error("amount must be positive").replying_to(message_id)
            );
        }

        let callback = Url::parse(&pending.url)
            .map_err(|e| AppError::invalid_lnurl(format!("invalid callback url: {}", e)))?;

        self.cache.delete(&key).await?;
        self.settle(PaySettlement {
            user,
            amount_msat,
            callback,
            metadata: pending.metadata,
            lnurl: pending.lnurl,
            reply_to: message_id,
        })
        .await
    }
}
