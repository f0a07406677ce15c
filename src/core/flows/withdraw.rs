use chrono::Utc;
use tracing::{debug, info};

use super::FlowOutcome;
use crate::core::{LnurlCore, MakeInvoiceArgs};
use crate::error::AppError;
use crate::events::WalletEvent;
use crate::lnurl::WithdrawParams;
use crate::observability::sanitize_invoice;
use crate::types::{HandleLnurlOpts, UserId};

impl LnurlCore {
    /// Hand the service an invoice for the full withdrawable amount. Whether
    /// and when it pays is up to the service.
    pub(crate) async fn withdraw_flow(
        &self,
        user: UserId,
        params: WithdrawParams,
        opts: &HandleLnurlOpts,
    ) -> Result<FlowOutcome, AppError> {
        let host = params.host();

        let bolt11 = self
            .wallet
            .make_invoice(
                user,
                MakeInvoiceArgs {
                    msatoshi: params.max_withdrawable,
                    description: params.default_description.clone(),
                    ignore_invoice_size_limit: true,
                    skip_qr: true,
                    message_id: opts.message_id,
                },
            )
            .await?;

        debug!(
            bolt11 = %sanitize_invoice(&bolt11),
            k1 = %params.k1,
            "Sending invoice to lnurl-withdraw callback"
        );

        self.client
            .callback(&params.callback, &[("k1", params.k1.clone()), ("pr", bolt11)])
            .await?;

        info!(
            user_id = user,
            host = %host,
            amount_msat = params.max_withdrawable,
            "Lnurl-withdraw invoice accepted"
        );

        self.track(WalletEvent::LnurlWithdraw {
            user_id: user,
            domain: host.clone(),
            amount_msat: params.max_withdrawable,
            timestamp: Utc::now(),
        })
        .await;

        Ok(FlowOutcome::Withdrawn {
            host,
            amount_msat: params.max_withdrawable,
        })
    }
}
