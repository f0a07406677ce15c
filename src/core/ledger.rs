use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::LnurlCore;
use crate::error::AppError;
use crate::events::WalletEvent;

/// One balance-affecting row attributed to the clearing account, in msat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub amount: i64,
    #[serde(default)]
    pub fees: i64,
}

/// `sum(amount) - sum(fees)` over a snapshot of clearing-account entries
pub fn clearing_balance(entries: &[LedgerEntry]) -> Result<i64, AppError> {
    let overflow = || AppError::ledger_invariant("clearing account sum overflows i64");

    let credits = entries
        .iter()
        .try_fold(0i64, |acc, e| acc.checked_add(e.amount))
        .ok_or_else(overflow)?;
    let fees = entries
        .iter()
        .try_fold(0i64, |acc, e| acc.checked_add(e.fees))
        .ok_or_else(overflow)?;

    credits.checked_sub(fees).ok_or_else(overflow)
}

/// The clearing account must net to zero
pub fn ensure_balanced(account: &str, entries: &[LedgerEntry]) -> Result<(), AppError> {
    match clearing_balance(entries)? {
        0 => Ok(()),
        balance => Err(AppError::ledger_invariant(format!(
            "clearing account {} has non-zero balance {}",
            account, balance
        ))),
    }
}

impl LnurlCore {
    /// Check the clearing account against one snapshot from the ledger.
    /// A violation is logged and published as an alert before being returned.
    pub async fn check_ledger(&self, check_point: &str) -> Result<(), AppError> {
        let account = &self.settings.clearing_account;
        let entries = self.ledger.clearing_entries(account).await?;

        let result = ensure_balanced(account, &entries);
        match &result {
            Ok(()) => debug!(account = %account, check_point, entries = entries.len(), "Ledger balanced"),
            Err(e) => {
                error!(
                    account = %account,
                    check_point,
                    error = %e,
                    "Ledger invariant violated"
                );
                self.event_bus
                    .publish(WalletEvent::LedgerInvariantViolated {
                        account: account.clone(),
                        balance: clearing_balance(&entries).unwrap_or(i64::MAX),
                        check_point: check_point.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
        }

        result
    }
}
