use std::str::FromStr;

use lightning_invoice::Bolt11Invoice;
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// The bolt11 fields lnurl-pay settlement validates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub bolt11: String,
    pub msat: Option<u64>,
    /// Lowercase hex, present only when the invoice commits to hashed metadata
    pub description_hash: Option<String>,
    pub payment_hash: String,
}

/// Lowercase hex SHA-256 of the metadata string exactly as received
pub fn metadata_hash(metadata: &str) -> String {
    hex::encode(Sha256::digest(metadata.as_bytes()))
}

impl Invoice {
    pub fn decode(bolt11: &str) -> Result<Self, AppError> {
        let trimmed = bolt11.trim();
        let invoice = Bolt11Invoice::from_str(trimmed)
            .map_err(|e| AppError::validation_error(format!("invalid bolt11 invoice: {}", e)))?;

        let description_hash = invoice
            .clone()
            .into_signed_raw()
            .raw_invoice()
            .description_hash()
            .map(|hash| hash.0.to_string());

        Ok(Self {
            bolt11: trimmed.to_string(),
            msat: invoice.amount_milli_satoshis(),
            description_hash,
            payment_hash: invoice.payment_hash().to_string(),
        })
    }

    /// The invoice must commit to `metadata` and ask for exactly
    /// `amount_msat`; anything else is a substituted invoice
    pub fn validate_against(&self, metadata: &str, amount_msat: u64) -> Result<(), AppError> {
        if self.description_hash.as_deref() != Some(metadata_hash(metadata).as_str()) {
            return Err(AppError::protocol_violation(
                "Got invoice with wrong description_hash",
            ));
        }

        if self.msat != Some(amount_msat) {
            return Err(AppError::protocol_violation("Got invoice with wrong amount."));
        }

        Ok(())
    }
}
