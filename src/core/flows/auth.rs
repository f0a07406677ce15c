use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

use super::FlowOutcome;
use crate::core::{LnurlCore, Notification};
use crate::error::AppError;
use crate::events::WalletEvent;
use crate::lnurl::AuthParams;
use crate::types::{HandleLnurlOpts, UserId};

/// Linking key of `user`: a pure function of the user id and the server
/// secret, so nothing auth-specific is ever stored
pub fn derive_auth_key(user: UserId, server_secret: &str) -> Result<SecretKey, AppError> {
    if server_secret.is_empty() {
        return Err(AppError::internal_error("server secret is not configured"));
    }

    let seed = Sha256::digest(format!("lnurlkeyseed:{}:{}", user, server_secret).as_bytes());
    SecretKey::from_slice(&seed)
        .map_err(|e| AppError::internal_error(format!("cannot derive linking key: {}", e)))
}

/// Sign the hex challenge `k1`. Returns `(DER signature, compressed public
/// key)`, both hex. Signatures are deterministic (RFC 6979).
pub fn sign_challenge(key: &SecretKey, k1: &str) -> Result<(String, String), AppError> {
    let challenge = hex::decode(k1)
        .map_err(|e| AppError::validation_error(format!("k1 is not hex: {}", e)))?;
    let message = Message::from_digest_slice(&challenge).map_err(|_| {
        AppError::validation_error(format!("k1 must be 32 bytes, got {}", challenge.len()))
    })?;

    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa(&message, key);
    let public_key = PublicKey::from_secret_key(&secp, key);

    Ok((
        hex::encode(&signature.serialize_der()[..]),
        hex::encode(public_key.serialize()),
    ))
}

impl LnurlCore {
    pub(crate) async fn auth_flow(
        &self,
        user: UserId,
        params: AuthParams,
        opts: &HandleLnurlOpts,
    ) -> Result<FlowOutcome, AppError> {
        let key = derive_auth_key(user, &self.settings.server_secret)?;
        let (signature, public_key) = sign_challenge(&key, &params.k1)?;

        self.client
            .callback(
                &params.callback,
                &[("sig", signature), ("key", public_key.clone())],
            )
            .await?;

        info!(
            user_id = user,
            host = %params.host,
            action = ?params.action,
            silent = opts.login_silently,
            "Lnurl-auth accepted"
        );

        if !opts.login_silently {
            self.send(
                user,
                Notification::AuthSuccess {
                    host: params.host.clone(),
                    public_key: public_key.clone(),
                },
                None,
            )
            .await;

            self.track(WalletEvent::LnurlAuth {
                user_id: user,
                domain: params.host.clone(),
                timestamp: Utc::now(),
            })
            .await;
        }

        Ok(FlowOutcome::Authenticated {
            host: params.host,
            public_key,
        })
    }
}
