use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Post-payment instruction attached to an lnurl-pay invoice (LUD-09, LUD-10)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum SuccessAction {
    Message {
        message: String,
    },
    Url {
        description: String,
        url: String,
    },
    Aes {
        description: String,
        ciphertext: String,
        iv: String,
    },
}

/// What the payer is shown once the preimage is known
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSuccessAction {
    pub text: String,
    pub url: Option<String>,
    pub decipher_error: Option<String>,
}

impl SuccessAction {
    /// Resolve the action with the payment preimage. A failed aes decryption
    /// is reported in `decipher_error` and falls back to the description.
    pub fn resolve(&self, preimage: &[u8]) -> ResolvedSuccessAction {
        match self {
            Self::Message { message } => ResolvedSuccessAction {
                text: message.clone(),
                ..Default::default()
            },
            Self::Url { description, url } => ResolvedSuccessAction {
                text: description.clone(),
                url: Some(url.clone()),
                decipher_error: None,
            },
            Self::Aes {
                description,
                ciphertext,
                iv,
            } => match decrypt(preimage, ciphertext, iv) {
                Ok(plaintext) => ResolvedSuccessAction {
                    text: plaintext,
                    ..Default::default()
                },
                Err(e) => ResolvedSuccessAction {
                    text: description.clone(),
                    url: None,
                    decipher_error: Some(e.message),
                },
            },
        }
    }
}

/// AES-256-CBC with PKCS7 padding, keyed by the 32-byte preimage
pub fn decrypt(preimage: &[u8], ciphertext_b64: &str, iv_b64: &str) -> Result<String, AppError> {
    if preimage.len() != 32 {
        return Err(AppError::decrypt_failed(format!(
            "preimage must be 32 bytes, got {}",
            preimage.len()
        )));
    }

    let ciphertext = STANDARD
        .decode(ciphertext_b64)
        .map_err(|e| AppError::decrypt_failed(format!("invalid ciphertext encoding: {}", e)))?;
    let iv = STANDARD
        .decode(iv_b64)
        .map_err(|e| AppError::decrypt_failed(format!("invalid iv encoding: {}", e)))?;

    let plaintext = Aes256CbcDec::new_from_slices(preimage, &iv)
        .map_err(|_| AppError::decrypt_failed(format!("iv must be 16 bytes, got {}", iv.len())))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| AppError::decrypt_failed("wrong key or corrupted ciphertext"))?;

    String::from_utf8(plaintext)
        .map_err(|_| AppError::decrypt_failed("decrypted message is not utf-8"))
}

#[cfg(test)]
mod tests {
    use aes::cipher::BlockEncryptMut;

    use super::*;
    use crate::error::ErrorCategory;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    fn encrypt(key: &[u8; 32], iv: &[u8; 16], plaintext: &str) -> String {
        let ciphertext = Aes256CbcEnc::new_from_slices(key, iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        STANDARD.encode(ciphertext)
    }

    #[test]
    fn test_deserialize_tags() {
        let action: SuccessAction =
            serde_json::from_str(r#"{"tag":"url","description":"receipt","url":"https://x.example/r"}"#)
                .unwrap();
        assert_eq!(
            action,
            SuccessAction::Url {
                description: "receipt".to_string(),
                url: "https://x.example/r".to_string()
            }
        );

        assert!(serde_json::from_str::<SuccessAction>(r#"{"tag":"video"}"#).is_err());
    }

    #[test]
    fn test_aes_round_trip() {
        let preimage = [7u8; 32];
        let iv = [9u8; 16];
        let action = SuccessAction::Aes {
            description: "Your voucher".to_string(),
            ciphertext: encrypt(&preimage, &iv, "CODE-1234"),
            iv: STANDARD.encode(iv),
        };

        let resolved = action.resolve(&preimage);
        assert_eq!(resolved.text, "CODE-1234");
        assert!(resolved.decipher_error.is_none());
    }

    #[test]
    fn test_aes_wrong_preimage_reports_inline() {
        let iv = [9u8; 16];
        let action = SuccessAction::Aes {
            description: "Your voucher".to_string(),
            ciphertext: encrypt(&[7u8; 32], &iv, "CODE-1234"),
            iv: STANDARD.encode(iv),
        };

        let resolved = action.resolve(&[8u8; 32]);
        assert_eq!(resolved.text, "Your voucher");
        assert!(resolved.decipher_error.is_some());
    }

    #[test]
    fn test_decrypt_rejects_bad_inputs() {
        let err = decrypt(&[1u8; 16], "AAAA", "AAAA").unwrap_err();
        assert_eq!(err.category, ErrorCategory::DecryptFailed);

        let err = decrypt(&[1u8; 32], "not base64!", "AAAA").unwrap_err();
        assert_eq!(err.category, ErrorCategory::DecryptFailed);

        // 3-byte iv
        let err = decrypt(&[1u8; 32], "AAAAAAAAAAAAAAAAAAAAAA==", "AAAA").unwrap_err();
        assert!(err.message.contains("16 bytes"));
    }

    #[test]
    fn test_message_action() {
        let action = SuccessAction::Message {
            message: "Thanks!".to_string(),
        };
        let resolved = action.resolve(&[]);
        assert_eq!(resolved.text, "Thanks!");
        assert_eq!(resolved.url, None);
    }
}
