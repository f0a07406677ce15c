use std::fmt;

/// Configuration for sensitive data sanitization
#[derive(Clone, Debug)]
pub struct SanitizationConfig {
    /// Whether to sanitize payment preimages completely
    pub sanitize_preimages: bool,
    /// Whether to sanitize lightning invoices
    pub sanitize_invoices: bool,
    /// Maximum characters to show from start/end of sensitive data
    pub partial_show_chars: usize,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            sanitize_preimages: true,
            sanitize_invoices: true,
            partial_show_chars: 6,
        }
    }
}

/// A wrapper for sensitive data that implements safe Display
#[derive(Clone, Debug)]
pub struct SensitiveData<T> {
    inner: T,
    data_type: SensitiveDataType,
    config: SanitizationConfig,
}

#[derive(Clone, Debug, Copy)]
pub enum SensitiveDataType {
    /// Lightning invoice (bolt11)
    LightningInvoice,
    /// Payment preimage, also the key of aes success actions
    PaymentPreimage,
    /// Derived lnurl-auth linking key
    PrivateKey,
    /// Server secret feeding the auth key derivation
    ServerSecret,
    /// Payment hash
    PaymentHash,
}

impl SensitiveDataType {
    fn display_name(&self) -> &'static str {
        match self {
            Self::LightningInvoice => "invoice",
            Self::PaymentPreimage => "preimage",
            Self::PrivateKey => "private_key",
            Self::ServerSecret => "server_secret",
            Self::PaymentHash => "payment_hash",
        }
    }
}

impl<T: fmt::Display> SensitiveData<T> {
    pub fn new(data: T, data_type: SensitiveDataType) -> Self {
        Self {
            inner: data,
            data_type,
            config: SanitizationConfig::default(),
        }
    }

    pub fn with_config(data: T, data_type: SensitiveDataType, config: SanitizationConfig) -> Self {
        Self {
            inner: data,
            data_type,
            config,
        }
    }

    fn sanitized_repr(&self) -> String {
        let original = self.inner.to_string();

        let should_sanitize = match self.data_type {
            SensitiveDataType::LightningInvoice => self.config.sanitize_invoices,
            SensitiveDataType::PaymentPreimage => self.config.sanitize_preimages,
            SensitiveDataType::PrivateKey | SensitiveDataType::ServerSecret => true,
            SensitiveDataType::PaymentHash => false,
        };

        if !should_sanitize {
            return original;
        }

        // Secrets never leak a prefix, whatever their length
        let show = match self.data_type {
            SensitiveDataType::ServerSecret => 0,
            _ => self.config.partial_show_chars,
        };

        let len = original.len();
        if show == 0
            || len <= show * 2
            || !original.is_char_boundary(show)
            || !original.is_char_boundary(len - show)
        {
            format!(
                "[REDACTED_{}]",
                self.data_type.display_name().to_uppercase()
            )
        } else {
            let start = &original[..show];
            let end = &original[len - show..];
            let middle_len = len - (show * 2);

            format!(
                "{}[REDACTED_{}_{}_CHARS]{}",
                start,
                self.data_type.display_name().to_uppercase(),
                middle_len,
                end
            )
        }
    }
}

impl<T: fmt::Display> fmt::Display for SensitiveData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sanitized_repr())
    }
}

pub fn sanitize_invoice<T: fmt::Display>(invoice: T) -> SensitiveData<T> {
    SensitiveData::new(invoice, SensitiveDataType::LightningInvoice)
}

pub fn sanitize_preimage<T: fmt::Display>(preimage: T) -> SensitiveData<T> {
    SensitiveData::new(preimage, SensitiveDataType::PaymentPreimage)
}

pub fn sanitize_private_key<T: fmt::Display>(key: T) -> SensitiveData<T> {
    SensitiveData::new(key, SensitiveDataType::PrivateKey)
}

pub fn sanitize_server_secret<T: fmt::Display>(secret: T) -> SensitiveData<T> {
    SensitiveData::new(secret, SensitiveDataType::ServerSecret)
}

pub fn sanitize_payment_hash<T: fmt::Display>(hash: T) -> SensitiveData<T> {
    SensitiveData::new(hash, SensitiveDataType::PaymentHash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_sanitization() {
        let invoice = "lnbc10n1pjq8zd4sp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqhp58yjmdan79s6qqdhdzgynm4zwqd5d7xmw5fk98klysy043l2ahrqs";
        let result = sanitize_invoice(invoice).to_string();

        assert!(result.starts_with("lnbc10"));
        assert!(result.ends_with("2ahrqs"));
        assert!(result.contains("[REDACTED_INVOICE_"));
        assert!(!result.contains("qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypq"));
    }

    #[test]
    fn test_preimage_sanitization() {
        let preimage = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";
        let result = sanitize_preimage(preimage).to_string();

        assert!(result.starts_with("123456"));
        assert!(result.ends_with("abcdef"));
        assert!(result.contains("[REDACTED_PREIMAGE_52_CHARS]"));
    }

    #[test]
    fn test_short_data_sanitization() {
        let result = sanitize_preimage("abc").to_string();
        assert_eq!(result, "[REDACTED_PREIMAGE]");
    }

    #[test]
    fn test_payment_hash_not_sanitized() {
        let hash = "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        assert_eq!(sanitize_payment_hash(hash).to_string(), hash);
    }

    #[test]
    fn test_server_secret_fully_redacted() {
        let secret = "f00dbabe".repeat(8);
        assert_eq!(
            sanitize_server_secret(&secret).to_string(),
            "[REDACTED_SERVER_SECRET]"
        );
    }

    #[test]
    fn test_private_key_always_sanitized() {
        let config = SanitizationConfig {
            sanitize_preimages: false,
            sanitize_invoices: false,
            partial_show_chars: 6,
        };

        let key = "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35";
        let result =
            SensitiveData::with_config(key, SensitiveDataType::PrivateKey, config).to_string();

        assert!(result.contains("[REDACTED_PRIVATE_KEY_"));
        assert!(!result.contains("3decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c"));
    }
}
