use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::webhooks::WebhookConfig;

/// Bitstamp BTC/USD ticker, the source used for the pay prompt's USD estimate
pub const DEFAULT_RATE_SOURCE_URL: &str = "https://www.bitstamp.net/api/v2/ticker/btcusd";

/// Configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server bind IP address
    #[serde(rename = "http-bind-ip", default = "default_bind_ip")]
    pub http_bind_ip: String,

    /// HTTP server bind port
    #[serde(rename = "http-bind-port", default = "default_bind_port")]
    pub http_bind_port: u16,

    /// HTTP Basic Auth password (plain text, optional)
    /// When None, authentication is disabled
    #[serde(rename = "http-password")]
    pub http_password: Option<String>,

    /// Input to the per-user lnurl-auth key derivation. Changing it changes
    /// every user's linking key.
    #[serde(rename = "server-secret")]
    pub server_secret: Option<String>,

    /// Ledger account routed payments pass through; must always net to zero
    #[serde(rename = "clearing-account", default = "default_clearing_account")]
    pub clearing_account: String,

    /// Base URL of the wallet backend (invoices, payments, ledger entries)
    #[serde(rename = "wallet-url", default = "default_wallet_url")]
    pub wallet_url: String,

    /// Data directory for the daemon (contains config and logs)
    #[serde(rename = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Timeout for every outbound LNURL request
    #[serde(rename = "http-timeout-secs", default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Lifetime of a pay prompt waiting for the user's answer
    #[serde(
        rename = "pending-reply-ttl-secs",
        default = "default_pending_reply_ttl_secs"
    )]
    pub pending_reply_ttl_secs: u64,

    /// Pause before the success-action notification so it lands last in the chat
    #[serde(
        rename = "success-action-delay-ms",
        default = "default_success_action_delay_ms"
    )]
    pub success_action_delay_ms: u64,

    /// How long a settled payment waits for its preimage before giving up
    #[serde(
        rename = "confirmation-timeout-secs",
        default = "default_confirmation_timeout_secs"
    )]
    pub confirmation_timeout_secs: u64,

    #[serde(rename = "rate-source-url", default = "default_rate_source_url")]
    pub rate_source_url: String,

    #[serde(rename = "rate-refresh-secs", default = "default_rate_refresh_secs")]
    pub rate_refresh_secs: u64,

    /// Webhook configuration (chat transport and event forwarding)
    #[serde(rename = "webhooks", default)]
    pub webhooks: WebhookConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind_ip: default_bind_ip(),
            http_bind_port: default_bind_port(),
            http_password: None,
            server_secret: None,
            clearing_account: default_clearing_account(),
            wallet_url: default_wallet_url(),
            data_dir: None,
            http_timeout_secs: default_http_timeout_secs(),
            pending_reply_ttl_secs: default_pending_reply_ttl_secs(),
            success_action_delay_ms: default_success_action_delay_ms(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            rate_source_url: default_rate_source_url(),
            rate_refresh_secs: default_rate_refresh_secs(),
            webhooks: WebhookConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file atomically
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;

        // Write to temporary file first
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, contents)?;

        // The config file is never observed partially written
        match std::fs::rename(&temp_path, path) {
            Ok(_) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e.into())
            }
        }
    }

    /// Get the complete HTTP server address
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.http_bind_ip, self.http_bind_port)
    }

    /// Check if authentication is enabled
    pub fn is_auth_enabled(&self) -> bool {
        self.http_password.is_some()
    }

    /// Get the authentication password
    pub fn auth_password(&self) -> Option<&str> {
        self.http_password.as_deref()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn pending_reply_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_reply_ttl_secs)
    }

    pub fn success_action_delay(&self) -> Duration {
        Duration::from_millis(self.success_action_delay_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn rate_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.rate_refresh_secs)
    }

    /// Generate a secure random 32-byte hex secret
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Load or create configuration file, generating the API password and the
    /// auth server secret when they are missing.
    ///
    /// Returns the config and whether the password was generated.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        let mut password_generated = false;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut config = if path.exists() {
            match Self::load_from_file(path) {
                Ok(cfg) => cfg,
                Err(_) => {
                    // If config file is corrupted, recreate it
                    let cfg = Self::default();
                    cfg.save_to_file(path)?;
                    cfg
                }
            }
        } else {
            let config = Self::default();
            config.save_to_file(path)?;
            config
        };

        let mut dirty = false;

        if config.http_password.is_none() {
            config.http_password = Some(Self::generate_secret());
            password_generated = true;
            dirty = true;
        }

        // A lost server secret rotates every user's lnurl-auth identity, so it
        // is persisted right away
        if config.server_secret.is_none() {
            config.server_secret = Some(Self::generate_secret());
            dirty = true;
        }

        if dirty {
            config.save_to_file(path)?;
        }

        Ok((config, password_generated))
    }
}

// Default value functions
fn default_bind_ip() -> String {
    // Use 0.0.0.0 in containerized environments to allow external connections
    if std::env::var("DOCKER_CONTAINER").is_ok()
        || std::env::var("LNURLD_ADDR").is_ok()
        || std::path::Path::new("/.dockerenv").exists()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
    {
        "0.0.0.0".to_string()
    } else {
        "127.0.0.1".to_string()
    }
}

fn default_bind_port() -> u16 {
    7171
}

fn default_clearing_account() -> String {
    "lightning.proxy".to_string()
}

fn default_wallet_url() -> String {
    "http://127.0.0.1:7070".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_pending_reply_ttl_secs() -> u64 {
    3600
}

fn default_success_action_delay_ms() -> u64 {
    2000
}

fn default_confirmation_timeout_secs() -> u64 {
    86_400
}

fn default_rate_source_url() -> String {
    DEFAULT_RATE_SOURCE_URL.to_string()
}

fn default_rate_refresh_secs() -> u64 {
    3600
}
