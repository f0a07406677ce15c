use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::{Notification, Notifier};
use crate::events::{EventHandler, WalletEvent};
use crate::metrics::webhook_metrics::record_webhook_delivery;
use crate::types::{MessageId, UserId};

/// Configuration for webhook retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Timeout for each webhook request in seconds
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000, // 1 second
            max_delay_ms: 30000,    // 30 seconds
            backoff_multiplier: 2.0,
            timeout_secs: 30,
        }
    }
}

/// Configuration for a single webhook endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    /// Unique identifier for the endpoint
    pub id: String,
    /// The webhook URL to send events to
    pub url: String,
    /// Optional secret for HMAC-SHA256 signature generation
    pub secret: Option<String>,
    /// Event types this endpoint receives; empty means all
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub retry_config: RetryConfig,
    /// Whether this endpoint is active
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl fmt::Debug for WebhookEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookEndpoint")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("events", &self.events)
            .field("retry_config", &self.retry_config)
            .field("enabled", &self.enabled)
            .field("description", &self.description)
            .finish()
    }
}

impl WebhookEndpoint {
    pub fn new(id: String, url: String) -> anyhow::Result<Self> {
        Self::validate_webhook_url(&url)?;

        Ok(Self {
            id,
            url,
            secret: None,
            events: Vec::new(),
            retry_config: RetryConfig::default(),
            enabled: true,
            description: None,
        })
    }

    // The chat transport usually runs next to the daemon, so loopback and
    // private targets are allowed
    fn validate_webhook_url(url: &str) -> anyhow::Result<()> {
        let parsed_url =
            reqwest::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid URL format: {}", e))?;

        match parsed_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(anyhow::anyhow!("Unsupported URL scheme: {}", scheme)),
        }

        if parsed_url.host_str().map_or(true, str::is_empty) {
            return Err(anyhow::anyhow!("URL must have a host"));
        }

        Ok(())
    }

    pub fn with_secret(mut self, secret: String) -> anyhow::Result<Self> {
        Self::validate_hmac_secret(&secret)?;
        self.secret = Some(secret);
        Ok(self)
    }

    fn validate_hmac_secret(secret: &str) -> anyhow::Result<()> {
        // 32 bytes = 256 bits
        const MIN_SECRET_LENGTH: usize = 32;

        if secret.len() < MIN_SECRET_LENGTH {
            return Err(anyhow::anyhow!(
                "HMAC secret must be at least {} characters long",
                MIN_SECRET_LENGTH
            ));
        }

        let distinct: HashSet<char> = secret.chars().collect();
        if distinct.len() < 8 {
            return Err(anyhow::anyhow!(
                "HMAC secret contains too many repeated characters"
            ));
        }

        Ok(())
    }

    pub fn with_events(mut self, events: Vec<String>) -> Self {
        self.events = events;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Check if this endpoint should receive the given event type
    pub fn should_receive_event(&self, event_type: &str) -> bool {
        self.enabled && (self.events.is_empty() || self.events.iter().any(|e| e == event_type))
    }
}

/// Configuration for the webhook system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Chat transport receiving user notifications
    #[serde(default)]
    pub transport: Option<WebhookEndpoint>,
    /// Endpoints receiving tracking events
    #[serde(default)]
    pub endpoints: Vec<WebhookEndpoint>,
    /// Whether tracking event delivery is enabled globally
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            transport: None,
            endpoints: Vec::new(),
            enabled: true,
        }
    }
}

impl WebhookConfig {
    pub fn has_event_endpoints(&self) -> bool {
        self.enabled && self.endpoints.iter().any(|e| e.enabled)
    }
}

#[derive(Debug, Default, Deserialize)]
struct TransportReply {
    #[serde(default)]
    message_id: Option<MessageId>,
}

/// Outbound webhooks: user notifications go to the chat transport, tracking
/// events to the configured event endpoints. Every request is signed with
/// the endpoint's HMAC secret when one is set.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    config: WebhookConfig,
}

impl fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("config", &self.config)
            .finish()
    }
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Forward a tracking event to all matching endpoints
    pub async fn notify_event(&self, event: &WalletEvent) -> anyhow::Result<()> {
        if !self.config.enabled {
            debug!("Webhook notifications disabled, skipping event");
            return Ok(());
        }

        let event_type = event.event_type();
        let event_id = event.event_id();

        let payload = self.create_webhook_payload(event, &event_id)?;
        let payload_str = serde_json::to_string(&payload)?;

        let mut tasks = Vec::new();
        for endpoint in &self.config.endpoints {
            if endpoint.should_receive_event(event_type) {
                let client = self.client.clone();
                let endpoint = endpoint.clone();
                let payload_str = payload_str.clone();
                let event_id = event_id.clone();

                tasks.push(tokio::spawn(async move {
                    Self::deliver_webhook(&client, &endpoint, &payload_str, &event_id, event_type)
                        .await
                }));
            }
        }

        let mut success_count = 0;
        let mut error_count = 0;

        for task in tasks {
            match task.await {
                Ok(Ok(_)) => success_count += 1,
                Ok(Err(e)) => {
                    error_count += 1;
                    error!("Webhook delivery failed: {}", e);
                }
                Err(e) => {
                    error_count += 1;
                    error!("Webhook task panicked: {}", e);
                }
            }
        }

        info!(
            event_id = %event_id,
            event_type = %event_type,
            success_count,
            error_count,
            "Webhook notification processing completed"
        );

        Ok(())
    }

    fn create_webhook_payload(
        &self,
        event: &WalletEvent,
        event_id: &str,
    ) -> anyhow::Result<Value> {
        let mut data = serde_json::to_value(event)?;
        sanitize_value(&mut data, &sensitive_fields());

        Ok(json!({
            "id": event_id,
            "type": event.event_type(),
            "timestamp": event.timestamp(),
            "data": data
        }))
    }

    fn transport(&self) -> anyhow::Result<&WebhookEndpoint> {
        self.config
            .transport
            .as_ref()
            .filter(|t| t.enabled)
            .ok_or_else(|| anyhow::anyhow!("no chat transport configured"))
    }

    async fn call_transport(&self, kind: &str, payload: Value) -> anyhow::Result<String> {
        let transport = self.transport()?;
        let request_id = Uuid::new_v4().to_string();
        let payload_str = serde_json::to_string(&payload)?;

        Self::deliver_webhook(&self.client, transport, &payload_str, &request_id, kind).await
    }

    /// Deliver a webhook to a single endpoint with retry logic, returning
    /// the response body
    async fn deliver_webhook(
        client: &Client,
        endpoint: &WebhookEndpoint,
        payload: &str,
        request_id: &str,
        kind: &str,
    ) -> anyhow::Result<String> {
        let mut attempt = 0;
        let mut delay_ms = endpoint.retry_config.initial_delay_ms;

        while attempt < endpoint.retry_config.max_attempts {
            attempt += 1;
            let started = Instant::now();

            match Self::send_webhook_request(client, endpoint, payload, request_id).await {
                Ok(body) => {
                    record_webhook_delivery(&endpoint.id, kind, true, started.elapsed());
                    debug!(
                        endpoint_id = %endpoint.id,
                        request_id = %request_id,
                        attempt,
                        "Webhook delivered successfully"
                    );
                    return Ok(body);
                }
                Err(e) => {
                    record_webhook_delivery(&endpoint.id, kind, false, started.elapsed());
                    warn!(
                        endpoint_id = %endpoint.id,
                        request_id = %request_id,
                        attempt,
                        max_attempts = endpoint.retry_config.max_attempts,
                        error = %e,
                        "Webhook delivery attempt failed"
                    );

                    if attempt < endpoint.retry_config.max_attempts {
                        sleep(Duration::from_millis(delay_ms)).await;

                        // Exponential backoff with cap
                        delay_ms = ((delay_ms as f64 * endpoint.retry_config.backoff_multiplier)
                            as u64)
                            .min(endpoint.retry_config.max_delay_ms);
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Webhook delivery to {} failed after {} attempts",
            endpoint.id,
            attempt
        ))
    }

    async fn send_webhook_request(
        client: &Client,
        endpoint: &WebhookEndpoint,
        payload: &str,
        request_id: &str,
    ) -> anyhow::Result<String> {
        let mut request_builder = client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("lnurld-webhook/", env!("CARGO_PKG_VERSION")))
            .header("X-Event-Id", request_id)
            .timeout(Duration::from_secs(endpoint.retry_config.timeout_secs))
            .body(payload.to_string());

        if let Some(secret) = &endpoint.secret {
            let signature = Self::calculate_hmac_signature(payload, secret)?;
            request_builder = request_builder.header("X-Signature-SHA256", signature);
        }

        let response = request_builder.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(body)
        } else {
            Err(anyhow::anyhow!(
                "Webhook request failed with status {}: {}",
                status,
                body
            ))
        }
    }

    /// Calculate HMAC-SHA256 signature for webhook payload
    pub fn calculate_hmac_signature(payload: &str, secret: &str) -> anyhow::Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;

        mac.update(payload.as_bytes());
        Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Verify a signature produced by [`Self::calculate_hmac_signature`]
    pub fn verify_hmac_signature(payload: &str, signature: &str, secret: &str) -> bool {
        let Some(hex_sig) = signature.strip_prefix("sha256=") else {
            return false;
        };
        let Ok(expected) = hex::decode(hex_sig) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };

        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

fn sensitive_fields() -> HashSet<&'static str> {
    [
        "preimage",
        "invoice",
        "bolt11",
        "secret",
        "password",
        "token",
        "private_key",
        "seed",
        "authorization",
    ]
    .into_iter()
    .collect()
}

/// Recursively redact sensitive fields of a JSON value
fn sanitize_value(value: &mut Value, sensitive_fields: &HashSet<&str>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                if sensitive_fields.iter().any(|s| key_lower.contains(s)) {
                    *val = Value::String("[REDACTED]".to_string());
                } else {
                    sanitize_value(val, sensitive_fields);
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                sanitize_value(item, sensitive_fields);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        user: UserId,
        notification: Notification,
        reply_to: Option<MessageId>,
    ) -> anyhow::Result<Option<MessageId>> {
        let kind = notification.kind();
        let expects_answer = notification.expects_answer();
        let payload = json!({
            "type": "notification",
            "user_id": user,
            "reply_to": reply_to,
            "notification": notification,
        });

        let body = self.call_transport(kind, payload).await?;
        // Transports that do not track message ids answer with an empty body
        let reply: TransportReply = if body.trim().is_empty() {
            TransportReply::default()
        } else {
            serde_json::from_str(&body)?
        };

        if expects_answer && reply.message_id.is_none() {
            anyhow::bail!("transport returned no message id for '{}' notification", kind);
        }

        Ok(reply.message_id)
    }

    async fn retract(&self, user: UserId, message_id: MessageId) -> anyhow::Result<()> {
        let payload = json!({
            "type": "retract",
            "user_id": user,
            "message_id": message_id,
        });

        self.call_transport("retract", payload).await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for WebhookNotifier {
    async fn handle(&self, event: WalletEvent) -> anyhow::Result<()> {
        // Delivery retries must not hold up the publisher
        let notifier = self.clone();

        tokio::spawn(async move {
            if let Err(e) = notifier.notify_event(&event).await {
                error!(
                    event_type = %event.event_type(),
                    error = %e,
                    "Failed to send webhook notifications"
                );
            }
        });

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook_notifier"
    }
}

#[cfg(test)]
#[path = "tests/notifier_tests.rs"]
mod tests;
