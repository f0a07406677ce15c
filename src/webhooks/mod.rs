pub mod notifier;

pub use notifier::{RetryConfig, WebhookConfig, WebhookEndpoint, WebhookNotifier};
