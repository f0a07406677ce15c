// Library exports for testing and external use
pub mod auth;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod health;
pub mod lnurl;
pub mod metrics;
pub mod observability;
pub mod router;
pub mod state;
pub mod types;
pub mod wallet;
pub mod webhooks;
