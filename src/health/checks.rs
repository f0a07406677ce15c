use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::core::{clearing_balance, LnurlCore};
use crate::state::AppState;

/// Ledger snapshots slower than this mark the wallet backend as degraded
const SLOW_BACKEND: Duration = Duration::from_secs(5);

/// Overall health state of a component or the entire system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    /// Component has issues but flows still work
    Degraded,
    Unhealthy,
}

/// Health status for an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthState,
    pub message: Option<String>,
    pub last_check: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
    pub check_duration_ms: Option<u64>,
}

impl ComponentHealth {
    fn with_state(status: HealthState, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            last_check: Utc::now(),
            metadata: None,
            check_duration_ms: None,
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::with_state(HealthState::Healthy, message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_state(HealthState::Degraded, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_state(HealthState::Unhealthy, message)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.check_duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub checks: HashMap<String, ComponentHealth>,
}

/// Component health of the daemon: the clearing ledger, the event bus, the
/// payment broker and the dollar rate source.
///
/// An unbalanced clearing account makes the whole daemon unhealthy (503),
/// since every payment would be refused.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, StatusCode> {
    let health_status = collect_health(&state.core).await;

    info!(
        overall_status = ?health_status.status,
        total_checks = health_status.checks.len(),
        "Health check completed"
    );

    match health_status.status {
        HealthState::Healthy => Ok(Json(health_status)),
        HealthState::Degraded => {
            warn!("Daemon is degraded but still operational");
            Ok(Json(health_status))
        }
        HealthState::Unhealthy => {
            error!("Health check failed - returning 503 Service Unavailable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Liveness probe: the process is up and serving requests
pub async fn liveness_check() -> &'static str {
    debug!("Performing liveness check");
    "alive"
}

pub async fn collect_health(core: &LnurlCore) -> HealthStatus {
    let mut checks = HashMap::new();

    let started = Instant::now();
    let ledger = check_ledger_health(core).await;
    checks.insert("ledger".to_string(), ledger.with_duration(started.elapsed()));

    let started = Instant::now();
    let event_bus = check_event_bus_health(core).await;
    checks.insert(
        "event_bus".to_string(),
        event_bus.with_duration(started.elapsed()),
    );

    let broker = ComponentHealth::healthy("Payment broker is accepting waiters")
        .with_metadata(json!({ "pending_payments": core.broker.pending_count() }));
    checks.insert("payment_broker".to_string(), broker);

    let started = Instant::now();
    let rate = check_dollar_rate_health(core).await;
    checks.insert(
        "dollar_rate".to_string(),
        rate.with_duration(started.elapsed()),
    );

    HealthStatus {
        status: determine_overall_health(&checks),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: core.uptime().as_secs(),
        timestamp: Utc::now(),
        checks,
    }
}

/// Reads the clearing account without raising a violation event; the flows
/// do that when they trip over it.
async fn check_ledger_health(core: &LnurlCore) -> ComponentHealth {
    let account = &core.settings.clearing_account;
    let started = Instant::now();

    let entries = match core.ledger.clearing_entries(account).await {
        Ok(entries) => entries,
        Err(e) => {
            return ComponentHealth::degraded(format!("Wallet backend unreachable: {:#}", e))
                .with_metadata(json!({ "account": account }))
        }
    };
    let elapsed = started.elapsed();

    match clearing_balance(&entries) {
        Ok(0) if elapsed > SLOW_BACKEND => ComponentHealth::degraded(format!(
            "Clearing account is balanced but the backend took {:.2}s",
            elapsed.as_secs_f64()
        ))
        .with_metadata(json!({ "account": account, "entries": entries.len() })),
        Ok(0) => ComponentHealth::healthy("Clearing account is balanced")
            .with_metadata(json!({ "account": account, "entries": entries.len() })),
        Ok(balance) => ComponentHealth::unhealthy("Clearing account is not balanced")
            .with_metadata(json!({ "account": account, "balance": balance })),
        Err(e) => ComponentHealth::unhealthy(e.message)
            .with_metadata(json!({ "account": account })),
    }
}

async fn check_event_bus_health(core: &LnurlCore) -> ComponentHealth {
    let handler_count = core.event_bus.handler_count().await;
    let metadata = json!({ "handler_count": handler_count });

    if handler_count == 0 {
        ComponentHealth::degraded("No event handlers registered").with_metadata(metadata)
    } else {
        ComponentHealth::healthy("Event bus is functioning normally").with_metadata(metadata)
    }
}

async fn check_dollar_rate_health(core: &LnurlCore) -> ComponentHealth {
    match core.rate.msat_per_usd().await {
        Ok(msat_per_usd) => ComponentHealth::healthy("Dollar rate available")
            .with_metadata(json!({ "msat_per_usd": msat_per_usd })),
        // Only the USD estimate in pay prompts is affected
        Err(e) => ComponentHealth::degraded(format!("Dollar rate unavailable: {}", e.message)),
    }
}

fn determine_overall_health(checks: &HashMap<String, ComponentHealth>) -> HealthState {
    if checks.is_empty() {
        return HealthState::Unhealthy;
    }

    checks
        .values()
        .map(|c| c.status)
        .fold(HealthState::Healthy, |overall, status| {
            match (overall, status) {
                (HealthState::Unhealthy, _) | (_, HealthState::Unhealthy) => {
                    HealthState::Unhealthy
                }
                (HealthState::Degraded, _) | (_, HealthState::Degraded) => HealthState::Degraded,
                _ => HealthState::Healthy,
            }
        })
}
