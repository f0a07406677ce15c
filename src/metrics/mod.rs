use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// Metric names as constants to avoid typos
pub const LNURL_FLOWS_TOTAL: &str = "lnurld_flows_total";
pub const WITHDRAW_AMOUNT_MSAT: &str = "lnurld_withdraw_amount_msat";

pub const PAYMENTS_TOTAL: &str = "lnurld_payments_total";
pub const PAYMENT_AMOUNT_MSAT: &str = "lnurld_payment_amount_msat";

pub const LEDGER_INVARIANT_VIOLATIONS_TOTAL: &str = "lnurld_ledger_invariant_violations_total";

pub const API_REQUESTS_TOTAL: &str = "lnurld_api_requests_total";
pub const API_REQUEST_DURATION_SECONDS: &str = "lnurld_api_request_duration_seconds";

pub const WEBHOOK_DELIVERIES_TOTAL: &str = "lnurld_webhook_deliveries_total";
pub const WEBHOOK_DELIVERY_DURATION_SECONDS: &str = "lnurld_webhook_delivery_duration_seconds";

pub const EVENT_BUS_EVENTS_TOTAL: &str = "lnurld_event_bus_events_total";

/// Register descriptions for every metric with the installed recorder
pub fn describe_metrics() {
    describe_counter!(LNURL_FLOWS_TOTAL, "LNURL flows completed, by flow and domain");
    describe_histogram!(WITHDRAW_AMOUNT_MSAT, "Withdrawn amounts in millisatoshis");
    describe_counter!(PAYMENTS_TOTAL, "lnurl-pay payments by status");
    describe_histogram!(PAYMENT_AMOUNT_MSAT, "lnurl-pay amounts in millisatoshis");
    describe_counter!(
        LEDGER_INVARIANT_VIOLATIONS_TOTAL,
        "Clearing account balance checks that did not net to zero"
    );
    describe_counter!(API_REQUESTS_TOTAL, "Total API requests");
    describe_histogram!(
        API_REQUEST_DURATION_SECONDS,
        "API request duration in seconds"
    );
    describe_counter!(WEBHOOK_DELIVERIES_TOTAL, "Total webhook delivery attempts");
    describe_histogram!(
        WEBHOOK_DELIVERY_DURATION_SECONDS,
        "Webhook delivery duration in seconds"
    );
    describe_counter!(EVENT_BUS_EVENTS_TOTAL, "Total events published to event bus");
}

/// Install the Prometheus recorder and describe all metrics
#[cfg(feature = "api")]
pub fn init_prometheus_metrics() -> anyhow::Result<metrics_exporter_prometheus::PrometheusHandle>
{
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            EXPONENTIAL_SECONDS,
        )
        .map_err(|e| anyhow::anyhow!("Invalid histogram buckets: {}", e))?
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_metrics();
    tracing::info!("Prometheus metrics collection initialized");
    Ok(handle)
}

/// Recording helpers for the HTTP middleware
pub mod api_metrics {
    use super::*;

    pub fn record_api_request(method: &str, path: &str, status_code: u16, duration: Duration) {
        let status_class = match status_code {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "unknown",
        };

        counter!(
            API_REQUESTS_TOTAL,
            "method" => method.to_string(),
            "endpoint" => path.to_string(),
            "status" => status_class
        )
        .increment(1);

        histogram!(
            API_REQUEST_DURATION_SECONDS,
            "method" => method.to_string(),
            "endpoint" => path.to_string()
        )
        .record(duration.as_secs_f64());

        debug!(
            method = %method,
            path = %path,
            status_code,
            duration_ms = duration.as_millis(),
            "Recorded API request metrics"
        );
    }
}

pub mod webhook_metrics {
    use super::*;

    pub fn record_webhook_delivery(
        endpoint_id: &str,
        kind: &str,
        success: bool,
        duration: Duration,
    ) {
        let status = if success { "success" } else { "failure" };

        counter!(
            WEBHOOK_DELIVERIES_TOTAL,
            "endpoint_id" => endpoint_id.to_string(),
            "kind" => kind.to_string(),
            "status" => status
        )
        .increment(1);

        histogram!(
            WEBHOOK_DELIVERY_DURATION_SECONDS,
            "endpoint_id" => endpoint_id.to_string(),
            "kind" => kind.to_string()
        )
        .record(duration.as_secs_f64());
    }
}
