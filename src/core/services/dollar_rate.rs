use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::AppError;

const MSATS_PER_BTC: f64 = 100_000_000_000.0;

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    msat_per_usd: f64,
    fetched_at: Instant,
}

/// Process-wide BTC/USD rate used for display estimates.
///
/// Refreshed lazily once the cached value is older than `max_age`. A failed
/// refresh falls back to the last good value; only a cold cache surfaces the
/// error. Concurrent refreshes are not deduplicated.
#[derive(Debug)]
pub struct DollarRate {
    http: Client,
    source_url: String,
    max_age: Duration,
    cached: RwLock<Option<CachedRate>>,
}

impl DollarRate {
    pub fn new(http: Client, source_url: impl Into<String>, max_age: Duration) -> Self {
        Self {
            http,
            source_url: source_url.into(),
            max_age,
            cached: RwLock::new(None),
        }
    }

    /// Millisatoshis one dollar buys
    pub async fn msat_per_usd(&self) -> Result<f64, AppError> {
        let cached = *self.cached.read().await;

        if let Some(rate) = cached {
            if rate.fetched_at.elapsed() < self.max_age {
                return Ok(rate.msat_per_usd);
            }
        }

        match self.fetch().await {
            Ok(msat_per_usd) => {
                *self.cached.write().await = Some(CachedRate {
                    msat_per_usd,
                    fetched_at: Instant::now(),
                });
                debug!(msat_per_usd, "Refreshed dollar rate");
                Ok(msat_per_usd)
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!(error = %e, "Dollar rate refresh failed, using stale rate");
                    Ok(stale.msat_per_usd)
                }
                None => Err(e),
            },
        }
    }

    pub async fn to_usd(&self, msat: u64) -> Result<f64, AppError> {
        Ok(msat as f64 / self.msat_per_usd().await?)
    }

    /// `"12.34 USD"`, or `"~ USD"` when no rate is available
    pub async fn format_usd(&self, msat: u64) -> String {
        match self.to_usd(msat).await {
            Ok(usd) => format!("{:.2} USD", usd),
            Err(_) => "~ USD".to_string(),
        }
    }

    async fn fetch(&self) -> Result<f64, AppError> {
        let response = self.http.get(&self.source_url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::network_error(format!(
                "rate source answered {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let btc_usd = match body.get("last") {
            Some(Value::String(s)) => s.parse::<f64>().ok(),
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
        .filter(|rate| *rate > 0.0)
        .ok_or_else(|| AppError::network_error("rate source returned no usable 'last' price"))?;

        Ok(MSATS_PER_BTC / btc_usd)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_rate_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"last": "50000.0"})))
            .expect(1)
            .mount(&server)
            .await;

        let rate = DollarRate::new(Client::new(), server.uri(), Duration::from_secs(3600));

        // 1e11 msat per BTC / 50k USD per BTC
        assert_eq!(rate.msat_per_usd().await.unwrap(), 2_000_000.0);
        assert_eq!(rate.format_usd(5_000_000).await, "2.50 USD");
    }

    #[tokio::test]
    async fn test_stale_rate_survives_failed_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"last": 100000})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let rate = DollarRate::new(Client::new(), server.uri(), Duration::ZERO);

        assert_eq!(rate.msat_per_usd().await.unwrap(), 1_000_000.0);
        assert_eq!(rate.msat_per_usd().await.unwrap(), 1_000_000.0);
    }

    #[tokio::test]
    async fn test_cold_cache_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bid": "1"})))
            .mount(&server)
            .await;

        let rate = DollarRate::new(Client::new(), server.uri(), Duration::from_secs(3600));

        assert!(rate.msat_per_usd().await.is_err());
        assert_eq!(rate.format_usd(1000).await, "~ USD");
    }
}
