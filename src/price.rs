use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::get_json;
use crate::error::FetchError;

/// How long a fetched SOL/USD rate is reused before refreshing.
pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Deserialize)]
struct RatesResponse {
    data: RatesData,
}

#[derive(Debug, Deserialize)]
struct RatesData {
    rates: std::collections::HashMap<String, Decimal>,
}

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    fetched_at: DateTime<Utc>,
}

/// SOL → USD quotes backed by the Coinbase exchange rates endpoint.
///
/// The last rate and its fetch time are kept behind a mutex; a quote
/// refreshes the rate only when it is older than `ttl`. Shared by `Arc`
/// between the formatters.
#[derive(Debug)]
pub struct PriceQuoter {
    http: reqwest::Client,
    url: String,
    ttl: Duration,
    cache: Mutex<Option<CachedRate>>,
}

impl PriceQuoter {
    pub fn new(http: reqwest::Client, url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Price `amount` SOL in USD, formatted with two decimals, or `"N/A"`
    /// when no rate is available.
    pub async fn quote(&self, amount: Decimal) -> String {
        match self.usd_rate().await {
            Some(rate) => format_usd(rate, amount),
            None => "N/A".to_string(),
        }
    }

    /// Current rate, refreshed if stale. A failed refresh falls back to the
    /// previous rate when there is one.
    ///
    /// The cache lock is held across the refresh request, so concurrent
    /// callers share one fetch and wait for it, up to the HTTP client timeout.
    pub async fn usd_rate(&self) -> Option<Decimal> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now();
        if let Some(cached) = *cache {
            if is_fresh(cached.fetched_at, now, self.ttl) {
                return Some(cached.rate);
            }
        }

        match self.fetch_rate().await {
            Ok(rate) => {
                debug!("Refreshed SOL/USD rate: {rate}");
                *cache = Some(CachedRate {
                    rate,
                    fetched_at: now,
                });
                Some(rate)
            }
            Err(e) => {
                warn!("Failed to refresh SOL/USD rate: {e}");
                (*cache).map(|c| c.rate)
            }
        }
    }

    /// Time of the last successful fetch.
    pub async fn last_fetched(&self) -> Option<DateTime<Utc>> {
        let cache = self.cache.lock().await;
        (*cache).map(|c| c.fetched_at)
    }

    async fn fetch_rate(&self) -> Result<Decimal, FetchError> {
        let resp: RatesResponse = get_json(&self.http, &self.url, &[]).await?;
        resp.data
            .rates
            .get("USD")
            .copied()
            .ok_or_else(|| FetchError::MissingField {
                url: self.url.clone(),
                field: "data.rates.USD",
            })
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now - fetched_at < ttl,
        Err(_) => true,
    }
}

/// `rate * amount` rounded to cents.
pub fn format_usd(rate: Decimal, amount: Decimal) -> String {
    format!("{:.2}", (rate * amount).round_dp(2))
}
