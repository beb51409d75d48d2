use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::types::{ActivityEvent, ActivityKind, RawActivity, TokenMetadata};

/// Default page size when polling the activity feed.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Source of marketplace activity.
#[async_trait]
pub trait ActivityFeed: Send + Sync {
    /// Fetch one page of recent activity for `collection`, newest first,
    /// keeping only sales and listings.
    async fn fetch_recent_activity(
        &self,
        collection: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<ActivityEvent>, FetchError>;

    /// Fetch display metadata (name, image) for a token mint.
    async fn fetch_token_metadata(&self, mint: &str) -> Result<TokenMetadata, FetchError>;
}

/// Build the shared HTTP client with a request timeout.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Magic Eden v2 REST client.
#[derive(Debug, Clone)]
pub struct MagicEdenClient {
    http: reqwest::Client,
    base_url: String,
}

impl MagicEdenClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// Fetch one page of the raw, unfiltered feed. Rows are left as JSON so
    /// that kinds we ignore never have to match the sale/listing shape.
    pub async fn fetch_raw_activity(
        &self,
        collection: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}/collections/{}/activities", self.base_url, collection);
        get_json(
            &self.http,
            &url,
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
        )
        .await
    }
}

#[async_trait]
impl ActivityFeed for MagicEdenClient {
    async fn fetch_recent_activity(
        &self,
        collection: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<ActivityEvent>, FetchError> {
        let raw = self.fetch_raw_activity(collection, offset, limit).await?;
        let total = raw.len();
        let events = classify(raw);
        debug!(
            "Fetched {} activities for {} ({} sales/listings)",
            total,
            collection,
            events.len()
        );
        Ok(events)
    }

    async fn fetch_token_metadata(&self, mint: &str) -> Result<TokenMetadata, FetchError> {
        let url = format!("{}/tokens/{}", self.base_url, mint);
        get_json(&self.http, &url, &[]).await
    }
}

/// Keep sales and listings, in feed order.
///
/// Rows are filtered on their `type` tag before anything else is decoded.
/// A sale or listing row that does not decode is logged and skipped.
pub fn classify(page: Vec<Value>) -> Vec<ActivityEvent> {
    page.into_iter()
        .filter_map(|row| {
            let kind = row
                .get("type")
                .and_then(Value::as_str)
                .and_then(ActivityKind::from_feed_tag)?;
            match serde_json::from_value::<RawActivity>(row) {
                Ok(raw) => ActivityEvent::from_raw(raw),
                Err(e) => {
                    warn!("Skipping malformed {kind} activity: {e}");
                    None
                }
            }
        })
        .collect()
}

/// GET `url` and decode a JSON body, mapping each failure stage to a
/// `FetchError` that carries the URL.
pub async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, FetchError> {
    let resp = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = resp.status();
    let bytes = resp.bytes().await.map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
    })?;

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}
