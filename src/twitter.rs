use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::json;
use sha1::Sha1;
use tracing::info;
use uuid::Uuid;

use crate::MAGIC_EDEN_ITEM_URL;
use crate::api::ActivityFeed;
use crate::error::DispatchError;
use crate::notifier::NotificationBackend;
use crate::price::PriceQuoter;
use crate::types::{ActivityEvent, ActivityKind, Platform};

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters pass through, everything else is encoded.
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

/// OAuth 1.0a user-context keys. None of them expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl OAuth1Credentials {
    /// HMAC-SHA1 signature over the method, URL and every `oauth_*` and
    /// request parameter. JSON bodies are not part of the signature.
    pub fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String, DispatchError> {
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (encode(k), encode(v)))
            .collect();
        pairs.sort();
        let param_string = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let base = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            encode(url),
            encode(&param_string)
        );
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.access_token_secret)
        );

        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| DispatchError::Signing {
                platform: Platform::Twitter,
                message: e.to_string(),
            })?;
        mac.update(base.as_bytes());
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// `Authorization` header value for a request with no query or form
    /// parameters.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, DispatchError> {
        let timestamp = timestamp.to_string();
        let mut oauth = vec![
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];
        let signature = self.signature(method, url, &oauth)?;
        oauth.push(("oauth_signature", signature.as_str()));
        oauth.sort();

        let fields = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {fields}"))
    }
}

/// Posts sales as tweets through the v2 API, signed with OAuth 1.0a.
///
/// Listings are not tweeted.
pub struct TwitterBackend {
    http: reqwest::Client,
    api_base: String,
    credentials: OAuth1Credentials,
    feed: Arc<dyn ActivityFeed>,
    quoter: Arc<PriceQuoter>,
}

impl TwitterBackend {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        credentials: OAuth1Credentials,
        feed: Arc<dyn ActivityFeed>,
        quoter: Arc<PriceQuoter>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
            feed,
            quoter,
        }
    }
}

#[async_trait]
impl NotificationBackend for TwitterBackend {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn supports(&self, kind: ActivityKind) -> bool {
        kind == ActivityKind::Sale
    }

    async fn send(&self, _kind: ActivityKind, event: &ActivityEvent) -> Result<(), DispatchError> {
        let metadata = self
            .feed
            .fetch_token_metadata(&event.token_id)
            .await
            .map_err(|source| DispatchError::Format {
                platform: Platform::Twitter,
                source,
            })?;
        let price_usd = self.quoter.quote(event.price).await;
        let text = tweet_text(&metadata.name, event, &price_usd);

        let url = format!("{}/tweets", self.api_base);
        let nonce = Uuid::new_v4().simple().to_string();
        let authorization =
            self.credentials
                .authorization("POST", &url, &nonce, Utc::now().timestamp())?;
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|source| DispatchError::Request {
                platform: Platform::Twitter,
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                platform: Platform::Twitter,
                status,
                body,
            });
        }

        info!("Tweeted sale of {} ({})", metadata.name, event.id);
        Ok(())
    }
}

pub fn tweet_text(name: &str, event: &ActivityEvent, price_usd: &str) -> String {
    let usd = if price_usd == "N/A" {
        String::new()
    } else {
        format!(" (${price_usd})")
    };
    format!(
        "{name} sold for {} SOL◎{usd} on Magic Eden\n{MAGIC_EDEN_ITEM_URL}/{}",
        event.price.normalize(),
        event.token_id
    )
}
