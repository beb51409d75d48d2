use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use crate::api::ActivityFeed;
use crate::error::DispatchError;
use crate::notifier::NotificationBackend;
use crate::price::PriceQuoter;
use crate::types::{ActivityEvent, ActivityKind, Platform, TokenMetadata};
use crate::{MAGIC_EDEN_ITEM_URL, SOLSCAN_BASE};

const EMBED_COLOR: u32 = 0x0099ff;
const MARKETPLACE_NAME: &str = "Magic Eden";
const MARKETPLACE_ICON_URL: &str = "https://www.magiceden.io/img/favicon.png";

/// Discord bot client shared by every channel back-end.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    feed: Arc<dyn ActivityFeed>,
    quoter: Arc<PriceQuoter>,
}

impl DiscordClient {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        feed: Arc<dyn ActivityFeed>,
        quoter: Arc<PriceQuoter>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            feed,
            quoter,
        }
    }

    /// Post `event` as an embed message to `channel_id`.
    pub async fn notify_activity(
        &self,
        channel_id: &str,
        kind: ActivityKind,
        event: &ActivityEvent,
    ) -> Result<(), DispatchError> {
        let metadata = self
            .feed
            .fetch_token_metadata(&event.token_id)
            .await
            .map_err(|source| DispatchError::Format {
                platform: Platform::Discord,
                source,
            })?;
        let price_usd = self.quoter.quote(event.price).await;
        let message = build_message(kind, event, &metadata, &price_usd);

        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.bot_token))
            .json(&message)
            .send()
            .await
            .map_err(|source| DispatchError::Request {
                platform: Platform::Discord,
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                platform: Platform::Discord,
                status,
                body,
            });
        }

        info!(
            "Notified discord #{}: {} - {}",
            channel_id,
            metadata.name,
            describe(kind, event)
        );
        Ok(())
    }
}

/// Discord back-end bound to one channel.
pub struct DiscordBackend {
    client: Arc<DiscordClient>,
    channel_id: String,
}

impl DiscordBackend {
    pub fn new(client: Arc<DiscordClient>, channel_id: impl Into<String>) -> Self {
        Self {
            client,
            channel_id: channel_id.into(),
        }
    }
}

#[async_trait]
impl NotificationBackend for DiscordBackend {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    async fn send(&self, kind: ActivityKind, event: &ActivityEvent) -> Result<(), DispatchError> {
        self.client
            .notify_activity(&self.channel_id, kind, event)
            .await
    }
}

/// One-line summary, e.g. `Sold for 1.5 SOL◎ on Magic Eden`.
pub fn describe(kind: ActivityKind, event: &ActivityEvent) -> String {
    let verb = match kind {
        ActivityKind::Sale => "Sold",
        ActivityKind::Listing => "Listed",
    };
    format!("{verb} for {} SOL◎ on {MARKETPLACE_NAME}", event.price.normalize())
}

/// Shorten an address to `abcd...wxyz`.
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

fn account_link(address: Option<&str>) -> String {
    match address {
        Some(addr) if !addr.is_empty() => {
            format!("[{}]({SOLSCAN_BASE}/account/{addr})", truncate_address(addr))
        }
        _ => "unknown".to_string(),
    }
}

fn link_button(label: &str, url: String) -> Value {
    json!({"type": 2, "style": 5, "label": label, "url": url})
}

/// Build the message body (embed plus link buttons) for a sale or listing.
pub fn build_message(
    kind: ActivityKind,
    event: &ActivityEvent,
    metadata: &TokenMetadata,
    price_usd: &str,
) -> Value {
    let item_url = format!("{MAGIC_EDEN_ITEM_URL}/{}", event.token_id);
    let price = event.price.normalize();

    let (fields, footer, buttons) = match kind {
        ActivityKind::Sale => (
            vec![
                json!({"name": "Price", "value": format!("{price} SOL◎"), "inline": false}),
                json!({"name": "Price (USD)", "value": format!("`{price_usd}`"), "inline": true}),
                json!({"name": "Buyer", "value": account_link(event.buyer.as_deref()), "inline": true}),
                json!({"name": "Seller", "value": account_link(event.seller.as_deref()), "inline": true}),
            ],
            format!("Sold on {MARKETPLACE_NAME}"),
            vec![
                link_button("View Transaction", format!("{SOLSCAN_BASE}/tx/{}", event.id)),
                link_button("View Token", format!("{SOLSCAN_BASE}/token/{}", event.token_id)),
            ],
        ),
        ActivityKind::Listing => (
            vec![
                json!({"name": "Price (SOL◎)", "value": format!("`{price}`"), "inline": true}),
                json!({"name": "Price (USD)", "value": format!("`{price_usd}`"), "inline": true}),
                json!({"name": "Seller", "value": account_link(event.seller.as_deref()), "inline": true}),
            ],
            format!("Listed on {MARKETPLACE_NAME}"),
            vec![link_button(
                "View Token",
                format!("{SOLSCAN_BASE}/token/{}", event.token_id),
            )],
        ),
    };

    json!({
        "embeds": [{
            "color": EMBED_COLOR,
            "title": metadata.name,
            "url": item_url,
            "timestamp": event.occurred_at.to_rfc3339(),
            "fields": fields,
            "image": {"url": metadata.image},
            "footer": {"text": footer, "icon_url": MARKETPLACE_ICON_URL},
        }],
        "components": [{"type": 1, "components": buttons}],
    })
}
