use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of marketplace activity we notify about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Sale,
    Listing,
}

impl ActivityKind {
    /// Map the feed's `type` tag. Kinds other than sales and listings
    /// (bids, delistings, cancelled bids...) yield `None`.
    pub fn from_feed_tag(tag: &str) -> Option<Self> {
        match tag {
            "buyNow" => Some(Self::Sale),
            "list" => Some(Self::Listing),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sale => f.write_str("sale"),
            Self::Listing => f.write_str("listing"),
        }
    }
}

/// Notification back-end platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Discord,
    Twitter,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discord => f.write_str("Discord"),
            Self::Twitter => f.write_str("Twitter"),
        }
    }
}

/// One sale or listing entry of the activity feed as returned by the
/// marketplace API. Rows of other kinds are not decoded into this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    pub signature: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub source: Option<String>,
    pub token_mint: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// A classified sale or listing observed on the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEvent {
    /// Transaction signature, unique per event.
    pub id: String,
    pub kind: ActivityKind,
    pub occurred_at: DateTime<Utc>,
    /// Price in SOL.
    pub price: Decimal,
    pub seller: Option<String>,
    pub buyer: Option<String>,
    pub token_id: String,
    pub collection: Option<String>,
    pub source: Option<String>,
}

impl ActivityEvent {
    /// Classify a raw feed entry. Returns `None` for kinds we ignore.
    ///
    /// A missing `blockTime` maps to the unix epoch, which places the event
    /// behind any realistic watermark.
    pub fn from_raw(raw: RawActivity) -> Option<Self> {
        let kind = ActivityKind::from_feed_tag(&raw.kind)?;
        let occurred_at = DateTime::from_timestamp(raw.block_time.unwrap_or(0), 0)
            .unwrap_or(DateTime::UNIX_EPOCH);
        Some(Self {
            id: raw.signature,
            kind,
            occurred_at,
            price: raw.price.unwrap_or_default(),
            seller: raw.seller,
            buyer: raw.buyer,
            token_id: raw.token_mint,
            collection: raw.collection,
            source: raw.source,
        })
    }
}

/// Token metadata used to decorate notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(kind: &str, block_time: Option<i64>) -> RawActivity {
        RawActivity {
            signature: "sig".to_string(),
            kind: kind.to_string(),
            source: Some("magiceden_v2".to_string()),
            token_mint: "mint".to_string(),
            collection: Some("meekolony".to_string()),
            block_time,
            seller: Some("seller".to_string()),
            buyer: None,
            price: Some(dec!(1.5)),
        }
    }

    #[test]
    fn feed_tags_map_to_kinds() {
        assert_eq!(ActivityKind::from_feed_tag("list"), Some(ActivityKind::Listing));
        assert_eq!(ActivityKind::from_feed_tag("buyNow"), Some(ActivityKind::Sale));
        assert_eq!(ActivityKind::from_feed_tag("bid"), None);
        assert_eq!(ActivityKind::from_feed_tag("delist"), None);
        assert_eq!(ActivityKind::from_feed_tag("cancelBid"), None);
    }

    #[test]
    fn from_raw_keeps_payload() {
        let event = ActivityEvent::from_raw(raw("buyNow", Some(1_650_000_000))).unwrap();
        assert_eq!(event.id, "sig");
        assert_eq!(event.kind, ActivityKind::Sale);
        assert_eq!(event.occurred_at.timestamp(), 1_650_000_000);
        assert_eq!(event.price, dec!(1.5));
        assert_eq!(event.token_id, "mint");
        assert_eq!(event.seller.as_deref(), Some("seller"));
        assert!(event.buyer.is_none());
    }

    #[test]
    fn from_raw_missing_block_time_is_epoch() {
        let event = ActivityEvent::from_raw(raw("list", None)).unwrap();
        assert_eq!(event.occurred_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn from_raw_drops_ignored_kinds() {
        assert!(ActivityEvent::from_raw(raw("bid", Some(1))).is_none());
    }

    #[test]
    fn raw_activity_deserializes_feed_json() {
        let json = r#"{
            "signature": "5abc",
            "type": "list",
            "source": "magiceden_v2",
            "tokenMint": "Mint111",
            "collection": "meekolony",
            "slot": 130000000,
            "blockTime": 1650000000,
            "buyer": null,
            "buyerReferral": "",
            "seller": "Seller111",
            "sellerReferral": "",
            "price": 12.5
        }"#;
        let raw: RawActivity = serde_json::from_str(json).unwrap();
        assert_eq!(raw.kind, "list");
        assert_eq!(raw.block_time, Some(1_650_000_000));
        assert_eq!(raw.price, Some(dec!(12.5)));
        assert!(raw.buyer.is_none());
    }

    #[test]
    fn null_price_reads_as_zero() {
        let json = r#"{"signature": "s", "type": "list", "tokenMint": "m", "price": null}"#;
        let raw: RawActivity = serde_json::from_str(json).unwrap();
        assert!(raw.price.is_none());
        assert_eq!(ActivityEvent::from_raw(raw).unwrap().price, Decimal::ZERO);
    }
}
