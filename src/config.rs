use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::twitter::OAuth1Credentials;
use crate::{COINBASE_SOL_RATES_URL, DISCORD_API_BASE, MAGIC_EDEN_API_BASE, TWITTER_API_BASE};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Largest page the activity endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// Discord bot credentials. An empty token disables Discord.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
}

/// Twitter OAuth 1.0a keys. All four empty disables Twitter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_key_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_token_secret: String,
}

impl TwitterConfig {
    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("api_key", &self.api_key),
            ("api_key_secret", &self.api_key_secret),
            ("access_token", &self.access_token),
            ("access_token_secret", &self.access_token_secret),
        ]
    }

    /// Signing keys, or `None` when Twitter is not configured.
    pub fn credentials(&self) -> Option<OAuth1Credentials> {
        if self.fields().iter().any(|(_, v)| v.trim().is_empty()) {
            return None;
        }
        Some(OAuth1Credentials {
            consumer_key: self.api_key.clone(),
            consumer_secret: self.api_key_secret.clone(),
            access_token: self.access_token.clone(),
            access_token_secret: self.access_token_secret.clone(),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = self.fields();
        if fields.iter().all(|(_, v)| v.trim().is_empty()) {
            return Ok(());
        }
        match fields.iter().find(|(_, v)| v.trim().is_empty()) {
            Some((field, _)) => {
                Err(ConfigError::IncompleteTwitterCredentials { field: *field })
            }
            None => Ok(()),
        }
    }
}

/// One tracked collection and the channels its events go to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Marketplace collection symbol, e.g. `meekolony`.
    pub collection: String,
    pub sales_discord_channel_id: String,
    pub listings_discord_channel_id: String,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Polling interval in seconds for each worker.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Number of notification jobs allowed to run at once, process-wide.
    #[serde(default = "default_queue_concurrency")]
    pub queue_concurrency: usize,

    /// Recently notified ids remembered per worker.
    #[serde(default = "default_tracker_capacity")]
    pub tracker_capacity: usize,

    /// Activities fetched per poll.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Port for the status route. `None` disables it.
    #[serde(default)]
    pub status_port: Option<u16>,

    #[serde(default = "default_marketplace_api")]
    pub marketplace_api_base: String,

    #[serde(default = "default_discord_api")]
    pub discord_api_base: String,

    #[serde(default = "default_twitter_api")]
    pub twitter_api_base: String,

    #[serde(default = "default_price_url")]
    pub price_url: String,

    /// How long a SOL/USD rate is reused, in seconds.
    #[serde(default = "default_price_ttl")]
    pub price_ttl_secs: u64,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_queue_concurrency() -> usize {
    crate::queue::DEFAULT_QUEUE_CONCURRENCY
}

fn default_tracker_capacity() -> usize {
    crate::tracker::DEFAULT_TRACKER_CAPACITY
}

fn default_page_size() -> u32 {
    crate::api::DEFAULT_PAGE_SIZE
}

fn default_http_timeout() -> u64 {
    15
}

fn default_marketplace_api() -> String {
    MAGIC_EDEN_API_BASE.to_string()
}

fn default_discord_api() -> String {
    DISCORD_API_BASE.to_string()
}

fn default_twitter_api() -> String {
    TWITTER_API_BASE.to_string()
}

fn default_price_url() -> String {
    COINBASE_SOL_RATES_URL.to_string()
}

fn default_price_ttl() -> u64 {
    crate::price::DEFAULT_RATE_TTL.as_secs()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            queue_concurrency: default_queue_concurrency(),
            tracker_capacity: default_tracker_capacity(),
            page_size: default_page_size(),
            http_timeout_secs: default_http_timeout(),
            status_port: None,
            marketplace_api_base: default_marketplace_api(),
            discord_api_base: default_discord_api(),
            twitter_api_base: default_twitter_api(),
            price_url: default_price_url(),
            price_ttl_secs: default_price_ttl(),
        }
    }
}

impl SettingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Like `load`, but a missing file yields the defaults so the whole
    /// config can come from the environment.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides.
    ///
    /// `DISCORD_BOT_TOKEN`, the four Twitter keys (`TWITTER_API_KEY`,
    /// `TWITTER_API_KEY_SECRET`, `TWITTER_ACCESS_TOKEN`,
    /// `TWITTER_ACCESS_TOKEN_SECRET`) and `QUEUE_CONCURRENCY` replace their
    /// settings. When no subscription is configured,
    /// `COLLECTION` with `SUBSCRIPTION_DISCORD_LISTING_CHANNEL_ID` (and
    /// `SUBSCRIPTION_DISCORD_CHANNEL_ID` for sales) adds one.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DISCORD_BOT_TOKEN") {
            self.discord.bot_token = token;
        }
        for (key, slot) in [
            ("TWITTER_API_KEY", &mut self.twitter.api_key),
            ("TWITTER_API_KEY_SECRET", &mut self.twitter.api_key_secret),
            ("TWITTER_ACCESS_TOKEN", &mut self.twitter.access_token),
            ("TWITTER_ACCESS_TOKEN_SECRET", &mut self.twitter.access_token_secret),
        ] {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        }
        if let Some(raw) = lookup("QUEUE_CONCURRENCY") {
            self.settings.queue_concurrency =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "QUEUE_CONCURRENCY",
                    value: raw.clone(),
                })?;
        }

        if self.subscriptions.is_empty() {
            if let (Some(collection), Some(listings)) = (
                lookup("COLLECTION"),
                lookup("SUBSCRIPTION_DISCORD_LISTING_CHANNEL_ID"),
            ) {
                self.subscriptions.push(Subscription {
                    collection,
                    sales_discord_channel_id: lookup("SUBSCRIPTION_DISCORD_CHANNEL_ID")
                        .unwrap_or_default(),
                    listings_discord_channel_id: listings,
                });
            }
        }
        Ok(())
    }

    /// Check that every subscription is complete and settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscriptions.is_empty() {
            return Err(ConfigError::NoSubscriptions);
        }
        for (index, sub) in self.subscriptions.iter().enumerate() {
            if sub.collection.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    index,
                    field: "collection",
                });
            }
            if sub.sales_discord_channel_id.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    index,
                    field: "sales_discord_channel_id",
                });
            }
            if sub.listings_discord_channel_id.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    index,
                    field: "listings_discord_channel_id",
                });
            }
        }

        self.twitter.validate()?;

        let s = &self.settings;
        if s.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs", s.poll_interval_secs));
        }
        if s.queue_concurrency == 0 {
            return Err(invalid("queue_concurrency", s.queue_concurrency));
        }
        if s.tracker_capacity == 0 {
            return Err(invalid("tracker_capacity", s.tracker_capacity));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&s.page_size) {
            return Err(invalid("page_size", s.page_size));
        }

        for (key, value) in [
            ("marketplace_api_base", &s.marketplace_api_base),
            ("discord_api_base", &s.discord_api_base),
            ("twitter_api_base", &s.twitter_api_base),
            ("price_url", &s.price_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl { key, source })?;
        }
        Ok(())
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn subscription() -> Subscription {
        Subscription {
            collection: "meekolony".to_string(),
            sales_discord_channel_id: "111".to_string(),
            listings_discord_channel_id: "222".to_string(),
        }
    }

    #[test]
    fn loads_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[discord]
bot_token = "abc"

[settings]
poll_interval_secs = 30

[[subscriptions]]
collection = "meekolony"
sales_discord_channel_id = "111"
listings_discord_channel_id = "222"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.discord.bot_token, "abc");
        assert!(config.twitter.credentials().is_none());
        assert_eq!(config.settings.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.settings.queue_concurrency, 2);
        assert_eq!(config.settings.tracker_capacity, 100);
        assert_eq!(config.settings.page_size, 100);
        assert_eq!(config.settings.marketplace_api_base, MAGIC_EDEN_API_BASE);
        assert_eq!(config.subscriptions, vec![subscription()]);
        config.validate().unwrap();
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "settings = [").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(config.subscriptions.is_empty());
        assert!(matches!(
            AppConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn env_builds_subscription_and_overrides_secrets() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("DISCORD_BOT_TOKEN", "bot"),
                ("TWITTER_API_KEY", "key"),
                ("TWITTER_API_KEY_SECRET", "key-secret"),
                ("TWITTER_ACCESS_TOKEN", "tw"),
                ("TWITTER_ACCESS_TOKEN_SECRET", "tw-secret"),
                ("QUEUE_CONCURRENCY", "4"),
                ("COLLECTION", "meekolony"),
                ("SUBSCRIPTION_DISCORD_CHANNEL_ID", "111"),
                ("SUBSCRIPTION_DISCORD_LISTING_CHANNEL_ID", "222"),
            ]))
            .unwrap();
        assert_eq!(config.discord.bot_token, "bot");
        let creds = config.twitter.credentials().unwrap();
        assert_eq!(creds.consumer_key, "key");
        assert_eq!(creds.consumer_secret, "key-secret");
        assert_eq!(creds.access_token, "tw");
        assert_eq!(creds.access_token_secret, "tw-secret");
        assert_eq!(config.settings.queue_concurrency, 4);
        assert_eq!(config.subscriptions, vec![subscription()]);
    }

    #[test]
    fn env_does_not_duplicate_file_subscriptions() {
        let mut config = AppConfig {
            subscriptions: vec![subscription()],
            ..Default::default()
        };
        config
            .apply_env(env(&[
                ("COLLECTION", "other"),
                ("SUBSCRIPTION_DISCORD_LISTING_CHANNEL_ID", "333"),
            ]))
            .unwrap();
        assert_eq!(config.subscriptions, vec![subscription()]);
    }

    #[test]
    fn bad_concurrency_env_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("QUEUE_CONCURRENCY", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "QUEUE_CONCURRENCY",
                ..
            }
        ));
    }

    #[test]
    fn validate_requires_subscription_fields() {
        assert!(matches!(
            AppConfig::default().validate(),
            Err(ConfigError::NoSubscriptions)
        ));

        let mut config = AppConfig {
            subscriptions: vec![subscription()],
            ..Default::default()
        };
        config.subscriptions[0].collection = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField {
                index: 0,
                field: "collection"
            })
        ));

        config.subscriptions[0] = subscription();
        config.subscriptions[0].sales_discord_channel_id = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField {
                field: "sales_discord_channel_id",
                ..
            })
        ));

        // Env path without a sales channel leaves it empty
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("COLLECTION", "meekolony"),
                ("SUBSCRIPTION_DISCORD_LISTING_CHANNEL_ID", "222"),
            ]))
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut config = AppConfig {
            subscriptions: vec![subscription()],
            ..Default::default()
        };
        config.settings.page_size = MAX_PAGE_SIZE + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                key: "page_size",
                ..
            })
        ));

        config.settings = SettingsConfig::default();
        config.settings.discord_api_base = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl {
                key: "discord_api_base",
                ..
            })
        ));
    }

    #[test]
    fn partial_twitter_credentials_are_rejected() {
        let mut config = AppConfig {
            subscriptions: vec![subscription()],
            ..Default::default()
        };
        config.validate().unwrap();

        config.twitter.api_key = "key".to_string();
        config.twitter.access_token = "tw".to_string();
        assert!(config.twitter.credentials().is_none());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompleteTwitterCredentials {
                field: "api_key_secret"
            })
        ));

        config.twitter.api_key_secret = "key-secret".to_string();
        config.twitter.access_token_secret = "tw-secret".to_string();
        config.validate().unwrap();
        assert!(config.twitter.credentials().is_some());
    }
}
