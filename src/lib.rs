pub mod api;
pub mod config;
pub mod discord;
pub mod error;
pub mod notifier;
pub mod price;
pub mod queue;
pub mod status;
pub mod tracker;
pub mod twitter;
pub mod types;
pub mod watermark;
pub mod worker;

/// Magic Eden public API base URL (no auth required)
pub const MAGIC_EDEN_API_BASE: &str = "https://api-mainnet.magiceden.dev/v2";

/// Magic Eden item page, append the token mint
pub const MAGIC_EDEN_ITEM_URL: &str = "https://magiceden.io/item-details";

/// Discord REST API base URL
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Twitter API v2 base URL
pub const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

/// Coinbase exchange rates endpoint for SOL
pub const COINBASE_SOL_RATES_URL: &str = "https://api.coinbase.com/v2/exchange-rates?currency=SOL";

/// Solana explorer base URL
pub const SOLSCAN_BASE: &str = "https://solscan.io";
