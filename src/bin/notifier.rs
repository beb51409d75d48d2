use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use nft_activity_notifier::api::{ActivityFeed, MagicEdenClient, build_http_client};
use nft_activity_notifier::config::{AppConfig, CONFIG_PATH};
use nft_activity_notifier::discord::DiscordClient;
use nft_activity_notifier::notifier::NotifierFactory;
use nft_activity_notifier::price::PriceQuoter;
use nft_activity_notifier::queue::DispatchQueue;
use nft_activity_notifier::status;
use nft_activity_notifier::twitter::TwitterBackend;
use nft_activity_notifier::worker::ActivityWorker;

/// How long to wait for queued notifications on shutdown.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(
    name = "notifier",
    about = "Forward NFT marketplace sales and listings to Discord and Twitter"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Serve the status page on this port (overrides settings.status_port)
    #[arg(long)]
    status_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Load config
    let mut config = AppConfig::load_or_default(&args.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config
        .validate()
        .with_context(|| format!("invalid configuration ({})", args.config.display()))?;
    info!("Loaded config from {}", args.config.display());

    let settings = &config.settings;
    let http = build_http_client(settings.http_timeout()).context("failed to build HTTP client")?;

    let feed: Arc<dyn ActivityFeed> = Arc::new(MagicEdenClient::new(
        http.clone(),
        &settings.marketplace_api_base,
    ));
    let quoter = Arc::new(PriceQuoter::new(
        http.clone(),
        &settings.price_url,
        settings.price_ttl(),
    ));

    let discord = if config.discord.bot_token.is_empty() {
        warn!("No Discord bot token configured, Discord notifications disabled");
        None
    } else {
        Some(Arc::new(DiscordClient::new(
            http.clone(),
            &settings.discord_api_base,
            &config.discord.bot_token,
            feed.clone(),
            quoter.clone(),
        )))
    };
    let twitter = match config.twitter.credentials() {
        Some(credentials) => Some(Arc::new(TwitterBackend::new(
            http.clone(),
            &settings.twitter_api_base,
            credentials,
            feed.clone(),
            quoter.clone(),
        ))),
        None => {
            info!("No Twitter keys configured, sales will not be tweeted");
            None
        }
    };
    if discord.is_none() && twitter.is_none() {
        warn!("No notification platform configured, events will only be logged");
    }

    let queue = DispatchQueue::new(settings.queue_concurrency);
    let factory = NotifierFactory::new(queue.clone(), discord, twitter);

    let mut tasks = Vec::new();

    if let Some(port) = args.status_port.or(settings.status_port) {
        let queue = queue.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = status::serve(port, queue).await {
                warn!("Status server stopped: {e}");
            }
        }));
    }

    for sub in &config.subscriptions {
        let worker = ActivityWorker::new(
            sub.collection.clone(),
            feed.clone(),
            factory.create(&sub.sales_discord_channel_id),
            factory.create(&sub.listings_discord_channel_id),
        )
        .with_page_size(settings.page_size)
        .with_tracker_capacity(settings.tracker_capacity);
        tasks.push(tokio::spawn(worker.run(settings.poll_interval())));
    }

    info!(
        "Started {} worker(s) (poll={}s, queue concurrency={}). Press Ctrl+C to stop.",
        config.subscriptions.len(),
        settings.poll_interval_secs,
        queue.concurrency(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    for task in &tasks {
        task.abort();
    }

    let pending = queue.pending();
    if pending > 0 {
        info!("Waiting for {pending} queued notification(s)...");
        if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, queue.idle())
            .await
            .is_err()
        {
            warn!(
                "Gave up on {} notification(s) after {}s",
                queue.pending(),
                SHUTDOWN_DRAIN_TIMEOUT.as_secs()
            );
        }
    }

    let summary = queue.status();
    info!(
        "Sent {} notification(s), {} failed",
        summary.total_notified, summary.total_failed
    );
    Ok(())
}
