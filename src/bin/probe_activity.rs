//! Probe: marketplace activity feed
//!
//! Hits GET {api}/collections/<symbol>/activities and documents:
//! - Response shape and fields
//! - Which activity types show up and how many we keep
//! - Signature uniqueness across a page (dedup key)
//! - Block time ordering (watermark assumptions)

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use nft_activity_notifier::MAGIC_EDEN_API_BASE;
use nft_activity_notifier::api::{MagicEdenClient, build_http_client, classify, get_json};

#[derive(Parser)]
#[command(name = "probe_activity", about = "Inspect one page of the activity feed")]
struct Args {
    /// Collection symbol
    #[arg(long, default_value = "meekolony")]
    collection: String,

    #[arg(long, default_value_t = 0)]
    offset: u32,

    #[arg(long, default_value_t = 100)]
    limit: u32,

    #[arg(long, default_value = MAGIC_EDEN_API_BASE)]
    api_base: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let http = build_http_client(Duration::from_secs(15))?;
    let url = format!("{}/collections/{}/activities", args.api_base, args.collection);

    println!("=== Probe: activity feed ===");
    println!("Collection: {}", args.collection);
    println!();

    // 1. Raw response
    println!("--- 1. Raw page (offset={}, limit={}) ---", args.offset, args.limit);
    let start = Instant::now();
    let body: Value = get_json(
        &http,
        &url,
        &[
            ("offset", args.offset.to_string()),
            ("limit", args.limit.to_string()),
        ],
    )
    .await?;
    println!("Latency: {:?}", start.elapsed());
    match body.as_array() {
        Some(arr) => {
            println!("Activity count: {}", arr.len());
            if let Some(first) = arr.first() {
                println!("\nSample activity (first):");
                println!("{}", serde_json::to_string_pretty(first)?);
            }
            let mut types: BTreeMap<String, usize> = BTreeMap::new();
            for activity in arr {
                let kind = activity.get("type").and_then(|v| v.as_str()).unwrap_or("?");
                *types.entry(kind.to_string()).or_default() += 1;
            }
            println!("\nTypes:");
            for (kind, count) in &types {
                println!("  {kind}: {count}");
            }
        }
        None => {
            println!("Response is not an array:");
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    println!();

    // 2. Typed + classified
    println!("--- 2. Classified (sales + listings) ---");
    let client = MagicEdenClient::new(http, &args.api_base);
    let raw = client
        .fetch_raw_activity(&args.collection, args.offset, args.limit)
        .await?;
    let total = raw.len();
    let events = classify(raw);
    println!("Kept {} of {} activities", events.len(), total);
    for event in events.iter().take(5) {
        println!("{}", serde_json::to_string(event)?);
    }
    println!();

    // 3. Signature uniqueness and ordering
    println!("--- 3. Dedup key + ordering ---");
    let mut ids = HashSet::new();
    let duplicates = events.iter().filter(|e| !ids.insert(e.id.as_str())).count();
    let out_of_order = events
        .windows(2)
        .filter(|w| w[0].occurred_at < w[1].occurred_at)
        .count();
    println!("  Unique signatures: {}", ids.len());
    println!("  Duplicate signatures: {}", duplicates);
    println!("  Older-before-newer pairs: {}", out_of_order);
    println!();

    println!("=== Probe complete ===");
    Ok(())
}
