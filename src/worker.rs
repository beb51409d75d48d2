use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::{ActivityFeed, DEFAULT_PAGE_SIZE};
use crate::error::FetchError;
use crate::notifier::Notifier;
use crate::tracker::{DEFAULT_TRACKER_CAPACITY, RecencyTracker};
use crate::types::ActivityKind;
use crate::watermark::Watermark;

/// Counters for one `execute` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub fetched: usize,
    pub skipped_old: usize,
    pub duplicates: usize,
    pub dispatched: usize,
}

/// Polls one collection and routes new sales and listings to their notifiers.
///
/// Owns its watermark and recency tracker; `execute` takes `&mut self`, so a
/// worker is only ever driven by one loop.
pub struct ActivityWorker {
    collection: String,
    page_size: u32,
    feed: Arc<dyn ActivityFeed>,
    sales: Notifier,
    listings: Notifier,
    tracker: RecencyTracker,
    watermark: Watermark,
}

impl ActivityWorker {
    /// Worker whose watermark starts at the current time.
    pub fn new(
        collection: impl Into<String>,
        feed: Arc<dyn ActivityFeed>,
        sales: Notifier,
        listings: Notifier,
    ) -> Self {
        Self {
            collection: collection.into(),
            page_size: DEFAULT_PAGE_SIZE,
            feed,
            sales,
            listings,
            tracker: RecencyTracker::new(DEFAULT_TRACKER_CAPACITY),
            watermark: Watermark::starting_now(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_tracker_capacity(mut self, capacity: usize) -> Self {
        self.tracker = RecencyTracker::new(capacity);
        self
    }

    pub fn with_notify_after(mut self, notify_after: DateTime<Utc>) -> Self {
        self.watermark = Watermark::new(notify_after);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn notify_after(&self) -> DateTime<Utc> {
        self.watermark.notify_after()
    }

    /// One polling cycle.
    ///
    /// A fetch failure returns early with the watermark untouched. Dispatch is
    /// queued per event and never awaited here.
    pub async fn execute(&mut self) -> Result<CycleSummary, FetchError> {
        let events = self
            .feed
            .fetch_recent_activity(&self.collection, 0, self.page_size)
            .await?;

        let mut summary = CycleSummary {
            fetched: events.len(),
            ..Default::default()
        };
        let mut max_seen: Option<DateTime<Utc>> = None;

        for event in &events {
            if !self.watermark.admits(event.occurred_at) {
                summary.skipped_old += 1;
                continue;
            }
            max_seen = max_seen.max(Some(event.occurred_at));

            // Don't notify if the transaction was previously notified
            if self.tracker.already_notified(&event.id) {
                warn!("Duplicate {} ignored: {}", event.kind, event.id);
                summary.duplicates += 1;
                continue;
            }

            match event.kind {
                ActivityKind::Listing => self.listings.notify(ActivityKind::Listing, event),
                ActivityKind::Sale => self.sales.notify(ActivityKind::Sale, event),
            }
            self.tracker.track_notified(event.id.clone());
            summary.dispatched += 1;
        }

        // Cut off after this batch
        self.watermark.advance(max_seen);

        debug!(
            collection = %self.collection,
            notify_after = %self.watermark.notify_after(),
            tracked = self.tracker.len(),
            "Cycle done: {:?}",
            summary
        );
        Ok(summary)
    }

    /// Run `execute` every `period` forever. Errors are logged and the next
    /// tick retries.
    pub async fn run(mut self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Polling {} every {}s (notify after {})",
            self.collection,
            period.as_secs(),
            self.watermark.notify_after()
        );

        loop {
            interval.tick().await;
            match self.execute().await {
                Ok(summary) if summary.dispatched > 0 => {
                    info!(
                        "{}: dispatched {} new event(s)",
                        self.collection, summary.dispatched
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("{}: poll cycle error: {e}", self.collection),
            }
        }
    }
}
