use chrono::{DateTime, Utc};

/// Monotonic "notify after" cursor over the activity feed.
///
/// Events strictly older than the cursor are skipped. Events exactly at the
/// cursor are admitted and left to the recency tracker to dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    notify_after: DateTime<Utc>,
}

impl Watermark {
    pub fn new(notify_after: DateTime<Utc>) -> Self {
        Self { notify_after }
    }

    /// Cursor starting at the current time, so history is never replayed.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn notify_after(&self) -> DateTime<Utc> {
        self.notify_after
    }

    pub fn admits(&self, occurred_at: DateTime<Utc>) -> bool {
        occurred_at >= self.notify_after
    }

    /// Move the cursor to `max_seen` if it is ahead. `None` (nothing admitted
    /// this cycle) leaves the cursor where it is.
    pub fn advance(&mut self, max_seen: Option<DateTime<Utc>>) {
        if let Some(seen) = max_seen {
            if seen > self.notify_after {
                self.notify_after = seen;
            }
        }
    }
}
