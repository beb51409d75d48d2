use std::collections::VecDeque;

/// Default number of recently notified ids kept per worker.
pub const DEFAULT_TRACKER_CAPACITY: usize = 100;

/// Bounded record of the event ids that already triggered a notification.
///
/// The newest id sits at the front. Once more than `capacity` ids have been
/// tracked the oldest one is evicted, so an id that falls out of the window
/// is reported as unknown again.
#[derive(Debug, Clone)]
pub struct RecencyTracker {
    ids: VecDeque<String>,
    capacity: usize,
}

impl RecencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn already_notified(&self, id: &str) -> bool {
        self.ids.iter().any(|tracked| tracked == id)
    }

    /// Record `id` as notified.
    ///
    /// No membership check: tracking the same id twice stores it twice and
    /// costs one slot of the window.
    pub fn track_notified(&mut self, id: impl Into<String>) {
        self.ids.push_front(id.into());
        if self.ids.len() > self.capacity {
            self.ids.pop_back();
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_id_is_known() {
        let mut tracker = RecencyTracker::new(3);
        assert!(!tracker.already_notified("a"));
        tracker.track_notified("a");
        assert!(tracker.already_notified("a"));
        assert!(!tracker.already_notified("b"));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut tracker = RecencyTracker::new(5);
        for i in 0..50 {
            tracker.track_notified(format!("id{i}"));
            assert!(tracker.len() <= 5);
        }
        assert_eq!(tracker.len(), 5);
    }

    #[test]
    fn evicts_after_capacity_more_ids() {
        let n = DEFAULT_TRACKER_CAPACITY;
        let mut tracker = RecencyTracker::default();
        tracker.track_notified("first");
        for i in 0..n - 1 {
            tracker.track_notified(format!("id{i}"));
        }
        // Still inside the window after N-1 newer ids
        assert!(tracker.already_notified("first"));

        tracker.track_notified("last");
        assert!(!tracker.already_notified("first"));
        assert!(tracker.already_notified("last"));
    }

    #[test]
    fn eviction_follows_insertion_order() {
        let mut tracker = RecencyTracker::new(2);
        tracker.track_notified("a");
        tracker.track_notified("b");
        tracker.track_notified("c");
        assert!(!tracker.already_notified("a"));
        assert!(tracker.already_notified("b"));
        assert!(tracker.already_notified("c"));
    }

    #[test]
    fn double_insert_takes_two_slots() {
        let mut tracker = RecencyTracker::new(3);
        tracker.track_notified("a");
        tracker.track_notified("b");
        tracker.track_notified("b");
        assert_eq!(tracker.len(), 3);

        // The duplicate pushed "a" out one insertion early
        tracker.track_notified("c");
        assert!(!tracker.already_notified("a"));
        assert!(tracker.already_notified("b"));
    }

    #[test]
    fn zero_capacity_tracks_nothing() {
        let mut tracker = RecencyTracker::new(0);
        tracker.track_notified("a");
        assert!(tracker.is_empty());
        assert!(!tracker.already_notified("a"));
    }
}
