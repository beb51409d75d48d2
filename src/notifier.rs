use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::discord::{DiscordBackend, DiscordClient};
use crate::error::DispatchError;
use crate::queue::{DispatchQueue, NotificationJob};
use crate::twitter::TwitterBackend;
use crate::types::{ActivityEvent, ActivityKind, Platform};

/// One delivery target on one platform (a Discord channel, a Twitter account).
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether this back-end posts events of `kind`.
    fn supports(&self, _kind: ActivityKind) -> bool {
        true
    }

    async fn send(&self, kind: ActivityKind, event: &ActivityEvent) -> Result<(), DispatchError>;
}

/// Fans an event out to its back-ends through the shared dispatch queue.
#[derive(Clone)]
pub struct Notifier {
    backends: Vec<Arc<dyn NotificationBackend>>,
    queue: DispatchQueue,
}

impl Notifier {
    pub fn new(queue: DispatchQueue, backends: Vec<Arc<dyn NotificationBackend>>) -> Self {
        Self { backends, queue }
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.backends.iter().map(|b| b.platform()).collect()
    }

    /// Queue one job per back-end that supports `kind`. Returns once the
    /// jobs are queued; delivery happens in the background.
    pub fn notify(&self, kind: ActivityKind, event: &ActivityEvent) {
        let payload = serde_json::to_string(event).unwrap_or_else(|_| format!("{event:?}"));
        for backend in &self.backends {
            if !backend.supports(kind) {
                continue;
            }
            let platform = backend.platform();
            debug!(platform = %platform, id = %event.id, "Queueing {kind} notification");

            let backend = backend.clone();
            let event = event.clone();
            let label = format!("{kind} {}", event.id);
            self.queue.push(NotificationJob::new(
                platform,
                label,
                payload.clone(),
                async move { backend.send(kind, &event).await },
            ));
        }
    }
}

/// Builds notifiers that share the process-wide queue and platform clients.
pub struct NotifierFactory {
    queue: DispatchQueue,
    discord: Option<Arc<DiscordClient>>,
    twitter: Option<Arc<TwitterBackend>>,
}

impl NotifierFactory {
    pub fn new(
        queue: DispatchQueue,
        discord: Option<Arc<DiscordClient>>,
        twitter: Option<Arc<TwitterBackend>>,
    ) -> Self {
        Self {
            queue,
            discord,
            twitter,
        }
    }

    /// Notifier posting to `discord_channel_id`, plus Twitter when configured.
    pub fn create(&self, discord_channel_id: &str) -> Notifier {
        let mut backends: Vec<Arc<dyn NotificationBackend>> = Vec::new();
        if let Some(client) = &self.discord {
            backends.push(Arc::new(DiscordBackend::new(
                client.clone(),
                discord_channel_id,
            )));
        }
        if let Some(twitter) = &self.twitter {
            backends.push(twitter.clone());
        }
        Notifier::new(self.queue.clone(), backends)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingBackend;
    use super::*;
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    fn shared(backend: &Arc<RecordingBackend>) -> Arc<dyn NotificationBackend> {
        backend.clone()
    }

    fn event(id: &str, kind: ActivityKind) -> ActivityEvent {
        ActivityEvent {
            id: id.to_string(),
            kind,
            occurred_at: DateTime::from_timestamp(100, 0).unwrap(),
            price: dec!(1),
            seller: Some("seller".to_string()),
            buyer: None,
            token_id: "mint".to_string(),
            collection: None,
            source: None,
        }
    }

    #[tokio::test]
    async fn notify_enqueues_one_job_per_backend() {
        let queue = DispatchQueue::new(2);
        let discord = RecordingBackend::new(Platform::Discord);
        let twitter = RecordingBackend::new(Platform::Twitter);
        let notifier = Notifier::new(queue.clone(), vec![shared(&discord), shared(&twitter)]);

        notifier.notify(ActivityKind::Sale, &event("a", ActivityKind::Sale));
        queue.idle().await;

        assert_eq!(discord.sent(), vec![(ActivityKind::Sale, "a".to_string())]);
        assert_eq!(twitter.sent(), vec![(ActivityKind::Sale, "a".to_string())]);
        assert_eq!(queue.status().total_notified, 2);
    }

    #[tokio::test]
    async fn failing_platform_does_not_block_sibling() {
        let queue = DispatchQueue::new(1);
        let discord = RecordingBackend::failing(Platform::Discord);
        let twitter = RecordingBackend::new(Platform::Twitter);
        let notifier = Notifier::new(queue.clone(), vec![shared(&discord), shared(&twitter)]);

        notifier.notify(ActivityKind::Sale, &event("a", ActivityKind::Sale));
        notifier.notify(ActivityKind::Sale, &event("b", ActivityKind::Sale));
        queue.idle().await;

        assert_eq!(discord.sent().len(), 2);
        assert_eq!(twitter.sent().len(), 2);
        let status = queue.status();
        assert_eq!(status.total_failed, 2);
        assert_eq!(status.total_notified, 2);
    }

    #[tokio::test]
    async fn unsupported_kind_is_skipped() {
        let queue = DispatchQueue::new(2);
        let discord = RecordingBackend::new(Platform::Discord);
        let sales_only = Arc::new(RecordingBackend {
            platform: Platform::Twitter,
            only: Some(ActivityKind::Sale),
            fail: false,
            sent: std::sync::Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(queue.clone(), vec![shared(&discord), shared(&sales_only)]);

        notifier.notify(ActivityKind::Listing, &event("l", ActivityKind::Listing));
        queue.idle().await;

        assert_eq!(discord.sent().len(), 1);
        assert!(sales_only.sent().is_empty());
    }

    #[tokio::test]
    async fn factory_without_clients_builds_empty_notifier() {
        let queue = DispatchQueue::new(2);
        let factory = NotifierFactory::new(queue.clone(), None, None);
        let notifier = factory.create("123");
        assert!(notifier.platforms().is_empty());

        notifier.notify(ActivityKind::Sale, &event("a", ActivityKind::Sale));
        queue.idle().await;
        assert_eq!(queue.status().total_notified, 0);
    }
}
