//! Publish/subscribe channel for sync lifecycle events.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::SyncResult;

/// Lifecycle event of a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Started,
    Progress {
        collection: String,
        uploaded: usize,
        downloaded: usize,
        conflicts: usize,
    },
    Completed {
        success: bool,
        timestamp: DateTime<Utc>,
        results: BTreeMap<String, SyncResult>,
    },
}

/// Identifies one subscriber for `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Subscribers = BTreeMap<SubscriptionId, mpsc::UnboundedSender<SyncEvent>>;

/// Fan-out of `SyncEvent`s with FIFO delivery per subscriber.
///
/// Each subscriber owns an unbounded queue, so a slow reader never loses
/// events and never blocks the engine. Events are not persisted.
#[derive(Clone, Default)]
pub struct SyncStatusChannel {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl SyncStatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving events published from now on
    pub fn subscribe(&self) -> StatusSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().insert(id, sender);
        StatusSubscription { id, receiver }
    }

    /// Stop delivering to `id`; returns whether it was subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Deliver `event` to every live subscriber, pruning dropped ones
    pub fn publish(&self, event: &SyncEvent) {
        self.lock()
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of a status subscription. Dropping it unsubscribes.
pub struct StatusSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<SyncEvent>,
}

impl StatusSubscription {
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, `None` after `unsubscribe`
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.receiver.recv().await
    }

    /// Next already-queued event without waiting
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(collection: &str) -> SyncEvent {
        SyncEvent::Progress {
            collection: collection.to_string(),
            uploaded: 0,
            downloaded: 0,
            conflicts: 0,
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let channel = SyncStatusChannel::new();
        let mut subscription = channel.subscribe();

        channel.publish(&SyncEvent::Started);
        channel.publish(&progress("products"));
        channel.publish(&progress("invoices"));

        assert_eq!(subscription.recv().await, Some(SyncEvent::Started));
        assert_eq!(subscription.recv().await, Some(progress("products")));
        assert_eq!(subscription.recv().await, Some(progress("invoices")));
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event() {
        let channel = SyncStatusChannel::new();
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();
        assert_ne!(first.id(), second.id());

        channel.publish(&SyncEvent::Started);

        assert_eq!(first.try_recv(), Some(SyncEvent::Started));
        assert_eq!(second.try_recv(), Some(SyncEvent::Started));
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_queue() {
        let channel = SyncStatusChannel::new();
        let mut subscription = channel.subscribe();

        assert!(channel.unsubscribe(subscription.id()));
        assert!(!channel.unsubscribe(subscription.id()));
        channel.publish(&SyncEvent::Started);

        assert_eq!(subscription.recv().await, None);
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let channel = SyncStatusChannel::new();
        let kept = channel.subscribe();
        drop(channel.subscribe());
        assert_eq!(channel.subscriber_count(), 2);

        channel.publish(&SyncEvent::Started);
        assert_eq!(channel.subscriber_count(), 1);
        drop(kept);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(progress("products")).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["collection"], "products");
    }
}
