//! Per-mailbox subscriber registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::event::InboxEvent;

/// Number of undelivered events a subscriber may lag behind before it is
/// dropped.
pub const CHANNEL_CAPACITY: usize = 32;

/// Identity of one registered subscriber.
pub type SubscriberId = u64;

/// Broadcaster of mailbox events to live subscribers.
///
/// Constructed once and shared (in an `Arc`) between the ingestion path
/// and the WebSocket handlers. Nothing is persisted: a subscriber only
/// sees events broadcast while it is registered.
pub struct Broadcaster {
    /// Subscriber channels indexed by mailbox ID.
    subscribers: RwLock<HashMap<String, HashMap<SubscriberId, mpsc::Sender<InboxEvent>>>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a subscriber channel with the standard capacity.
    pub fn channel() -> (mpsc::Sender<InboxEvent>, mpsc::Receiver<InboxEvent>) {
        mpsc::channel(CHANNEL_CAPACITY)
    }

    /// Register a channel for a mailbox.
    pub async fn subscribe(
        &self,
        mailbox_id: &str,
        sender: mpsc::Sender<InboxEvent>,
    ) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .await
            .entry(mailbox_id.to_string())
            .or_default()
            .insert(id, sender);

        debug!(mailbox_id, subscriber_id = id, "Subscriber registered");
        id
    }

    /// Remove a channel, pruning the mailbox entry once it is empty.
    ///
    /// Returns false if the subscriber was not registered, e.g. because a
    /// failed delivery already removed it.
    pub async fn unsubscribe(&self, mailbox_id: &str, subscriber_id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let Some(channels) = subscribers.get_mut(mailbox_id) else {
            return false;
        };

        let removed = channels.remove(&subscriber_id).is_some();
        if channels.is_empty() {
            subscribers.remove(mailbox_id);
        }

        if removed {
            debug!(mailbox_id, subscriber_id, "Subscriber removed");
        }
        removed
    }

    /// Deliver an event to every channel registered for its mailbox.
    ///
    /// A channel that is closed or full is dropped from the registry without
    /// affecting delivery to the others. Returns the number of channels the
    /// event was delivered to.
    pub async fn broadcast(&self, event: &InboxEvent) -> usize {
        let mailbox_id = event.mailbox_id();
        let mut subscribers = self.subscribers.write().await;
        let Some(channels) = subscribers.get_mut(mailbox_id) else {
            return 0;
        };

        let mut delivered = 0;
        channels.retain(|subscriber_id, sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                debug!(mailbox_id, subscriber_id, error = %e, "Dropping dead subscriber");
                false
            }
        });

        if channels.is_empty() {
            subscribers.remove(mailbox_id);
        }
        delivered
    }

    /// Number of channels registered for a mailbox.
    pub async fn subscriber_count(&self, mailbox_id: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(mailbox_id)
            .map_or(0, HashMap::len)
    }

    /// Number of mailboxes with at least one subscriber.
    pub async fn mailbox_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
