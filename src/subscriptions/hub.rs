//! Broadcast hub fanning mailbox events out to subscribers.

use crate::store::CaptureStore;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::types::{DropReason, MailEvent, SubscriberId, SubscriptionConfig, SubscriptionHandle};

/// Internal subscriber state.
struct Subscriber {
    sender: Sender<MailEvent>,
}

impl Subscriber {
    /// Hand an event to the subscriber's queue without blocking.
    fn offer(&self, event: MailEvent) -> Result<(), DeliveryFailure> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryFailure::Full),
            Err(TrySendError::Disconnected(_)) => Err(DeliveryFailure::Gone),
        }
    }
}

enum DeliveryFailure {
    /// Queue at capacity (slow consumer).
    Full,
    /// Receiver dropped.
    Gone,
}

/// Manages subscribers and broadcasts mailbox events.
///
/// Registration happens under the capture store's mutation lock (see
/// [`BroadcastHub::subscribe`]), and the store publishes while holding that
/// same lock, so no event can fall between a snapshot and registration.
pub struct BroadcastHub {
    /// Active subscribers by ID.
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    /// Counter for generating subscriber IDs.
    next_id: AtomicU64,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber and capture its replay snapshot atomically.
    ///
    /// Returns the handle for subsequent events and the `Init` event holding
    /// the snapshot. Every email appended after the snapshot arrives on the
    /// handle as exactly one `Added` event.
    ///
    /// `store` must be the store this hub is attached to.
    pub fn subscribe(
        &self,
        store: &CaptureStore,
        config: SubscriptionConfig,
    ) -> (SubscriptionHandle, MailEvent) {
        debug_assert!(
            std::ptr::eq(self, store.hub().as_ref()),
            "subscribe called with a store attached to a different hub"
        );

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        let emails = store.with_history(|history| {
            self.subscribers.write().insert(id, Subscriber { sender });
            history.iter().cloned().collect::<Vec<_>>()
        });

        debug!(subscriber = %id, replayed = emails.len(), "Subscriber registered");

        (SubscriptionHandle { id, receiver }, MailEvent::Init { emails })
    }

    /// Unsubscribe and release the subscriber's queue.
    ///
    /// Idempotent; removing an unknown or already removed id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let removed = self.subscribers.write().remove(&id);
        if let Some(sub) = removed {
            // Best effort, the consumer may already be gone.
            let _ = sub.offer(MailEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
            debug!(subscriber = %id, "Subscriber removed");
        }
    }

    /// Release every subscriber, ending their streams.
    pub fn unsubscribe_all(&self) {
        let drained: Vec<_> = self.subscribers.write().drain().collect();
        for (_, sub) in &drained {
            let _ = sub.offer(MailEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "All subscribers removed");
        }
    }

    /// Whether a subscriber is still registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an event to every registered subscriber.
    ///
    /// Never blocks: full or disconnected subscribers are dropped after the
    /// pass. Returns the number of subscribers the event was queued for.
    pub(crate) fn publish(&self, event: &MailEvent) -> usize {
        let mut failed = Vec::new();
        let mut delivered = 0;

        {
            let subs = self.subscribers.read();
            for (id, sub) in subs.iter() {
                match sub.offer(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(failure) => failed.push((*id, failure)),
                }
            }
        }

        if !failed.is_empty() {
            let mut subs = self.subscribers.write();
            for (id, failure) in failed {
                let Some(sub) = subs.remove(&id) else {
                    continue;
                };
                match failure {
                    DeliveryFailure::Full => {
                        warn!(subscriber = %id, event = event.kind(), "Dropping slow subscriber");
                        let _ = sub.offer(MailEvent::Dropped {
                            reason: DropReason::BufferOverflow,
                        });
                    }
                    DeliveryFailure::Gone => {
                        debug!(subscriber = %id, "Subscriber disconnected");
                    }
                }
            }
        }

        delivered
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapturedEmail, Provider};
    use std::sync::Arc;
    use std::time::Duration;

    fn make_email(subject: &str) -> CapturedEmail {
        CapturedEmail::new(
            Provider::Resend,
            "dev@example.com",
            vec!["user@example.com".to_string()],
            subject,
        )
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let store = CaptureStore::with_capacity(10);
        let hub = store.hub();

        let (handle, init) = hub.subscribe(&store, SubscriptionConfig::default());
        assert_eq!(init, MailEvent::Init { emails: vec![] });
        assert_eq!(hub.subscriber_count(), 1);
        assert!(hub.contains(handle.id));

        hub.unsubscribe(handle.id);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!hub.contains(handle.id));

        // Removal notice, then the channel closes.
        let notice = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(
            notice,
            MailEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        );
        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let store = CaptureStore::with_capacity(10);
        let (handle, _) = store.subscribe(SubscriptionConfig::default());

        store.hub().unsubscribe(handle.id);
        store.hub().unsubscribe(handle.id);
        store.hub().unsubscribe(SubscriberId(9999));
        assert_eq!(store.hub().subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_all_closes_every_channel() {
        let store = CaptureStore::with_capacity(10);
        let (a, _) = store.subscribe(SubscriptionConfig::default());
        let (b, _) = store.subscribe(SubscriptionConfig::default());

        store.hub().unsubscribe_all();
        assert_eq!(store.hub().subscriber_count(), 0);

        for handle in [a, b] {
            let events: Vec<_> = handle.iter().collect();
            assert_eq!(
                events,
                vec![MailEvent::Dropped {
                    reason: DropReason::Unsubscribed
                }]
            );
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let store = CaptureStore::with_capacity(10);
        let (a, _) = store.subscribe(SubscriptionConfig::default());
        store.hub().unsubscribe(a.id);
        let (b, _) = store.subscribe(SubscriptionConfig::default());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let store = CaptureStore::with_capacity(10);
        let (a, _) = store.subscribe(SubscriptionConfig::default());
        let (b, _) = store.subscribe(SubscriptionConfig::default());

        let email = Arc::new(make_email("fan-out"));
        let delivered = store.hub().publish(&MailEvent::Added {
            email: email.clone(),
        });
        assert_eq!(delivered, 2);

        for handle in [&a, &b] {
            match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
                MailEvent::Added { email: got } => assert_eq!(got.id, email.id),
                other => panic!("Expected Added event, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let store = CaptureStore::with_capacity(100);
        let (_slow, _) = store.subscribe(SubscriptionConfig { buffer_size: 2 });
        let (fast, _) = store.subscribe(SubscriptionConfig { buffer_size: 64 });

        for i in 0..10 {
            store.append(make_email(&format!("message {}", i)));
        }

        // Slow subscriber is gone, the healthy one kept everything.
        assert_eq!(store.hub().subscriber_count(), 1);
        assert!(store.hub().contains(fast.id));
        assert_eq!(fast.receiver.len(), 10);
    }

    #[test]
    fn test_dropped_handle_is_unregistered_on_publish() {
        let store = CaptureStore::with_capacity(10);
        let (handle, _) = store.subscribe(SubscriptionConfig::default());
        drop(handle);

        assert_eq!(store.hub().subscriber_count(), 1);
        store.append(make_email("after drop"));
        assert_eq!(store.hub().subscriber_count(), 0);
    }
}
