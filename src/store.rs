//! Bounded in-memory capture store.

use crate::subscriptions::{BroadcastHub, MailEvent, SubscriberId, SubscriptionConfig, SubscriptionHandle};
use crate::types::CapturedEmail;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Default number of emails retained.
pub const DEFAULT_CAPACITY: usize = 50;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum number of emails retained. Values below 1 are treated as 1.
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// The capture store.
///
/// Holds the most recent `capacity` emails, newest first. The history mutex
/// is the single serialization point for the whole system: appends, clears
/// and subscriber registration all run under it, and events are published
/// to the hub before the lock is released.
pub struct CaptureStore {
    capacity: usize,

    /// Newest at the front.
    history: Mutex<VecDeque<Arc<CapturedEmail>>>,

    hub: Arc<BroadcastHub>,
}

impl CaptureStore {
    /// Create a store publishing to `hub`.
    pub fn new(config: StoreConfig, hub: Arc<BroadcastHub>) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            capacity,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            hub,
        }
    }

    /// Create a store with its own hub.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(StoreConfig { capacity }, Arc::new(BroadcastHub::new()))
    }

    /// Capture an email, evicting the oldest one if over capacity.
    ///
    /// Subscribers registered before this call receive exactly one `Added`
    /// event for the email; later subscribers see it in their snapshot.
    pub fn append(&self, email: CapturedEmail) -> Arc<CapturedEmail> {
        let email = Arc::new(email);
        let mut history = self.history.lock();

        history.push_front(Arc::clone(&email));
        let evicted = if history.len() > self.capacity {
            history.pop_back()
        } else {
            None
        };

        let delivered = self.hub.publish(&MailEvent::Added {
            email: Arc::clone(&email),
        });

        debug!(
            id = %email.id,
            count = history.len(),
            evicted = ?evicted.as_ref().map(|e| e.id),
            subscribers = delivered,
            "Email captured"
        );

        email
    }

    /// Remove every email and notify subscribers.
    pub fn clear(&self) {
        let mut history = self.history.lock();
        let removed = history.len();
        history.clear();

        let delivered = self.hub.publish(&MailEvent::Cleared);
        debug!(removed, subscribers = delivered, "Mailbox cleared");
    }

    /// Point-in-time copy of the history, newest first.
    pub fn snapshot(&self) -> Vec<Arc<CapturedEmail>> {
        self.history.lock().iter().cloned().collect()
    }

    /// Current number of stored emails.
    pub fn count(&self) -> usize {
        self.history.lock().len()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The hub this store publishes to.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Subscribe to live updates. See [`BroadcastHub::subscribe`].
    pub fn subscribe(&self, config: SubscriptionConfig) -> (SubscriptionHandle, MailEvent) {
        self.hub.subscribe(self, config)
    }

    /// Remove a subscriber. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.hub.unsubscribe(id)
    }

    /// Run `f` against the history while holding the mutation lock.
    pub(crate) fn with_history<R>(&self, f: impl FnOnce(&VecDeque<Arc<CapturedEmail>>) -> R) -> R {
        let history = self.history.lock();
        f(&history)
    }
}

impl Default for CaptureStore {
    fn default() -> Self {
        Self::new(StoreConfig::default(), Arc::new(BroadcastHub::new()))
    }
}
