//! Subscription types for live mailbox updates.

use crate::error::PitError;
use crate::types::CapturedEmail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before the subscriber is dropped.
    /// Default: 256
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 256 }
    }
}

/// Events delivered to subscribers.
///
/// The wire form is an internally tagged JSON object, e.g.
/// `{"type":"new-email","email":{...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MailEvent {
    /// Snapshot of the mailbox, newest first. Always the first event.
    #[serde(rename = "init")]
    Init { emails: Vec<Arc<CapturedEmail>> },

    /// An email was captured.
    #[serde(rename = "new-email")]
    Added { email: Arc<CapturedEmail> },

    /// The mailbox was emptied.
    #[serde(rename = "clear")]
    Cleared,

    /// The subscription was removed by the hub.
    #[serde(rename = "dropped")]
    Dropped { reason: DropReason },
}

impl MailEvent {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            MailEvent::Init { .. } => "init",
            MailEvent::Added { .. } => "new-email",
            MailEvent::Cleared => "clear",
            MailEvent::Dropped { .. } => "dropped",
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription. Never reused within a hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle to receive events after the initial snapshot.
///
/// Dropping the handle disconnects the channel; the hub unregisters the
/// subscriber on its next publish.
pub struct SubscriptionHandle {
    pub id: SubscriberId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<MailEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    ///
    /// Fails with [`PitError::SubscriptionDropped`] once the hub has released
    /// this subscriber and its queue is drained.
    pub fn recv(&self) -> crate::error::Result<MailEvent> {
        self.receiver
            .recv()
            .map_err(|_| PitError::SubscriptionDropped)
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<MailEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<MailEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Blocking iterator that ends once the hub releases the subscriber.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, MailEvent> {
        self.receiver.iter()
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}
