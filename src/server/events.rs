//! Server-Sent Events adapter over a hub subscription.
//!
//! Each connection gets its own subscription. A forwarding thread moves
//! events from the subscriber's queue into the async response stream; the
//! keepalive comment is interleaved by axum on the same stream.

use super::AppState;
use crate::error::PitError;
use crate::subscriptions::{BroadcastHub, MailEvent, SubscriberId, SubscriptionHandle};
use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events buffered between the forwarding thread and the HTTP body.
const FORWARD_BUFFER: usize = 16;

/// Unsubscribes when dropped, i.e. when the client goes away.
pub struct SubscriptionGuard {
    hub: Arc<BroadcastHub>,
    id: SubscriberId,
}

impl SubscriptionGuard {
    pub fn new(hub: Arc<BroadcastHub>, id: SubscriberId) -> Self {
        Self { hub, id }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

/// `GET /events` and `GET /api/events`
pub async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    let (handle, init) = state.store.subscribe(state.subscription.clone());
    let hub = Arc::clone(state.store.hub());
    let guard = SubscriptionGuard::new(Arc::clone(&hub), handle.id);

    let (tx, rx) = mpsc::channel(FORWARD_BUFFER);
    spawn_forwarder(handle, tx, hub);

    let sse = Sse::new(event_stream(init, rx, guard))
        .keep_alive(KeepAlive::new().interval(state.keepalive).text("keepalive"));

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
}

/// The `init` snapshot followed by live events until the subscription ends.
fn event_stream(
    init: MailEvent,
    rx: mpsc::Receiver<MailEvent>,
    guard: SubscriptionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let live = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        match rx.recv().await {
            Some(MailEvent::Dropped { reason }) => {
                debug!(subscriber = %guard.id(), ?reason, "Event stream closed by hub");
                None
            }
            Some(event) => Some((event, (rx, guard))),
            None => None,
        }
    });

    stream::once(async move { init })
        .chain(live)
        .filter_map(|event| async move { to_sse(&event).map(Ok) })
}

fn to_sse(event: &MailEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().data(data)),
        Err(e) => {
            warn!(error = %e, event = event.kind(), "Cannot encode event");
            None
        }
    }
}

/// Drain the subscriber's queue into the response channel on a dedicated
/// thread. Ends when the hub releases the subscriber or the client leaves.
fn spawn_forwarder(
    handle: SubscriptionHandle,
    tx: mpsc::Sender<MailEvent>,
    hub: Arc<BroadcastHub>,
) {
    let id = handle.id;
    let thread_hub = Arc::clone(&hub);

    let spawned = thread::Builder::new()
        .name(format!("resendpit-{}", id))
        .spawn(move || {
            for event in handle.iter() {
                if let Err(e) = tx.blocking_send(event) {
                    let err = PitError::Transport(e.to_string());
                    debug!(subscriber = %id, error = %err, "Viewer disconnected");
                    break;
                }
            }
            thread_hub.unsubscribe(id);
        });

    if let Err(e) = spawned {
        warn!(subscriber = %id, error = %e, "Cannot start event forwarder");
        hub.unsubscribe(id);
    }
}
