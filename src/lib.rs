//! # Resend-Pit
//!
//! A local mail pit for development. It accepts the HTTP calls an
//! application makes to a transactional-email provider, keeps the most
//! recent emails in memory and streams them live to any number of viewers.
//!
//! ## Core Concepts
//!
//! - **CaptureStore**: bounded newest-first history; the single writer
//! - **BroadcastHub**: per-viewer bounded queues fed from the store
//! - **MailEvent**: `init` snapshot, then `new-email` / `clear` updates
//! - **Ingestion**: Resend, SES v2 and SES v1 request formats
//!
//! A subscriber sees every email exactly once: either in its `init`
//! snapshot or as one later `new-email` event.
//!
//! ## Example
//!
//! ```ignore
//! use resendpit::{CaptureStore, CapturedEmail, Provider, SubscriptionConfig};
//!
//! let store = CaptureStore::with_capacity(50);
//! let (handle, init) = store.subscribe(SubscriptionConfig::default());
//!
//! store.append(CapturedEmail::new(
//!     Provider::Resend,
//!     "app@example.com",
//!     vec!["user@example.com".into()],
//!     "Welcome",
//! ));
//!
//! let event = handle.recv()?;
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod server;
pub mod store;
pub mod stream;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{PitError, Result};
pub use server::{create_router, AppState};
pub use store::{CaptureStore, StoreConfig, DEFAULT_CAPACITY};
pub use stream::{EventStreamDecoder, MailboxMirror};
pub use subscriptions::{
    BroadcastHub, DropReason, MailEvent, SubscriberId, SubscriptionConfig, SubscriptionHandle,
};
pub use types::*;
