//! Subscription system for live mailbox updates.
//!
//! Every subscriber owns a bounded queue. The capture store pushes
//! `new-email` and `clear` events onto every registered queue while it
//! still holds its mutation lock, so a subscriber sees each email exactly
//! once: either in its initial snapshot or as a later event.
//!
//! Subscribers whose queue fills up are dropped rather than blocking the
//! writer; a dropped viewer reconnects and receives a fresh snapshot.
//!
//! # Example
//!
//! ```ignore
//! let store = CaptureStore::with_capacity(50);
//! let (handle, init) = store.subscribe(SubscriptionConfig::default());
//!
//! for event in handle.iter() {
//!     match event {
//!         MailEvent::Added { email } => println!("got {}", email.subject),
//!         MailEvent::Cleared => println!("cleared"),
//!         MailEvent::Dropped { .. } => break,
//!         MailEvent::Init { .. } => unreachable!(),
//!     }
//! }
//! ```

mod hub;
mod types;

pub use hub::BroadcastHub;
pub use types::{DropReason, MailEvent, SubscriberId, SubscriptionConfig, SubscriptionHandle};
