//! UPnP GENA eventing for rusonos.
//!
//! This crate implements the client and receiver side of UPnP eventing:
//! it establishes, renews and tears down event subscriptions against any
//! number of players concurrently, and runs one embedded HTTP server that
//! receives their NOTIFY callbacks and routes each notification back to
//! the subscription it belongs to.
//!
//! # Pieces
//!
//! - [`EventSystem`]: owns everything below; one per application.
//! - [`Subscription`]: one (player, service, handler) tuple; a small state
//!   machine (`New → Subscribed → Unsubscribed`) with an optional
//!   background renewal task.
//! - [`SubscriptionRegistry`]: maps device-assigned SIDs to live
//!   subscriptions, so inbound notifications can be demultiplexed.
//! - [`EventServer`]: the lazily-started callback listener. It binds to
//!   the local interface facing the first subscribed device, on an
//!   ephemeral port, and acknowledges every well-formed NOTIFY before the
//!   handler runs.
//! - [`Event`]: the immutable value handed to handlers: originating
//!   subscription, sequence number, and the parsed property map.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rusonos_events::EventSystem;
//! use rusonos_model::PlayerRegistry;
//! use rusonos_upnp::{Service, SoapClient};
//!
//! # async fn run() -> rusonos_events::Result<()> {
//! let players = Arc::new(PlayerRegistry::new());
//! let events = EventSystem::new(SoapClient::new(), players.clone());
//!
//! let player = players.get_or_create("192.168.1.100:1400".parse().unwrap());
//! let subscription = events
//!     .subscribe(
//!         &player,
//!         Service::AVTransport,
//!         Box::new(|event| println!("{event}: {:?}", event.properties)),
//!         true,
//!     )
//!     .await?;
//!
//! // ... later
//! subscription.unsubscribe().await;
//! events.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! Only the caller's own subscribe/renew calls surface errors. Background
//! renewal failures are logged and retried on the next cycle; if they
//! persist, the device eventually expires the subscription server-side and
//! events simply stop; callers needing to detect that must watch for
//! silence. Unsubscribe never raises: it reports an
//! [`UnsubscribeOutcome`] and tears down local state regardless.

mod config;
mod error;
mod event;
mod registry;
mod server;
mod subscription;
mod system;

pub use config::EventConfig;
pub use error::{EventError, Result};
pub use event::{Event, EventHandler};
pub use registry::SubscriptionRegistry;
pub use server::EventServer;
pub use subscription::{
    Subscription, SubscriptionState, UnsubscribeOutcome, TIMEOUT_INFINITE,
};
pub use system::EventSystem;
