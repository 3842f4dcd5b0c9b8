//! The event value delivered to subscription handlers.

use std::fmt;

use rusonos_model::Player;
use rusonos_parsers::Properties;
use rusonos_upnp::Service;

use crate::subscription::Subscription;

/// Callback invoked with each event delivered to a subscription.
///
/// Handlers run on their own task after the device has already been
/// acknowledged, so they may block briefly without stalling the server;
/// panics are caught and logged at the delivery boundary.
pub type EventHandler = Box<dyn Fn(Event) + Send + Sync>;

/// One notification pushed by a device.
///
/// Immutable once constructed. `seq` is the device-assigned sequence
/// number, monotonically increasing per subscription; gaps or regressions
/// indicate lost or reordered delivery and are logged but still delivered.
#[derive(Debug)]
pub struct Event {
    /// The subscription this notification belongs to.
    pub subscription: Subscription,
    /// The player that sent the notification.
    pub player: Player,
    /// The service that evented.
    pub service: Service,
    /// Device-assigned sequence number.
    pub seq: u32,
    /// The evented variables.
    pub properties: Properties,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} #{}",
            self.service.name(),
            self.subscription.sid().as_deref().unwrap_or("?"),
            self.seq
        )
    }
}
