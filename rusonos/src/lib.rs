//! Async client library for Sonos households.
//!
//! rusonos discovers the players on your network, queries and controls
//! their playback and queues over UPnP/SOAP, and keeps long-lived event
//! subscriptions alive so topology, transport and track changes are pushed
//! to you instead of polled.
//!
//! Everything hangs off one [`Sonos`] handle. It owns the HTTP session,
//! the player identity cache, and the eventing machinery (subscription
//! registry plus the embedded callback server); dropping all of that when
//! you [`close`](Sonos::close) is the whole shutdown story. There are no
//! process globals, so independent handles, in tests or in one process,
//! never see each other's state.
//!
//! ```no_run
//! use std::time::Duration;
//! use rusonos::{Service, Sonos};
//!
//! # async fn run() -> rusonos::Result<()> {
//! let sonos = Sonos::new();
//!
//! let player = sonos.discover_one(Duration::from_secs(3)).await?;
//! let network = sonos.get_group_state(&player).await?;
//! for group in &network.groups {
//!     println!("{group}");
//!     for member in &group.members {
//!         println!("  {}", member.describe());
//!     }
//! }
//!
//! // Push notifications: transport events from one coordinator.
//! let coordinator = network.coordinators().remove(0);
//! sonos
//!     .subscribe(
//!         &coordinator,
//!         Service::AVTransport,
//!         Box::new(|event| println!("{event}")),
//!         true,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod track;

pub use error::{Result, SonosError};
pub use track::{TrackInfo, TransportInfo};

pub use rusonos_discovery::DiscoveryError;
pub use rusonos_events::{
    Event, EventConfig, EventError, EventHandler, Subscription, SubscriptionState,
    UnsubscribeOutcome, TIMEOUT_INFINITE,
};
pub use rusonos_model::{Group, Network, Player, PlayerRegistry};
pub use rusonos_parsers::{DidlItem, DidlResource, ParseError, Properties, PropertyValue};
pub use rusonos_upnp::{Service, SoapClient, UpnpError};

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rusonos_events::EventSystem;
use rusonos_parsers::{parse_didl, parse_zone_group_state};

/// Handle to one Sonos household.
///
/// Cheap enough to share behind an `Arc`; all operations take `&self`.
pub struct Sonos {
    soap: SoapClient,
    players: Arc<PlayerRegistry>,
    events: EventSystem,
}

impl Sonos {
    /// Create a handle with default configuration.
    pub fn new() -> Self {
        let soap = SoapClient::new();
        let players = Arc::new(PlayerRegistry::new());
        let events = EventSystem::new(soap.clone(), players.clone());
        Self {
            soap,
            players,
            events,
        }
    }

    /// Create a handle with custom eventing configuration.
    pub fn with_config(config: EventConfig) -> Result<Self> {
        let soap = SoapClient::new();
        let players = Arc::new(PlayerRegistry::new());
        let events = EventSystem::with_config(soap.clone(), players.clone(), config)?;
        Ok(Self {
            soap,
            players,
            events,
        })
    }

    /// The player identity cache.
    pub fn players(&self) -> &Arc<PlayerRegistry> {
        &self.players
    }

    /// Return the player for an IP address, on the standard device port.
    ///
    /// Performs no I/O and does not validate that anything actually lives
    /// there. Identity-cached: the same address always yields the same
    /// logical player.
    pub fn get_player(&self, ip: IpAddr) -> Player {
        self.players.get_or_create_ip(ip)
    }

    /// Return the player for a full socket address.
    pub fn get_player_at(&self, addr: SocketAddr) -> Player {
        self.players.get_or_create(addr)
    }

    /// Discover the local network and return one arbitrary player.
    pub async fn discover_one(&self, timeout: Duration) -> Result<Player> {
        Ok(rusonos_discovery::discover_one(&self.players, timeout).await?)
    }

    /// Discover every player that answers within the timeout.
    pub async fn discover_all(&self, timeout: Duration) -> Result<Vec<Player>> {
        Ok(rusonos_discovery::discover_all(&self.players, timeout).await?)
    }

    /// Fetch and parse the household topology, as seen by `player`.
    ///
    /// Also refreshes the uuid/name/coordinator metadata of every player
    /// handle the topology mentions.
    pub async fn get_group_state(&self, player: &Player) -> Result<Network> {
        let args = self
            .soap
            .send_command(
                player.base_url(),
                Service::ZoneGroupTopology,
                "GetZoneGroupState",
                &[],
            )
            .await?;
        let xml = args
            .get("ZoneGroupState")
            .ok_or(SonosError::MissingArgument("ZoneGroupState"))?;
        Ok(parse_zone_group_state(xml, &self.players)?)
    }

    /// Current playback state (playing/paused/stopped) of `player`.
    pub async fn get_transport_info(&self, player: &Player) -> Result<TransportInfo> {
        let args = self
            .soap
            .send_command(
                player.base_url(),
                Service::AVTransport,
                "GetTransportInfo",
                &[("InstanceID", "0")],
            )
            .await?;
        Ok(TransportInfo::from_args(&args))
    }

    /// Information about the track `player` is currently playing.
    ///
    /// Fields that cannot be determined come back as empty strings; radio
    /// streams and line-in sources carry very little metadata. Note that
    /// asking a non-coordinator returns the last track *that speaker*
    /// played, not what its group is playing.
    pub async fn get_current_track_info(&self, player: &Player) -> Result<TrackInfo> {
        let args = self
            .soap
            .send_command(
                player.base_url(),
                Service::AVTransport,
                "GetPositionInfo",
                &[("InstanceID", "0"), ("Channel", "Master")],
            )
            .await?;
        tracing::debug!(?args, "GetPositionInfo result");
        Ok(track::parse_track_info(&args))
    }

    /// List the play queue of `player` (up to `limit` items, 0 for the
    /// device default).
    pub async fn get_queue(&self, player: &Player, limit: u32) -> Result<Vec<DidlItem>> {
        let requested = if limit == 0 { 100 } else { limit }.to_string();
        let args = self
            .soap
            .send_command(
                player.base_url(),
                Service::ContentDirectory,
                "Browse",
                &[
                    ("ObjectID", "Q:0"),
                    ("BrowseFlag", "BrowseDirectChildren"),
                    ("Filter", "*"),
                    ("StartingIndex", "0"),
                    ("RequestedCount", &requested),
                    ("SortCriteria", ""),
                ],
            )
            .await?;
        let didl = args
            .get("Result")
            .ok_or(SonosError::MissingArgument("Result"))?;
        Ok(parse_didl(didl)?)
    }

    /// Remove every track from the queue of `player`.
    pub async fn clear_queue(&self, player: &Player) -> Result<()> {
        self.soap
            .send_command(
                player.base_url(),
                Service::AVTransport,
                "RemoveAllTracksFromQueue",
                &[("InstanceID", "0")],
            )
            .await?;
        Ok(())
    }

    /// Subscribe `handler` to `service` events from `player`.
    ///
    /// Starts the embedded callback server on first use. With `auto_renew`
    /// the subscription re-subscribes itself shortly before each expiry
    /// until unsubscribed or [`close`](Sonos::close)d.
    pub async fn subscribe(
        &self,
        player: &Player,
        service: Service,
        handler: EventHandler,
        auto_renew: bool,
    ) -> Result<Subscription> {
        Ok(self
            .events
            .subscribe(player, service, handler, auto_renew)
            .await?)
    }

    /// Every live subscription for one player.
    pub fn subscriptions_for(&self, player: &Player) -> Vec<Subscription> {
        self.events.list_for_player(player)
    }

    /// Best-effort teardown of every live subscription.
    pub async fn unsubscribe_all(&self) -> Vec<UnsubscribeOutcome> {
        self.events.unsubscribe_all().await
    }

    /// Release every resource held by this handle: unsubscribe everything
    /// and stop the callback server.
    pub async fn close(&self) {
        self.events.shutdown().await;
    }

    /// Send a raw SOAP action to a player. The escape hatch for operations
    /// this crate has no wrapper for yet.
    pub async fn send_command(
        &self,
        player: &Player,
        service: Service,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<HashMap<String, String>> {
        Ok(self
            .soap
            .send_command(player.base_url(), service, action, args)
            .await?)
    }
}

impl Default for Sonos {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_player_is_identity_cached() {
        let sonos = Sonos::new();
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        let a = sonos.get_player(ip);
        let b = sonos.get_player(ip);
        assert_eq!(a, b);
        a.set_identity("RINCON_X", "Kitchen");
        assert_eq!(b.name().as_deref(), Some("Kitchen"));
    }

    #[test]
    fn separate_handles_are_isolated() {
        let first = Sonos::new();
        let second = Sonos::new();
        let ip: IpAddr = "192.168.1.100".parse().unwrap();

        first.get_player(ip).set_identity("RINCON_X", "Kitchen");
        assert!(second.get_player(ip).name().is_none());
    }
}
