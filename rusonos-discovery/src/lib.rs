//! SSDP discovery of Sonos players.
//!
//! Sends a multicast M-SEARCH for the ZonePlayer device type and turns the
//! unicast responses into identity-cached [`Player`] handles. Only
//! responses whose SERVER header identifies a Sonos build are accepted, so
//! misbehaving UPnP devices on the network cannot pollute the result.
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use rusonos_model::PlayerRegistry;
//!
//! # async fn run() -> rusonos_discovery::Result<()> {
//! let players = Arc::new(PlayerRegistry::new());
//! let player = rusonos_discovery::discover_one(&players, Duration::from_secs(3)).await?;
//! println!("found {player}");
//! # Ok(())
//! # }
//! ```

mod error;
mod ssdp;

pub use error::{DiscoveryError, Result};

use std::collections::HashSet;
use std::time::Duration;

use rusonos_model::{Player, PlayerRegistry};

use crate::ssdp::SsdpSearch;

/// Discover the local Sonos network and return one arbitrary player.
///
/// Sends the search datagram and resolves as soon as the first valid
/// response arrives; any further responses are ignored. Fails with
/// [`DiscoveryError::Timeout`] if nothing answers within `timeout`.
pub async fn discover_one(players: &PlayerRegistry, timeout: Duration) -> Result<Player> {
    let search = SsdpSearch::begin().await?;
    let deadline = tokio::time::Instant::now() + timeout;

    while let Some(response) = search.next_response(deadline).await? {
        if response.is_sonos() {
            tracing::info!(ip = %response.source_ip, "discovered player");
            return Ok(players.get_or_create_ip(response.source_ip));
        }
        tracing::debug!(ip = %response.source_ip, "ignoring non-Sonos SSDP response");
    }
    Err(DiscoveryError::Timeout)
}

/// Discover every player that answers within `timeout`.
///
/// Unlike [`discover_one`] this always waits out the full timeout, and
/// de-duplicates players that respond more than once. An empty result is
/// not an error; it just means nothing answered.
pub async fn discover_all(players: &PlayerRegistry, timeout: Duration) -> Result<Vec<Player>> {
    let search = SsdpSearch::begin().await?;
    let deadline = tokio::time::Instant::now() + timeout;

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    while let Some(response) = search.next_response(deadline).await? {
        if !response.is_sonos() {
            tracing::debug!(ip = %response.source_ip, "ignoring non-Sonos SSDP response");
            continue;
        }
        if seen.insert(response.source_ip) {
            tracing::info!(ip = %response.source_ip, "discovered player");
            found.push(players.get_or_create_ip(response.source_ip));
        }
    }
    Ok(found)
}
