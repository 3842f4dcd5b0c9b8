//! Player handles and the identity cache that issues them.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Default port on which Sonos players expose their UPnP services.
pub const DEVICE_PORT: u16 = 1400;

/// Metadata learned from topology or device descriptions.
///
/// All fields start out unset; they are filled in (and may be refreshed)
/// whenever zone-group state is parsed.
#[derive(Debug, Default)]
struct PlayerInfo {
    uuid: Option<String>,
    name: Option<String>,
    is_coordinator: Option<bool>,
    is_bridge: Option<bool>,
}

#[derive(Debug)]
struct PlayerInner {
    addr: SocketAddr,
    base_url: String,
    info: RwLock<PlayerInfo>,
}

/// A handle to one remote player, identified by its network address.
///
/// `Player` is a cheap `Arc`-backed clone; all clones obtained from the same
/// [`PlayerRegistry`] for the same address refer to the same logical device
/// and share metadata. Equality and hashing consider only the address.
#[derive(Debug, Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    fn new(addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(PlayerInner {
                addr,
                base_url: format!("http://{addr}/"),
                info: RwLock::new(PlayerInfo::default()),
            }),
        }
    }

    /// The player's socket address (IP plus UPnP port).
    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// The player's IP address.
    pub fn ip(&self) -> IpAddr {
        self.inner.addr.ip()
    }

    /// Base URL of the player's HTTP interface, with a trailing slash
    /// (e.g. `http://192.168.1.100:1400/`).
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The player's unique device id (RINCON uuid), if topology has been seen.
    pub fn uuid(&self) -> Option<String> {
        self.inner.info.read().uuid.clone()
    }

    /// The player's zone name, if topology has been seen.
    pub fn name(&self) -> Option<String> {
        self.inner.info.read().name.clone()
    }

    /// Whether this player coordinates its group. Unknown before the first
    /// topology parse.
    pub fn is_coordinator(&self) -> Option<bool> {
        self.inner.info.read().is_coordinator
    }

    /// Whether this player is an invisible zone bridge.
    pub fn is_bridge(&self) -> Option<bool> {
        self.inner.info.read().is_bridge
    }

    /// Record the uuid and zone name for this player.
    pub fn set_identity(&self, uuid: &str, name: &str) {
        let mut info = self.inner.info.write();
        info.uuid = Some(uuid.to_string());
        info.name = Some(name.to_string());
    }

    /// Record whether this player coordinates its group.
    pub fn set_coordinator(&self, is_coordinator: bool) {
        self.inner.info.write().is_coordinator = Some(is_coordinator);
    }

    /// Record whether this player is a zone bridge.
    pub fn set_bridge(&self, is_bridge: bool) {
        self.inner.info.write().is_bridge = Some(is_bridge);
    }

    /// One-line human description, e.g. `192.168.1.100/RINCON_...: Kitchen`.
    pub fn describe(&self) -> String {
        let info = self.inner.info.read();
        let mut out = self.to_string();
        if let Some(name) = &info.name {
            out.push_str(": ");
            out.push_str(name);
        }
        if info.is_coordinator == Some(true) {
            out.push_str(" (coordinator)");
        }
        out
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uuid() {
            Some(uuid) => write!(f, "{}/{}", self.inner.addr.ip(), uuid),
            None => write!(f, "{}", self.inner.addr.ip()),
        }
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.inner.addr == other.inner.addr
    }
}

impl Eq for Player {}

impl Hash for Player {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.addr.hash(state);
    }
}

/// Identity cache for [`Player`] handles.
///
/// Repeated lookups of the same address yield handles to the same logical
/// device, so metadata recorded during one topology parse is visible to
/// every holder. The registry is an explicit object owned by the top-level
/// application handle rather than a process global, which keeps separate
/// library instances (and tests) isolated from each other.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Mutex<HashMap<SocketAddr, Player>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the player for `addr`, creating it on first sight.
    pub fn get_or_create(&self, addr: SocketAddr) -> Player {
        let mut players = self.players.lock();
        players
            .entry(addr)
            .or_insert_with(|| {
                tracing::debug!(%addr, "new player handle");
                Player::new(addr)
            })
            .clone()
    }

    /// Return the player for `ip` on the standard device port.
    pub fn get_or_create_ip(&self, ip: IpAddr) -> Player {
        self.get_or_create(SocketAddr::new(ip, DEVICE_PORT))
    }

    /// Return the player for `addr` if it has been seen before.
    pub fn get(&self, addr: SocketAddr) -> Option<Player> {
        self.players.lock().get(&addr).cloned()
    }

    /// Snapshot of every player seen so far.
    pub fn players(&self) -> Vec<Player> {
        self.players.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn same_address_yields_same_player() {
        let registry = PlayerRegistry::new();
        let a = registry.get_or_create(addr("192.168.1.100:1400"));
        let b = registry.get_or_create(addr("192.168.1.100:1400"));

        a.set_identity("RINCON_TEST1400", "Kitchen");
        assert_eq!(b.uuid().as_deref(), Some("RINCON_TEST1400"));
        assert_eq!(b.name().as_deref(), Some("Kitchen"));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_addresses_are_distinct() {
        let registry = PlayerRegistry::new();
        let a = registry.get_or_create(addr("192.168.1.100:1400"));
        let b = registry.get_or_create(addr("192.168.1.101:1400"));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn base_url_has_trailing_slash() {
        let registry = PlayerRegistry::new();
        let player = registry.get_or_create(addr("192.168.1.100:1400"));
        assert_eq!(player.base_url(), "http://192.168.1.100:1400/");
    }

    #[test]
    fn display_includes_uuid_once_known() {
        let registry = PlayerRegistry::new();
        let player = registry.get_or_create(addr("10.0.0.7:1400"));
        assert_eq!(player.to_string(), "10.0.0.7");

        player.set_identity("RINCON_ABC", "Den");
        assert_eq!(player.to_string(), "10.0.0.7/RINCON_ABC");
        player.set_coordinator(true);
        assert_eq!(player.describe(), "10.0.0.7/RINCON_ABC: Den (coordinator)");
    }
}
