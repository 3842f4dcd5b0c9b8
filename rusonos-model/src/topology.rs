//! Snapshot types for the household topology.

use std::fmt;

use crate::Player;

/// One zone group: a coordinator and the players grouped with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub uuid: String,
    pub coordinator: Player,
    pub members: Vec<Player>,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

/// The whole household as seen in one zone-group-state document.
///
/// `visible_players` excludes invisible members such as zone bridges;
/// `all_players` includes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub groups: Vec<Group>,
    pub visible_players: Vec<Player>,
    pub all_players: Vec<Player>,
}

impl Network {
    /// The coordinator of every group, in group order.
    pub fn coordinators(&self) -> Vec<Player> {
        self.groups.iter().map(|g| g.coordinator.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlayerRegistry;

    #[test]
    fn coordinators_follow_group_order() {
        let registry = PlayerRegistry::new();
        let a = registry.get_or_create("192.168.1.10:1400".parse().unwrap());
        let b = registry.get_or_create("192.168.1.11:1400".parse().unwrap());

        let network = Network {
            groups: vec![
                Group {
                    uuid: "RINCON_A:1".into(),
                    coordinator: a.clone(),
                    members: vec![a.clone()],
                },
                Group {
                    uuid: "RINCON_B:7".into(),
                    coordinator: b.clone(),
                    members: vec![b.clone()],
                },
            ],
            visible_players: vec![a.clone(), b.clone()],
            all_players: vec![a, b.clone()],
        };

        let coordinators = network.coordinators();
        assert_eq!(coordinators.len(), 2);
        assert_eq!(coordinators[1], b);
    }
}
