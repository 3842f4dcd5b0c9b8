//! Zone-group-state parsing.
//!
//! `GetZoneGroupState` responses and `ZoneGroupState` event properties carry
//! the same document: `ZoneGroups` containing one `ZoneGroup` per group,
//! each with `ZoneGroupMember` children (and possibly `Satellite` children
//! under a member). Parsing resolves every member through the player
//! identity cache and refreshes its metadata as a side effect, so existing
//! `Player` handles pick up name and coordinator changes.

use std::net::SocketAddr;

use rusonos_model::{Group, Network, Player, PlayerRegistry};
use xmltree::Element;

use crate::error::{ParseError, Result};

/// Parse a zone-group-state document into a [`Network`] snapshot.
pub fn parse_zone_group_state(xml: &str, players: &PlayerRegistry) -> Result<Network> {
    let tree = Element::parse(xml.as_bytes()).map_err(|e| ParseError::Xml(e.to_string()))?;

    // Events deliver a bare <ZoneGroups> document; GetZoneGroupState wraps
    // it in a <ZoneGroupState> root.
    let zone_groups = if tree.name == "ZoneGroups" {
        &tree
    } else {
        tree.get_child("ZoneGroups")
            .ok_or_else(|| ParseError::Malformed("no ZoneGroups element".to_string()))?
    };

    let mut groups = Vec::new();
    let mut visible_players = Vec::new();
    let mut all_players = Vec::new();

    for group_element in children_named(zone_groups, "ZoneGroup") {
        let coordinator_uuid = required_attr(group_element, "Coordinator")?;
        let group_uuid = required_attr(group_element, "ID")?;

        let mut coordinator = None;
        let mut members = Vec::new();

        for member_element in children_named(group_element, "ZoneGroupMember") {
            let player = parse_member(
                member_element,
                players,
                &mut visible_players,
                &mut all_players,
            )?;

            let is_coordinator = player.uuid().as_deref() == Some(coordinator_uuid);
            player.set_coordinator(is_coordinator);
            if is_coordinator {
                coordinator = Some(player.clone());
            }
            player.set_bridge(
                member_element.attributes.get("IsZoneBridge").map(String::as_str) == Some("1"),
            );
            members.push(player);

            // Satellites (surrounds, subs) are listed under their bound
            // member and cannot coordinate or bridge.
            for satellite_element in children_named(member_element, "Satellite") {
                let satellite = parse_member(
                    satellite_element,
                    players,
                    &mut visible_players,
                    &mut all_players,
                )?;
                members.push(satellite);
            }
        }

        let coordinator = coordinator.ok_or_else(|| {
            ParseError::Malformed(format!("group {group_uuid} has no coordinator member"))
        })?;
        groups.push(Group {
            uuid: group_uuid.to_string(),
            coordinator,
            members,
        });
    }

    Ok(Network {
        groups,
        visible_players,
        all_players,
    })
}

/// Parse one ZoneGroupMember or Satellite element, resolving it through the
/// identity cache and updating its metadata.
fn parse_member(
    element: &Element,
    players: &PlayerRegistry,
    visible_players: &mut Vec<Player>,
    all_players: &mut Vec<Player>,
) -> Result<Player> {
    let location = required_attr(element, "Location")?;
    let addr = addr_from_location(location).ok_or_else(|| {
        ParseError::Malformed(format!("unparseable member Location: {location}"))
    })?;

    let player = players.get_or_create(addr);
    player.set_identity(
        required_attr(element, "UUID")?,
        required_attr(element, "ZoneName")?,
    );

    let is_visible = element.attributes.get("Invisible").map(String::as_str) != Some("1");
    if is_visible {
        visible_players.push(player.clone());
    }
    all_players.push(player.clone());
    Ok(player)
}

fn required_attr<'a>(element: &'a Element, name: &str) -> Result<&'a str> {
    element
        .attributes
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| {
            ParseError::Malformed(format!("<{}> missing {name} attribute", element.name))
        })
}

/// Extract the device address from a Location URL like
/// `http://192.168.1.100:1400/xml/device_description.xml`.
fn addr_from_location(location: &str) -> Option<SocketAddr> {
    let rest = location.split("//").nth(1)?;
    let host_port = rest.split('/').next()?;
    host_port.parse().ok().or_else(|| {
        // No explicit port in the URL: assume the standard device port.
        let ip = host_port.parse().ok()?;
        Some(SocketAddr::new(ip, rusonos_model::DEVICE_PORT))
    })
}

fn children_named<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    element
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(move |el| el.name == name)
}
