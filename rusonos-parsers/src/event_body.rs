//! NOTIFY body and LastChange parsing.

use std::collections::HashMap;

use rusonos_model::{Network, PlayerRegistry};
use xmltree::Element;

use crate::didl::{parse_didl, DidlItem};
use crate::error::{ParseError, Result};
use crate::topology::parse_zone_group_state;

/// The property map carried by one event.
pub type Properties = HashMap<String, PropertyValue>;

/// One evented variable's value.
///
/// Most variables are plain strings. Audio variables may be split per
/// channel (`{"Master": "36", "LF": "100", ...}`), and two variables carry
/// whole sub-documents: DIDL-Lite track metadata and zone-group topology.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Channels(HashMap<String, String>),
    Track(DidlItem),
    Topology(Network),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_channels(&self) -> Option<&HashMap<String, String>> {
        match self {
            PropertyValue::Channels(channels) => Some(channels),
            _ => None,
        }
    }

    pub fn as_track(&self) -> Option<&DidlItem> {
        match self {
            PropertyValue::Track(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_topology(&self) -> Option<&Network> {
        match self {
            PropertyValue::Topology(network) => Some(network),
            _ => None,
        }
    }
}

/// Parse the body of a UPnP event into a property map.
///
/// The body is an `e:propertyset` document with one variable per
/// `e:property` child. Two variables get a second parse pass over their
/// text content: `LastChange` (transport/rendering/queue events, see
/// [`parse_last_change`]) and `ZoneGroupState` (topology events, parsed
/// into a [`Network`] through `players`).
pub fn parse_event_body(body: &[u8], players: &PlayerRegistry) -> Result<Properties> {
    let tree = Element::parse(body).map_err(|e| ParseError::Xml(e.to_string()))?;

    let mut result = Properties::new();
    for property in children_named(&tree, "property") {
        for variable in property.children.iter().filter_map(|node| node.as_element()) {
            let text = variable
                .get_text()
                .map(|t| t.into_owned())
                .unwrap_or_default();
            match variable.name.as_str() {
                "LastChange" => {
                    result.extend(parse_last_change(&text)?);
                }
                "ZoneGroupState" => {
                    let network = parse_zone_group_state(&text, players)?;
                    result.insert(variable.name.clone(), PropertyValue::Topology(network));
                }
                _ => {
                    result.insert(variable.name.clone(), PropertyValue::Text(text));
                }
            }
        }
    }
    Ok(result)
}

/// Parse a `LastChange` sub-document into a property map.
///
/// Transport, rendering and queue services all event through a single
/// `LastChange` variable whose text is another XML document: an `Event`
/// element holding one `InstanceID` (named `QueueID` for the queue service)
/// whose children are the actual variables. Values live in the `val`
/// attribute, or occasionally in the element text; audio variables may
/// repeat with different `channel` attributes.
pub fn parse_last_change(text: &str) -> Result<Properties> {
    let tree = Element::parse(text.as_bytes()).map_err(|e| ParseError::Xml(e.to_string()))?;

    let instance = tree
        .get_child("InstanceID")
        .or_else(|| tree.get_child("QueueID"))
        .ok_or_else(|| {
            ParseError::Malformed("no InstanceID or QueueID in LastChange event".to_string())
        })?;

    let mut result = Properties::new();
    for variable in instance.children.iter().filter_map(|node| node.as_element()) {
        let tag = variable.name.clone();

        let value = match variable.attributes.get("val") {
            Some(val) => val.clone(),
            // Sonos has been seen using a text value instead of the val
            // attribute for some variables.
            None => match variable.get_text() {
                Some(text) => text.into_owned(),
                None => {
                    tracing::debug!(%tag, "LastChange variable without value, skipping");
                    continue;
                }
            },
        };

        match variable.attributes.get("channel") {
            Some(channel) => {
                let channels = result
                    .entry(tag)
                    .or_insert_with(|| PropertyValue::Channels(HashMap::new()));
                if let PropertyValue::Channels(map) = channels {
                    map.insert(channel.clone(), value);
                }
            }
            None if value.starts_with("<DIDL-Lite") => match parse_didl(&value) {
                Ok(mut items) if !items.is_empty() => {
                    result.insert(tag, PropertyValue::Track(items.remove(0)));
                }
                Ok(_) => {
                    result.insert(tag, PropertyValue::Text(value));
                }
                Err(e) => {
                    tracing::warn!(%tag, error = %e, "undecodable DIDL metadata in event");
                    result.insert(tag, PropertyValue::Text(value));
                }
            },
            None => {
                result.insert(tag, PropertyValue::Text(value));
            }
        }
    }
    Ok(result)
}

fn children_named<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    element
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(move |el| el.name == name)
}
