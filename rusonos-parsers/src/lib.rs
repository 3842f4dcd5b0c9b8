//! Parsers for the XML documents Sonos players send us.
//!
//! Everything a player pushes or returns is XML, often with further XML
//! escaped inside it: NOTIFY bodies are `e:propertyset` documents, transport
//! and rendering events wrap their variables in a `LastChange` sub-document,
//! track metadata travels as DIDL-Lite, and the household structure comes
//! back as zone-group-state XML. This crate turns all of those into typed
//! values.
//!
//! The parsers are pure functions over strings and bytes; the only state
//! they touch is the [`PlayerRegistry`](rusonos_model::PlayerRegistry)
//! passed in by the caller, through which topology parsing resolves and
//! updates player handles.

mod didl;
mod error;
mod event_body;
mod topology;

pub use didl::{parse_didl, DidlItem, DidlResource};
pub use error::{ParseError, Result};
pub use event_body::{parse_event_body, parse_last_change, Properties, PropertyValue};
pub use topology::parse_zone_group_state;
