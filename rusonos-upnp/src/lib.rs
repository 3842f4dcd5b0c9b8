//! SOAP and raw HTTP transport for UPnP devices.
//!
//! This crate is the wire-level collaborator of the event core and the
//! high-level API: it knows how to issue SOAP actions against a player's
//! control endpoints, how to unwrap the response arguments, and how to turn
//! a SOAP fault into a typed error. It also exposes [`SoapClient::request`],
//! a raw escape hatch for the non-standard HTTP verbs (SUBSCRIBE,
//! UNSUBSCRIBE) that UPnP eventing requires.
//!
//! The static [`Service`] descriptors live here too: one per supported
//! Sonos service, carrying the control, eventing and description paths
//! relative to the player's base URL.

mod client;
mod error;
mod service;

pub use client::{SoapClient, UpnpResponse};
pub use error::{Result, UpnpError};
pub use service::{Service, ServiceInfo};
