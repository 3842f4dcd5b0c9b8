//! The top-level error type.

use thiserror::Error;

/// Anything that can go wrong talking to the Sonos network.
///
/// Mostly a sum over the workspace crates' errors; code that needs to react
/// to a specific condition can match the wrapped error.
#[derive(Debug, Error)]
pub enum SonosError {
    #[error(transparent)]
    Upnp(#[from] rusonos_upnp::UpnpError),

    #[error(transparent)]
    Parse(#[from] rusonos_parsers::ParseError),

    #[error(transparent)]
    Event(#[from] rusonos_events::EventError),

    #[error(transparent)]
    Discovery(#[from] rusonos_discovery::DiscoveryError),

    /// The device's response was missing an output argument the operation
    /// needs.
    #[error("missing {0} argument in device response")]
    MissingArgument(&'static str),
}

pub type Result<T> = std::result::Result<T, SonosError>;
