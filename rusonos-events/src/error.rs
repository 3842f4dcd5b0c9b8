//! Error types for the eventing core.

use rusonos_upnp::UpnpError;
use thiserror::Error;

/// Errors surfaced by subscription operations and the event server.
#[derive(Debug, Error)]
pub enum EventError {
    /// The operation is not valid in the subscription's current state
    /// (e.g. renewing a subscription that was never established). These are
    /// caller bugs, not network conditions.
    #[error("subscription must be {required} for this operation, but is {actual}")]
    InvalidState {
        required: &'static str,
        actual: &'static str,
    },

    /// The underlying HTTP request failed: timeout, refused connection,
    /// unreachable device.
    #[error("transport error: {0}")]
    Transport(#[from] UpnpError),

    /// The device answered a SUBSCRIBE with a non-success status.
    #[error("request rejected by {url}: HTTP {status}")]
    Rejected { url: String, status: u16 },

    /// The device accepted a SUBSCRIBE but the response is unusable
    /// (missing SID or TIMEOUT header, or an unparseable TIMEOUT value).
    /// The subscription is left exactly as it was; no partial transition.
    #[error("malformed subscribe response: {0}")]
    MalformedResponse(String),

    /// `callback_url` was read before the server was started.
    #[error("event server is not running")]
    ServerNotRunning,

    /// The callback listener could not be bound or started.
    #[error("failed to start event server: {0}")]
    ServerStart(String),

    /// Invalid [`EventConfig`](crate::EventConfig).
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, EventError>;
