//! Error types for UPnP transport operations.

use thiserror::Error;

/// Errors that can occur while talking to a UPnP device.
#[derive(Debug, Error)]
pub enum UpnpError {
    /// Network or HTTP communication error (timeout, refused connection,
    /// unreachable host).
    #[error("network error: {0}")]
    Network(String),

    /// The device answered but the response could not be parsed.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// The device rejected a SOAP action with a UPnP fault.
    #[error("UPnP error {code} received: {description} from {url}")]
    Upnp {
        url: String,
        code: u16,
        description: &'static str,
    },

    /// The device answered with an HTTP status the protocol does not allow
    /// for this request.
    #[error("unexpected HTTP {status} from {url}")]
    Http { url: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, UpnpError>;
