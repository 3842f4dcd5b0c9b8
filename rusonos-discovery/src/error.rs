//! Error types for player discovery.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Socket setup or I/O failure.
    #[error("network error: {0}")]
    Network(String),

    /// No player answered before the deadline.
    #[error("no player responded before the timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

impl From<std::io::Error> for DiscoveryError {
    fn from(e: std::io::Error) -> Self {
        DiscoveryError::Network(e.to_string())
    }
}
