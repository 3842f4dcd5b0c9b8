//! Error type shared by every parser in this crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// The document is well-formed but missing a required element or
    /// attribute.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// DIDL-Lite allows only item and container children; anything else is
    /// rejected the way the devices themselves would.
    #[error("illegal child of DIDL-Lite element: <{0}>")]
    IllegalDidlChild(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;
