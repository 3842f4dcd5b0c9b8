//! Model types shared across the rusonos workspace.
//!
//! This crate holds the device-level bookkeeping: [`Player`] handles with
//! identity-cached semantics, the [`PlayerRegistry`] that hands them out,
//! and the [`Group`]/[`Network`] topology snapshot types produced by the
//! zone-group parser.
//!
//! None of these types perform I/O. A `Player` is a cheap cloneable handle
//! identified by its network address; metadata (uuid, zone name, coordinator
//! and bridge flags) is filled in lazily as topology information is seen.

mod player;
mod topology;

pub use player::{Player, PlayerRegistry, DEVICE_PORT};
pub use topology::{Group, Network};
