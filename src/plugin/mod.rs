//! Pluggable control-plane contracts used by the transfer layer
//!
//! Two capabilities, each behind a trait and selected by a
//! `scheme://address` connection descriptor: a durable metadata key/value
//! store and a peer handshake service.

pub mod handshake;
pub mod store;

pub use handshake::{handshake_plugin, DaemonHandle, Handshake, OnReceive, TcpHandshake};
pub use store::{open_store, MetadataStore};

use crate::common::{Error, Result};

/// Split a `scheme://rest` connection descriptor.
pub(crate) fn split_descriptor(descriptor: &str) -> Result<(&str, &str)> {
    descriptor
        .split_once("://")
        .ok_or_else(|| {
            Error::InvalidConfig(format!(
                "malformed connection descriptor: {descriptor}"
            ))
        })
}
