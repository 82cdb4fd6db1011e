//! Master coordinator
//!
//! The master is responsible for:
//! - The authoritative object -> replica mapping (directory)
//! - Memory segment lifecycle and allocation (registry)
//! - Reclaiming abandoned transactions and drained segments (gc)
//! - The seven coordinator operations (service), exposed over HTTP (http)

pub mod gc;
pub mod http;
pub mod object;
pub mod segment;
pub mod service;

pub use service::MasterService;
