//! # segkv
//!
//! Coordination core for a distributed, RDMA-backed object cache. Worker
//! nodes contribute memory segments; this crate keeps the authoritative
//! mapping from object key to its physical replicas and hands the transfer
//! layer the control-plane plumbing it needs to move the actual bytes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               Master service                 │
//! │  GetReplicaList / PutStart / PutEnd /        │
//! │  PutRevoke / Remove / Mount / Unmount        │
//! │                                              │
//! │  ObjectDirectory ──► SegmentRegistry         │
//! │        ▲                    ▲                │
//! │        └── GarbageCollector ┘                │
//! └──────────────────────────────────────────────┘
//!            │ replica placements
//!   ┌────────┴────────┬───────────────┐
//! ┌─▼──────────┐ ┌────▼───────┐ ┌─────▼──────┐
//! │ Worker A   │ │ Worker B   │ │ Worker C   │
//! │ (segments) │ │ (segments) │ │ (segments) │
//! └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! Workers and clients discover each other through the pluggable
//! [`plugin::MetadataStore`] and exchange endpoint attributes through a
//! [`plugin::Handshake`] before the (external) transfer engine performs the
//! data movement.
//!
//! ## Usage
//!
//! ```bash
//! segkv-master serve --port 50051 --max-threads 4 --enable-gc
//! ```

pub mod common;
pub mod master;
pub mod plugin;

// Re-export commonly used types
pub use common::{AttributeDocument, Error, MasterConfig, Result};
pub use master::MasterService;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
