//! Configuration for the segkv master

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Master configuration
///
/// Built once at startup (file + CLI overrides) and passed by reference into
/// the service and the garbage collector. No process-wide mutable globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Bind address for the operation surface
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Maximum worker threads (capped at hardware concurrency)
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Enable the background garbage collector
    #[serde(default)]
    pub enable_gc: bool,

    /// Garbage collection sweep interval, seconds
    #[serde(default = "default_gc_interval")]
    pub gc_interval_secs: u64,

    /// Age after which an unfinished put transaction is revoked, seconds
    #[serde(default = "default_put_timeout")]
    pub put_timeout_secs: u64,

    /// Number of lock shards for the object directory (rounded up to a power of two)
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,

    /// Handshake connect/exchange timeout, milliseconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:50051".parse().unwrap()
}
fn default_max_threads() -> usize {
    4
}
fn default_gc_interval() -> u64 {
    10
}
fn default_put_timeout() -> u64 {
    300
}
fn default_lock_shards() -> usize {
    256
}
fn default_handshake_timeout() -> u64 {
    5000
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_threads: default_max_threads(),
            enable_gc: false,
            gc_interval_secs: default_gc_interval(),
            put_timeout_secs: default_put_timeout(),
            lock_shards: default_lock_shards(),
            handshake_timeout_ms: default_handshake_timeout(),
        }
    }
}

impl MasterConfig {
    /// Load from `segkv.toml` in the working directory, falling back to
    /// defaults when the file is absent or a key is missing.
    pub fn load() -> Self {
        config::Config::builder()
            .add_source(config::File::with_name("segkv").required(false))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap_or_default()
    }

    /// Worker thread count capped at hardware concurrency.
    pub fn worker_threads(&self) -> usize {
        let hw = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_threads.clamp(1, hw)
    }
}
