//! Background garbage collection
//!
//! A timer-driven sweep that revokes abandoned put transactions, prunes
//! replicas stranded on Gone segments, and finalizes drained segments. It
//! goes through the same shard and registry locks as foreground operations,
//! so it cannot race a live PutEnd/PutRevoke on the same key.

use crate::common::MasterConfig;
use crate::master::object::ObjectDirectory;
use crate::master::segment::SegmentRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct GarbageCollector {
    directory: Arc<ObjectDirectory>,
    registry: Arc<SegmentRegistry>,
    put_ttl: Duration,
    interval: Duration,
}

/// Stops the sweep task.
pub struct GcHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GcHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

impl GarbageCollector {
    pub fn new(
        config: &MasterConfig,
        directory: Arc<ObjectDirectory>,
        registry: Arc<SegmentRegistry>,
    ) -> Self {
        Self {
            directory,
            registry,
            put_ttl: Duration::from_secs(config.put_timeout_secs),
            interval: Duration::from_secs(config.gc_interval_secs.max(1)),
        }
    }

    /// One full sweep. Split out from the timer loop so tests can drive it
    /// directly.
    pub fn run_once(&self) {
        let expired = self.directory.expire_transactions(self.put_ttl);
        let orphaned = self.directory.prune_dead_replicas();
        let finalized = self.registry.sweep_drained();

        if expired > 0 || orphaned > 0 || !finalized.is_empty() {
            tracing::info!(
                expired_txns = expired,
                orphaned_objects = orphaned,
                finalized_segments = finalized.len(),
                "gc sweep"
            );
        }
    }

    /// Spawn the periodic sweep on the current runtime.
    pub fn spawn(self) -> GcHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                put_timeout_secs = self.put_ttl.as_secs(),
                "garbage collector started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.run_once(),
                    _ = stopped.changed() => {
                        tracing::info!("garbage collector stopped");
                        break;
                    }
                }
            }
        });
        GcHandle { stop, task }
    }
}
