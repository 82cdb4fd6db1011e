//! Master service facade
//!
//! Composes the segment registry, object directory, and garbage collector
//! behind the seven coordinator operations. This is the only layer the
//! network surface talks to.

use crate::common::{MasterConfig, Result};
use crate::master::gc::{GarbageCollector, GcHandle};
use crate::master::object::{ObjectDirectory, ObjectState};
use crate::master::segment::{
    RegistryStats, ReplicaPlacement, Segment, SegmentDescriptor, SegmentRegistry,
};
use std::sync::Arc;

pub struct MasterService {
    registry: Arc<SegmentRegistry>,
    directory: Arc<ObjectDirectory>,
    config: MasterConfig,
}

impl MasterService {
    pub fn new(config: MasterConfig) -> Self {
        let registry = Arc::new(SegmentRegistry::new());
        let directory = Arc::new(ObjectDirectory::new(registry.clone(), config.lock_shards));
        Self {
            registry,
            directory,
            config,
        }
    }

    /// Start the garbage collector if the configuration enables it.
    pub fn start_gc(&self) -> Option<GcHandle> {
        if !self.config.enable_gc {
            return None;
        }
        let gc = GarbageCollector::new(
            &self.config,
            self.directory.clone(),
            self.registry.clone(),
        );
        Some(gc.spawn())
    }

    // === The seven master operations ===

    pub fn get_replica_list(&self, key: &str) -> Result<Vec<ReplicaPlacement>> {
        self.directory.get_replica_list(key)
    }

    pub fn put_start(
        &self,
        key: &str,
        size: u64,
        replica_count: u32,
    ) -> Result<Vec<ReplicaPlacement>> {
        self.directory.put_start(key, size, replica_count)
    }

    pub fn put_end(&self, key: &str) -> Result<()> {
        self.directory.put_end(key)
    }

    pub fn put_revoke(&self, key: &str) -> Result<()> {
        self.directory.put_revoke(key)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.directory.remove(key)
    }

    pub fn mount_segment(&self, desc: SegmentDescriptor) -> Result<String> {
        self.registry.mount(desc)
    }

    pub fn unmount_segment(&self, id: &str) -> Result<()> {
        self.registry.unmount(id)
    }

    // === Status surface ===

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.registry.list()
    }

    pub fn object_count(&self) -> usize {
        self.directory.len()
    }

    /// Declared size, replica target, and state of a tracked object.
    pub fn describe_object(&self, key: &str) -> Option<(u64, u32, ObjectState)> {
        self.directory.describe(key)
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;

    const MIB: u64 = 1024 * 1024;

    fn service() -> MasterService {
        MasterService::new(MasterConfig::default())
    }

    fn mount(svc: &MasterService, id: &str, node: &str, capacity: u64) {
        svc.mount_segment(SegmentDescriptor {
            id: Some(id.to_string()),
            node_addr: node.to_string(),
            capacity,
        })
        .unwrap();
    }

    #[test]
    fn test_end_to_end_put_get() {
        let svc = service();
        mount(&svc, "seg1", "nodeA", MIB);

        let placements = svc.put_start("k1", 100 * 1024, 1).unwrap();
        assert_eq!(placements.len(), 1);
        svc.put_end("k1").unwrap();

        let replicas = svc.get_replica_list("k1").unwrap();
        assert_eq!(replicas, placements);

        svc.remove("k1").unwrap();
        assert!(matches!(
            svc.get_replica_list("k1"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_gc_disabled_by_default() {
        let svc = service();
        assert!(!svc.config().enable_gc);
        // No runtime needed when GC stays off.
        assert!(svc.start_gc().is_none());
    }

    #[test]
    fn test_describe_object() {
        let svc = service();
        mount(&svc, "seg1", "nodeA", MIB);
        assert!(svc.describe_object("k1").is_none());

        svc.put_start("k1", 4096, 1).unwrap();
        assert_eq!(
            svc.describe_object("k1"),
            Some((4096, 1, ObjectState::Putting))
        );

        svc.put_end("k1").unwrap();
        assert_eq!(
            svc.describe_object("k1"),
            Some((4096, 1, ObjectState::Complete))
        );
    }

    #[test]
    fn test_stats_track_usage() {
        let svc = service();
        mount(&svc, "seg1", "nodeA", MIB);
        svc.put_start("k1", 1024, 1).unwrap();

        let stats = svc.registry_stats();
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.total_used, 1024);
        assert_eq!(svc.object_count(), 1);
    }
}
