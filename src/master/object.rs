//! Object directory
//!
//! The authoritative key -> replica-set mapping and the put state machine.
//! Entries live in lock shards selected by a blake3 hash of the key, so all
//! mutations of one key are serialized while unrelated keys proceed in
//! parallel. Lock order is always shard (key) lock first, registry lock
//! second.

use crate::common::{timestamp_now_millis, Error, Result};
use crate::master::segment::{ReplicaPlacement, SegmentRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaStatus {
    /// Allocated, data transfer not yet confirmed
    Pending,
    /// Data written and committed
    Complete,
    /// Segment lost before the replica could be read again
    Invalid,
}

/// One physical copy of an object's bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replica {
    pub placement: ReplicaPlacement,
    pub status: ReplicaStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectState {
    /// Put started, transfer in flight
    Putting,
    /// Readable
    Complete,
}

/// One in-flight write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutTransaction {
    pub token: String,
    pub started_at_ms: u64,
}

#[derive(Debug, Clone)]
struct ObjectEntry {
    size: u64,
    target_replicas: u32,
    state: ObjectState,
    replicas: Vec<Replica>,
    txn: Option<PutTransaction>,
}

/// Sharded directory of objects
pub struct ObjectDirectory {
    shards: Vec<Mutex<HashMap<String, ObjectEntry>>>,
    registry: Arc<SegmentRegistry>,
}

impl ObjectDirectory {
    /// `lock_shards` is rounded up to the next power of two.
    pub fn new(registry: Arc<SegmentRegistry>, lock_shards: usize) -> Self {
        let count = lock_shards.max(1).next_power_of_two();
        let shards = (0..count).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards, registry }
    }

    fn shard_for(&self, key: &str) -> &Mutex<HashMap<String, ObjectEntry>> {
        let hash = blake3::hash(key.as_bytes());
        let idx = u64::from_le_bytes(hash.as_bytes()[0..8].try_into().unwrap())
            as usize
            & (self.shards.len() - 1);
        &self.shards[idx]
    }

    /// Begin a put: allocate replica placements and record the transaction.
    ///
    /// `Conflict` when a put is already in flight for the key or the object
    /// is already Complete (overwrite goes through `remove` first). A failed
    /// allocation leaves no trace of the key.
    pub fn put_start(
        &self,
        key: &str,
        size: u64,
        target_replicas: u32,
    ) -> Result<Vec<ReplicaPlacement>> {
        let target_replicas = target_replicas.max(1);
        let mut shard = self.shard_for(key).lock().unwrap();
        if shard.contains_key(key) {
            return Err(Error::Conflict(key.to_string()));
        }

        let placements = self.registry.allocate(size, target_replicas, &[])?;
        let replicas = placements
            .iter()
            .map(|p| Replica {
                placement: p.clone(),
                status: ReplicaStatus::Pending,
            })
            .collect();

        shard.insert(
            key.to_string(),
            ObjectEntry {
                size,
                target_replicas,
                state: ObjectState::Putting,
                replicas,
                txn: Some(PutTransaction {
                    token: Uuid::new_v4().to_string(),
                    started_at_ms: timestamp_now_millis(),
                }),
            },
        );
        tracing::debug!(key, size, replicas = placements.len(), "put started");
        Ok(placements)
    }

    /// Commit a put: all allocated replicas become Complete. Calling again
    /// after success is a no-op success, so at-least-once clients are safe.
    pub fn put_end(&self, key: &str) -> Result<()> {
        let mut shard = self.shard_for(key).lock().unwrap();
        let entry = shard
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        if entry.txn.is_none() {
            // Already committed.
            return Ok(());
        }
        for replica in &mut entry.replicas {
            replica.status = ReplicaStatus::Complete;
        }
        entry.state = ObjectState::Complete;
        entry.txn = None;
        tracing::debug!(key, "put committed");
        Ok(())
    }

    /// Abort a put: release the allocated space and drop the key entirely.
    pub fn put_revoke(&self, key: &str) -> Result<()> {
        let mut shard = self.shard_for(key).lock().unwrap();
        let has_txn = shard.get(key).is_some_and(|e| e.txn.is_some());
        if !has_txn {
            return Err(Error::NotFound(key.to_string()));
        }
        let entry = shard.remove(key).unwrap();
        release_replicas(&self.registry, &entry.replicas);
        tracing::debug!(key, "put revoked");
        Ok(())
    }

    /// Resolve a completed object to its readable replicas.
    ///
    /// Replicas whose segment is Gone are detected here rather than eagerly:
    /// they are marked Invalid and left for the garbage collector to drop. An
    /// object with no readable replica left is deleted and reported
    /// `NotFound`.
    pub fn get_replica_list(&self, key: &str) -> Result<Vec<ReplicaPlacement>> {
        let mut shard = self.shard_for(key).lock().unwrap();
        let entry = shard
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        if entry.state != ObjectState::Complete {
            return Err(Error::NotFound(key.to_string()));
        }

        invalidate_stale_replicas(&self.registry, &mut entry.replicas);
        let placements: Vec<ReplicaPlacement> = entry
            .replicas
            .iter()
            .filter(|r| r.status == ReplicaStatus::Complete)
            .map(|r| r.placement.clone())
            .collect();

        if placements.is_empty() {
            shard.remove(key);
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(placements)
    }

    /// Administrative force-delete: releases every replica and drops any
    /// in-flight transaction along with the object.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut shard = self.shard_for(key).lock().unwrap();
        let entry = shard
            .remove(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        release_replicas(&self.registry, &entry.replicas);
        tracing::debug!(key, "object removed");
        Ok(())
    }

    /// Revoke transactions older than `ttl`. Returns how many were expired.
    pub fn expire_transactions(&self, ttl: Duration) -> usize {
        let cutoff = timestamp_now_millis().saturating_sub(ttl.as_millis() as u64);
        let mut expired = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap();
            let stale: Vec<String> = shard
                .iter()
                .filter(|(_, e)| {
                    e.txn
                        .as_ref()
                        .is_some_and(|t| t.started_at_ms < cutoff)
                })
                .map(|(k, _)| k.clone())
                .collect();
            for key in stale {
                let entry = shard.remove(&key).unwrap();
                release_replicas(&self.registry, &entry.replicas);
                tracing::warn!(key = %key, "abandoned put transaction revoked");
                expired += 1;
            }
        }
        expired
    }

    /// Drop Invalid replicas (segment Gone) from completed objects, deleting
    /// objects left without any replica. Objects with an in-flight
    /// transaction are left to `expire_transactions`. Returns how many
    /// objects were deleted.
    pub fn prune_dead_replicas(&self) -> usize {
        let mut deleted = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap();
            let mut empty: Vec<String> = Vec::new();
            for (key, entry) in shard.iter_mut() {
                if entry.txn.is_some() {
                    continue;
                }
                invalidate_stale_replicas(&self.registry, &mut entry.replicas);
                entry
                    .replicas
                    .retain(|r| r.status != ReplicaStatus::Invalid);
                if entry.replicas.is_empty() {
                    empty.push(key.clone());
                }
            }
            for key in empty {
                shard.remove(&key);
                tracing::warn!(key = %key, "object lost all replicas, deleted");
                deleted += 1;
            }
        }
        deleted
    }

    /// Number of objects currently tracked (any state).
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared size, replica target, and state of a tracked object.
    pub fn describe(&self, key: &str) -> Option<(u64, u32, ObjectState)> {
        let shard = self.shard_for(key).lock().unwrap();
        shard
            .get(key)
            .map(|e| (e.size, e.target_replicas, e.state))
    }
}

/// Mark replicas whose segment no longer serves reads as Invalid. No bytes
/// to release: the segment entry is already gone.
fn invalidate_stale_replicas(registry: &SegmentRegistry, replicas: &mut [Replica]) {
    for replica in replicas {
        if replica.status != ReplicaStatus::Invalid
            && !registry.status_of(&replica.placement.segment_id).can_read()
        {
            replica.status = ReplicaStatus::Invalid;
        }
    }
}

fn release_replicas(registry: &SegmentRegistry, replicas: &[Replica]) {
    for replica in replicas {
        // An Invalid replica's segment is gone; there is nothing to return.
        if replica.status == ReplicaStatus::Invalid {
            continue;
        }
        registry.release(
            &replica.placement.segment_id,
            replica.placement.offset,
            replica.placement.length,
        );
    }
}
