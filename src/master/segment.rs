//! Segment registry
//!
//! Tracks the memory segments contributed by worker nodes: capacity,
//! owning-node address, liveness, and how many replicas currently live on
//! each. All mutations go through one registry lock, so free-capacity
//! accounting stays consistent across concurrent allocations.

use crate::common::{timestamp_now, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

/// Segment liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    /// Serving reads, eligible for new allocations
    Active,
    /// Unmount requested while replicas remain: reads continue, no new
    /// allocations; finalized by the garbage collector
    Draining,
    /// Unmounted and empty; the registry entry is gone
    Gone,
}

impl SegmentStatus {
    /// Can a completed replica still be served from this segment?
    pub fn can_read(&self) -> bool {
        matches!(self, SegmentStatus::Active | SegmentStatus::Draining)
    }
}

/// Request to register a segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// Caller-supplied identifier; generated when absent
    pub id: Option<String>,
    /// Address of the node contributing the memory
    pub node_addr: String,
    /// Total bytes contributed
    pub capacity: u64,
}

/// A free byte range inside a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    offset: u64,
    length: u64,
}

/// One registered memory segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub node_addr: String,
    pub capacity: u64,
    pub used: u64,
    /// Pending + complete replicas currently placed here
    pub live_replicas: u64,
    pub status: SegmentStatus,
    pub mounted_at: u64,
    /// Free ranges, sorted by offset and coalesced. Replica placements are
    /// carved from here, so two live replicas never share bytes.
    #[serde(skip)]
    free_extents: Vec<Extent>,
}

impl Segment {
    /// Is there a single free range large enough for `size` bytes?
    fn can_fit(&self, size: u64) -> bool {
        self.free_extents.iter().any(|e| e.length >= size)
    }

    /// Take `size` bytes from the lowest-offset extent that fits.
    /// Caller checks `can_fit` first.
    fn carve(&mut self, size: u64) -> u64 {
        let idx = self
            .free_extents
            .iter()
            .position(|e| e.length >= size)
            .expect("carve without can_fit");
        let offset = self.free_extents[idx].offset;
        self.free_extents[idx].offset += size;
        self.free_extents[idx].length -= size;
        if self.free_extents[idx].length == 0 {
            self.free_extents.remove(idx);
        }
        offset
    }

    /// Return `[offset, offset + length)` to the free list, merging with
    /// adjacent extents.
    fn restore(&mut self, offset: u64, length: u64) {
        let idx = self
            .free_extents
            .partition_point(|e| e.offset < offset);
        self.free_extents.insert(idx, Extent { offset, length });

        // Coalesce with the following extent, then the preceding one.
        if idx + 1 < self.free_extents.len()
            && self.free_extents[idx].offset + self.free_extents[idx].length
                == self.free_extents[idx + 1].offset
        {
            self.free_extents[idx].length += self.free_extents[idx + 1].length;
            self.free_extents.remove(idx + 1);
        }
        if idx > 0
            && self.free_extents[idx - 1].offset + self.free_extents[idx - 1].length
                == self.free_extents[idx].offset
        {
            self.free_extents[idx - 1].length += self.free_extents[idx].length;
            self.free_extents.remove(idx);
        }
    }
}

/// Where one replica of an object goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaPlacement {
    pub segment_id: String,
    pub node_addr: String,
    pub offset: u64,
    pub length: u64,
}

/// Registry-wide counters for the status surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub segments: usize,
    pub total_capacity: u64,
    pub total_used: u64,
}

/// Registry of all mounted segments
pub struct SegmentRegistry {
    segments: RwLock<HashMap<String, Segment>>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new segment. Fails with `DuplicateSegment` when a live
    /// entry with the same id already exists.
    pub fn mount(&self, desc: SegmentDescriptor) -> Result<String> {
        if desc.capacity == 0 {
            return Err(Error::InvalidConfig("segment capacity must be non-zero".into()));
        }
        let id = desc.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut segments = self.segments.write().unwrap();
        if segments.contains_key(&id) {
            return Err(Error::DuplicateSegment(id));
        }
        tracing::info!(
            segment = %id,
            node = %desc.node_addr,
            capacity = desc.capacity,
            "segment mounted"
        );
        segments.insert(
            id.clone(),
            Segment {
                id: id.clone(),
                node_addr: desc.node_addr,
                capacity: desc.capacity,
                used: 0,
                live_replicas: 0,
                status: SegmentStatus::Active,
                mounted_at: timestamp_now(),
                free_extents: vec![Extent {
                    offset: 0,
                    length: desc.capacity,
                }],
            },
        );
        Ok(id)
    }

    /// Request segment removal.
    ///
    /// A segment with no live replicas goes straight to Gone and its entry is
    /// deleted. One that still holds replicas turns Draining and waits for
    /// the garbage collector (or explicit removes) to clear it.
    pub fn unmount(&self, id: &str) -> Result<()> {
        let mut segments = self.segments.write().unwrap();
        let segment = segments
            .get_mut(id)
            .ok_or_else(|| Error::SegmentNotFound(id.to_string()))?;

        if segment.live_replicas == 0 {
            segments.remove(id);
            tracing::info!(segment = %id, "segment unmounted");
        } else {
            segment.status = SegmentStatus::Draining;
            tracing::info!(
                segment = %id,
                live_replicas = segment.live_replicas,
                "segment draining"
            );
        }
        Ok(())
    }

    /// Reserve space for up to `replica_count` replicas of `size` bytes.
    ///
    /// Only Active segments with a contiguous free range of `size` bytes
    /// qualify. Distinct segments always; distinct nodes while possible;
    /// least-loaded first with ties broken by lowest id, so placement is
    /// deterministic. Placements are carved from each segment's free-extent
    /// list and stay disjoint from every outstanding placement until released.
    /// At least one placement or `InsufficientCapacity`.
    pub fn allocate(
        &self,
        size: u64,
        replica_count: u32,
        exclude_nodes: &[String],
    ) -> Result<Vec<ReplicaPlacement>> {
        let mut segments = self.segments.write().unwrap();

        let mut candidates: Vec<&Segment> = segments
            .values()
            .filter(|s| {
                s.status == SegmentStatus::Active
                    && s.can_fit(size)
                    && !exclude_nodes.contains(&s.node_addr)
            })
            .collect();
        candidates.sort_by(|a, b| a.used.cmp(&b.used).then_with(|| a.id.cmp(&b.id)));

        let mut chosen: Vec<String> = Vec::new();
        let mut seen_nodes: HashSet<&str> = HashSet::new();
        for s in &candidates {
            if chosen.len() as u32 == replica_count {
                break;
            }
            if seen_nodes.insert(s.node_addr.as_str()) {
                chosen.push(s.id.clone());
            }
        }
        // Not enough distinct nodes: fill from remaining distinct segments.
        if (chosen.len() as u32) < replica_count {
            for s in &candidates {
                if chosen.len() as u32 == replica_count {
                    break;
                }
                if !chosen.contains(&s.id) {
                    chosen.push(s.id.clone());
                }
            }
        }

        if chosen.is_empty() {
            return Err(Error::InsufficientCapacity {
                need: size,
                replicas: replica_count,
            });
        }

        let mut placements = Vec::with_capacity(chosen.len());
        for id in chosen {
            let segment = segments.get_mut(&id).unwrap();
            let offset = segment.carve(size);
            segment.used += size;
            segment.live_replicas += 1;
            placements.push(ReplicaPlacement {
                segment_id: segment.id.clone(),
                node_addr: segment.node_addr.clone(),
                offset,
                length: size,
            });
        }
        Ok(placements)
    }

    /// Return the exact `[offset, offset + length)` range of a placement to
    /// its segment. A release against a segment that has already been deleted
    /// is a no-op.
    pub fn release(&self, segment_id: &str, offset: u64, length: u64) {
        let mut segments = self.segments.write().unwrap();
        if let Some(segment) = segments.get_mut(segment_id) {
            segment.used = segment.used.saturating_sub(length);
            segment.live_replicas = segment.live_replicas.saturating_sub(1);
            segment.restore(offset, length);
        }
    }

    /// Liveness of a segment; `Gone` when the entry has been deleted.
    pub fn status_of(&self, segment_id: &str) -> SegmentStatus {
        self.segments
            .read()
            .unwrap()
            .get(segment_id)
            .map(|s| s.status)
            .unwrap_or(SegmentStatus::Gone)
    }

    /// Delete Draining segments that hold no replicas anymore. Returns the
    /// ids that were finalized.
    pub fn sweep_drained(&self) -> Vec<String> {
        let mut segments = self.segments.write().unwrap();
        let drained: Vec<String> = segments
            .values()
            .filter(|s| s.status == SegmentStatus::Draining && s.live_replicas == 0)
            .map(|s| s.id.clone())
            .collect();
        for id in &drained {
            segments.remove(id);
            tracing::info!(segment = %id, "drained segment finalized");
        }
        drained
    }

    pub fn stats(&self) -> RegistryStats {
        let segments = self.segments.read().unwrap();
        RegistryStats {
            segments: segments.len(),
            total_capacity: segments.values().map(|s| s.capacity).sum(),
            total_used: segments.values().map(|s| s.used).sum(),
        }
    }

    /// Snapshot of all segments, for the status surface.
    pub fn list(&self) -> Vec<Segment> {
        self.segments.read().unwrap().values().cloned().collect()
    }
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
