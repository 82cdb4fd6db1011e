//! Integration tests for the segkv master

use segkv::common::Error;
use segkv::master::segment::SegmentDescriptor;
use segkv::master::MasterService;
use segkv::MasterConfig;
use std::sync::Arc;

const KIB: u64 = 1024;
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
fn scenario_a_mount_put_get() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", MIB);

    let placements = svc.put_start("k1", 100 * KIB, 1).unwrap();
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].segment_id, "seg1");
    assert_eq!(placements[0].length, 100 * KIB);

    svc.put_end("k1").unwrap();

    let replicas = svc.get_replica_list("k1").unwrap();
    assert_eq!(replicas, placements);
}

#[test]
fn scenario_b_concurrent_put_conflicts() {
    let svc = Arc::new(service());
    mount(&svc, "seg1", "nodeA", 64 * MIB);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = svc.clone();
        handles.push(std::thread::spawn(move || {
            svc.put_start("k2", KIB, 1).is_ok()
        }));
    }
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    // Exactly one winner, everyone else saw Conflict.
    assert_eq!(successes, 1);
    assert!(matches!(
        svc.put_start("k2", KIB, 1),
        Err(Error::Conflict(_))
    ));
}

#[test]
fn scenario_c_insufficient_capacity_leaves_no_ghost() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", MIB);

    let err = svc.put_start("k3", 2 * MIB, 1).unwrap_err();
    assert!(matches!(err, Error::InsufficientCapacity { .. }));

    assert!(matches!(svc.get_replica_list("k3"), Err(Error::NotFound(_))));
    assert!(matches!(svc.put_end("k3"), Err(Error::NotFound(_))));
    assert_eq!(svc.object_count(), 0);
}

#[test]
fn scenario_d_unmount_empty_segment_is_immediate() {
    let svc = service();
    mount(&svc, "seg2", "nodeA", MIB);
    svc.unmount_segment("seg2").unwrap();

    assert_eq!(svc.registry_stats().segments, 0);
    assert!(matches!(
        svc.unmount_segment("seg2"),
        Err(Error::SegmentNotFound(_))
    ));
}

#[test]
fn test_revoke_then_get_is_not_found() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", MIB);

    svc.put_start("k4", KIB, 1).unwrap();
    svc.put_revoke("k4").unwrap();
    assert!(matches!(svc.get_replica_list("k4"), Err(Error::NotFound(_))));
}

#[test]
fn test_put_end_is_idempotent() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", MIB);

    svc.put_start("k5", KIB, 1).unwrap();
    svc.put_end("k5").unwrap();
    svc.put_end("k5").unwrap();
    svc.put_end("k5").unwrap();
    assert_eq!(svc.get_replica_list("k5").unwrap().len(), 1);
}

#[test]
fn test_complete_replicas_on_distinct_segments() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", 10 * MIB);
    mount(&svc, "seg2", "nodeB", 10 * MIB);
    mount(&svc, "seg3", "nodeC", 10 * MIB);

    svc.put_start("k6", MIB, 3).unwrap();
    svc.put_end("k6").unwrap();

    let replicas = svc.get_replica_list("k6").unwrap();
    assert!(!replicas.is_empty() && replicas.len() <= 3);
    let segments: std::collections::HashSet<_> =
        replicas.iter().map(|r| r.segment_id.as_str()).collect();
    assert_eq!(segments.len(), replicas.len());
}

#[test]
fn test_unmount_with_live_replicas_keeps_them_readable() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", MIB);

    svc.put_start("k7", KIB, 1).unwrap();
    svc.put_end("k7").unwrap();

    // Draining, not deleted: readers still resolve the replica.
    svc.unmount_segment("seg1").unwrap();
    assert_eq!(svc.registry_stats().segments, 1);
    assert_eq!(svc.get_replica_list("k7").unwrap().len(), 1);

    // Once the object goes away, nothing pins the segment.
    svc.remove("k7").unwrap();
}

#[test]
fn test_remove_during_put_is_implicit_revoke() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", MIB);

    svc.put_start("k8", MIB, 1).unwrap();
    svc.remove("k8").unwrap();

    // Capacity freed, key reusable.
    let placements = svc.put_start("k8", MIB, 1).unwrap();
    assert_eq!(placements.len(), 1);
}

#[test]
fn test_reused_capacity_never_overlaps_committed_replicas() {
    let svc = service();
    mount(&svc, "seg1", "nodeA", MIB);

    svc.put_start("a", 100 * KIB, 1).unwrap();
    let b = svc.put_start("b", 100 * KIB, 1).unwrap();
    svc.put_end("b").unwrap();
    svc.put_revoke("a").unwrap();

    // "c" may land in the range "a" gave back, but must stay disjoint from
    // the committed bytes of "b" on the same segment.
    let c = svc.put_start("c", 100 * KIB, 1).unwrap();
    assert_eq!(b[0].segment_id, c[0].segment_id);
    let b_range = b[0].offset..b[0].offset + b[0].length;
    let c_range = c[0].offset..c[0].offset + c[0].length;
    assert!(c_range.end <= b_range.start || b_range.end <= c_range.start);
}

#[test]
fn test_parallel_puts_on_distinct_keys() {
    let svc = Arc::new(service());
    for i in 0..4 {
        mount(&svc, &format!("seg{i}"), &format!("node{i}"), 64 * MIB);
    }

    let mut handles = Vec::new();
    for t in 0..8 {
        let svc = svc.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..50 {
                let key = format!("t{t}-k{i}");
                svc.put_start(&key, 4 * KIB, 2).unwrap();
                svc.put_end(&key).unwrap();
                assert!(!svc.get_replica_list(&key).unwrap().is_empty());
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(svc.object_count(), 8 * 50);
    // Every byte allocated is accounted for: 8 threads x 50 keys x 2 replicas.
    assert_eq!(svc.registry_stats().total_used, 8 * 50 * 2 * 4 * KIB);
}

#[tokio::test]
async fn test_gc_lifecycle_with_service() {
    let svc = MasterService::new(MasterConfig {
        enable_gc: true,
        gc_interval_secs: 1,
        put_timeout_secs: 3600,
        ..Default::default()
    });
    mount(&svc, "seg1", "nodeA", MIB);
    svc.put_start("k9", KIB, 1).unwrap();

    let gc = svc.start_gc().expect("gc enabled");
    // A fresh transaction must survive the running collector.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    svc.put_end("k9").unwrap();
    assert_eq!(svc.get_replica_list("k9").unwrap().len(), 1);

    gc.shutdown().await;
}
