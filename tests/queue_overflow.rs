use bytes::Bytes;
use tempocast::config::QueueConfig;
use tempocast::{BroadcastQueue, OverflowPolicy};

mod common;

fn queue(capacity: usize, min_interval_ms: u64, policy: OverflowPolicy) -> BroadcastQueue {
    common::init_logging();
    let cfg = QueueConfig::new(capacity, min_interval_ms).with_overflow_policy(policy);
    BroadcastQueue::new(cfg, 4).unwrap()
}

#[test]
fn drop_newest_rejects_incoming_message() {
    let q = queue(1, 0, OverflowPolicy::DropNewest);
    assert!(q.enqueue("m1", 0));
    assert!(!q.enqueue("m2", 0));
    assert_eq!(q.len(), 1);
    assert_eq!(q.overflow_count(), 1);
    let stored = q.poll_message(0).unwrap();
    assert_eq!(stored.payload, Bytes::from_static(b"m1"));
}

#[test]
fn drop_oldest_replaces_existing_message() {
    let q = queue(1, 0, OverflowPolicy::DropOldest);
    assert!(q.enqueue("m1", 0));
    assert!(q.enqueue("m2", 0));
    assert_eq!(q.len(), 1);
    assert_eq!(q.overflow_count(), 1);
    let stored = q.poll_message(0).unwrap();
    assert_eq!(stored.payload, Bytes::from_static(b"m2"));
}

#[test]
fn twelve_enqueues_into_ten_slots() {
    let q = queue(10, 500, OverflowPolicy::DropNewest);
    let results: Vec<bool> = (0..12).map(|i| q.enqueue(format!("BPM:{}", 120 + i), 1_000)).collect();

    assert_eq!(results.iter().filter(|ok| **ok).count(), 10);
    assert_eq!(&results[10..], &[false, false]);
    assert_eq!(q.overflow_count(), 2);
    assert_eq!(q.len(), 10);

    q.reset();
    assert_eq!(q.len(), 0);
    assert_eq!(q.overflow_count(), 0);
    assert_eq!(q.emitted_count(), 0);
}

#[test]
fn every_rejection_counts_exactly_once() {
    let q = queue(5, 500, OverflowPolicy::DropNewest);
    for i in 0..5 {
        assert!(q.enqueue(format!("MSG:{i}"), 4_000 + i), "message {i} should fit");
    }
    for i in 5..10u64 {
        let before = q.overflow_count();
        assert!(!q.enqueue(format!("OVERFLOW:{i}"), 4_000 + i));
        assert_eq!(q.overflow_count(), before + 1);
        assert_eq!(q.len(), 5);
    }
}

#[test]
fn accepts_again_after_drain_and_keeps_overflow_history() {
    let q = queue(3, 100, OverflowPolicy::DropNewest);
    let mut now = 5_000;
    for i in 0..3 {
        q.enqueue(format!("MSG:{i}"), now);
    }
    assert!(!q.enqueue("OVERFLOW", now));
    assert_eq!(q.overflow_count(), 1);

    assert_eq!(q.poll(now), 1);
    now += 150;
    assert_eq!(q.len(), 2);

    assert!(q.enqueue("RECOVERY", now));
    assert_eq!(q.len(), 3);
    assert_eq!(q.overflow_count(), 1);
}
