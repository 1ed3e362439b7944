use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tempocast::config::QueueConfig;
use tempocast::BroadcastQueue;

/// Producer and drainer on separate threads sharing one synthetic clock.
#[test]
fn concurrent_producer_and_drainer_keep_invariants() {
    const CAPACITY: usize = 8;
    const MESSAGES: u64 = 5_000;
    const MIN_INTERVAL: u64 = 5;

    let q = Arc::new(BroadcastQueue::new(QueueConfig::new(CAPACITY, MIN_INTERVAL), 1).unwrap());
    let clock = Arc::new(AtomicU64::new(0));
    let producing = Arc::new(AtomicBool::new(true));

    let producer = {
        let q = Arc::clone(&q);
        let clock = Arc::clone(&clock);
        thread::spawn(move || {
            let mut accepted = 0u64;
            for seq in 0..MESSAGES {
                let now = clock.fetch_add(1, Ordering::SeqCst);
                if q.enqueue(seq.to_be_bytes().to_vec(), now) {
                    accepted += 1;
                }
                assert!(q.len() <= CAPACITY);
            }
            accepted
        })
    };

    let drainer = {
        let q = Arc::clone(&q);
        let clock = Arc::clone(&clock);
        let producing = Arc::clone(&producing);
        thread::spawn(move || {
            let mut emitted = 0u64;
            let mut last_emit: Option<u64> = None;
            loop {
                let now = clock.load(Ordering::SeqCst);
                if let Some(message) = q.poll_message(now) {
                    assert_eq!(message.emitted_at, Some(now));
                    if let Some(prev) = last_emit {
                        assert!(now - prev >= MIN_INTERVAL);
                    }
                    last_emit = Some(now);
                    emitted += 1;
                } else if !producing.load(Ordering::SeqCst) {
                    if q.is_empty() {
                        break;
                    }
                    // producer is done; advance time ourselves to flush the backlog
                    clock.fetch_add(MIN_INTERVAL, Ordering::SeqCst);
                }
                thread::yield_now();
            }
            emitted
        })
    };

    let accepted = producer.join().unwrap();
    producing.store(false, Ordering::SeqCst);
    let emitted = drainer.join().unwrap();

    assert_eq!(accepted, emitted);
    assert_eq!(q.overflow_count(), MESSAGES - accepted);
    assert_eq!(q.emitted_count(), emitted);

    // emitted sequence numbers are strictly increasing: a subsequence of enqueue order
    let seqs: Vec<u64> = q
        .emitted_log()
        .iter()
        .map(|m| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&m.payload);
            u64::from_be_bytes(raw)
        })
        .collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn many_producers_never_exceed_capacity() {
    let q = Arc::new(BroadcastQueue::new(QueueConfig::new(16, 1_000), 0).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|p| {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                (0..1_000)
                    .filter(|i| q.enqueue(format!("{p}:{i}"), 0))
                    .count() as u64
            })
        })
        .collect();

    let accepted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(accepted, 16);
    assert_eq!(q.len(), 16);
    assert_eq!(q.overflow_count(), 4_000 - 16);
}
