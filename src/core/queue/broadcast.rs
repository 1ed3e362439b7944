use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

use crate::config::QueueConfig;
use crate::core::error::TempoError;
use crate::core::message::Message;
use crate::core::queue::OverflowPolicy;
use crate::metrics;

/// Value of the last-emission timestamp before anything has been emitted.
pub const NEVER_EMITTED: u64 = 0;

// Upfront allocation cap; larger buffers grow on demand.
const PREALLOC_LIMIT: usize = 64;

#[derive(Debug)]
struct QueueState {
    buffer: VecDeque<Message>,
    last_emit: u64,
    overflow_count: u64,
    emitted_count: u64,
    emitted_log: VecDeque<Message>,
    subscriber_count: u32,
}

/// Outcome of an enqueue, resolved under the lock and reported after it.
enum Admission {
    Accepted,
    Rejected { overflow: u64 },
    Evicted { evicted_id: u64, overflow: u64 },
}

/// Outcome of a poll, resolved under the lock and reported after it.
enum Release {
    Empty,
    Gated,
    ClockRegressed { last_emit: u64 },
    Emitted(Message),
}

/// Point-in-time view of the queue counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue_len: usize,
    pub capacity: usize,
    pub overflow_count: u64,
    pub emitted_count: u64,
    pub subscriber_count: u32,
    pub last_emit_ms: u64,
    pub min_interval_ms: u64,
}

/// Bounded FIFO with a rate gate in front of its output.
///
/// Every operation takes the same lock for O(1) work and returns at once:
/// `enqueue` fails fast when the buffer is full and `poll` returns
/// immediately when nothing is eligible. The queue never reads a clock;
/// callers pass millisecond timestamps in.
#[derive(Debug)]
pub struct BroadcastQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
}

impl BroadcastQueue {
    /// Creates a queue from an explicit configuration and an initial
    /// subscriber-count hint.
    pub fn new(config: QueueConfig, subscriber_hint: u32) -> Result<Self, TempoError> {
        config.validate()?;
        let retained = config.log_retention.unwrap_or(0).min(PREALLOC_LIMIT);
        let state = QueueState {
            buffer: VecDeque::with_capacity(config.capacity.min(PREALLOC_LIMIT)),
            last_emit: NEVER_EMITTED,
            overflow_count: 0,
            emitted_count: 0,
            emitted_log: VecDeque::with_capacity(retained),
            subscriber_count: subscriber_hint,
        };
        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    #[inline]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    #[inline]
    pub fn min_interval_ms(&self) -> u64 {
        self.config.min_interval_ms
    }

    /// Submits a payload stamped with `timestamp`.
    ///
    /// Returns `false` when the message was discarded because the buffer is
    /// full under [`OverflowPolicy::DropNewest`]. Every overflow, whichever
    /// policy handles it, bumps the overflow counter by one.
    pub fn enqueue(&self, payload: impl Into<Bytes>, timestamp: u64) -> bool {
        let payload = payload.into();

        let admission = {
            let mut state = self.state.lock();
            let message = Message::new(payload, timestamp, state.subscriber_count);

            if state.buffer.len() < self.config.capacity {
                state.buffer.push_back(message);
                Admission::Accepted
            } else {
                state.overflow_count += 1;
                let overflow = state.overflow_count;
                match self.config.overflow_policy {
                    OverflowPolicy::DropNewest => Admission::Rejected { overflow },
                    OverflowPolicy::DropOldest => {
                        let evicted_id = state.buffer.pop_front().map(|m| m.id).unwrap_or(0);
                        state.buffer.push_back(message);
                        Admission::Evicted {
                            evicted_id,
                            overflow,
                        }
                    }
                }
            }
        };

        match admission {
            Admission::Accepted => {
                metrics::inc_enqueued(1);
                trace!(target: "tempocast::queue", timestamp, "message enqueued");
                true
            }
            Admission::Rejected { overflow } => {
                metrics::inc_dropped_overflow(1);
                log_overflow(overflow, OverflowPolicy::DropNewest);
                false
            }
            Admission::Evicted {
                evicted_id,
                overflow,
            } => {
                metrics::inc_enqueued(1);
                metrics::inc_dropped_overflow(1);
                debug!(target: "tempocast::queue", evicted_id, "evicted oldest message");
                log_overflow(overflow, OverflowPolicy::DropOldest);
                true
            }
        }
    }

    /// Releases at most one message if the buffer is non-empty and at least
    /// `min_interval_ms` has passed since the previous emission.
    ///
    /// The returned message carries `now` as its emission time and has
    /// already been appended to the emitted log.
    pub fn poll_message(&self, now: u64) -> Option<Message> {
        let release = {
            let mut state = self.state.lock();
            if state.buffer.is_empty() {
                Release::Empty
            } else if now < state.last_emit {
                Release::ClockRegressed {
                    last_emit: state.last_emit,
                }
            } else if now - state.last_emit < self.config.min_interval_ms {
                Release::Gated
            } else {
                match state.buffer.pop_front() {
                    Some(mut message) => {
                        message.emitted_at = Some(now);
                        state.last_emit = now;
                        state.emitted_count += 1;
                        self.retain_emitted(&mut state, message.clone());
                        Release::Emitted(message)
                    }
                    None => Release::Empty,
                }
            }
        };

        match release {
            Release::Emitted(message) => {
                metrics::inc_emitted(1);
                trace!(
                    target: "tempocast::queue",
                    id = message.id,
                    now,
                    "message emitted"
                );
                Some(message)
            }
            Release::ClockRegressed { last_emit } => {
                warn!(
                    target: "tempocast::queue",
                    now,
                    last_emit,
                    "poll timestamp is earlier than the last emission; holding backlog"
                );
                None
            }
            Release::Empty | Release::Gated => None,
        }
    }

    /// Like [`poll_message`](Self::poll_message) but only reports how many
    /// messages were emitted (0 or 1).
    #[inline]
    pub fn poll(&self, now: u64) -> usize {
        usize::from(self.poll_message(now).is_some())
    }

    /// Updates the snapshot attached to messages enqueued from now on.
    pub fn set_subscriber_count(&self, count: u32) {
        self.state.lock().subscriber_count = count;
    }

    /// Drops the backlog, the emitted log and the overflow counter, and
    /// rearms the rate gate as if nothing had ever been emitted.
    pub fn reset(&self) {
        let dropped = {
            let mut state = self.state.lock();
            let dropped = state.buffer.len();
            state.buffer.clear();
            state.emitted_log.clear();
            state.overflow_count = 0;
            state.emitted_count = 0;
            state.last_emit = NEVER_EMITTED;
            dropped
        };
        debug!(target: "tempocast::queue", dropped, "queue reset");
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    pub fn overflow_count(&self) -> u64 {
        self.state.lock().overflow_count
    }

    pub fn emitted_count(&self) -> u64 {
        self.state.lock().emitted_count
    }

    pub fn last_emit_timestamp(&self) -> u64 {
        self.state.lock().last_emit
    }

    pub fn subscriber_count(&self) -> u32 {
        self.state.lock().subscriber_count
    }

    /// Copy of the retained emitted messages, oldest first.
    pub fn emitted_log(&self) -> Vec<Message> {
        self.state.lock().emitted_log.iter().cloned().collect()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            queue_len: state.buffer.len(),
            capacity: self.config.capacity,
            overflow_count: state.overflow_count,
            emitted_count: state.emitted_count,
            subscriber_count: state.subscriber_count,
            last_emit_ms: state.last_emit,
            min_interval_ms: self.config.min_interval_ms,
        }
    }

    fn retain_emitted(&self, state: &mut QueueState, message: Message) {
        match self.config.log_retention {
            Some(0) => {}
            Some(limit) => {
                if state.emitted_log.len() == limit {
                    state.emitted_log.pop_front();
                }
                state.emitted_log.push_back(message);
            }
            None => state.emitted_log.push_back(message),
        }
    }
}

fn log_overflow(overflow: u64, policy: OverflowPolicy) {
    if overflow == 1 {
        warn!(target: "tempocast::queue", %policy, "broadcast queue full; shedding messages");
    } else {
        debug!(target: "tempocast::queue", %policy, overflow, "broadcast queue overflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(capacity: usize, min_interval_ms: u64) -> BroadcastQueue {
        BroadcastQueue::new(QueueConfig::new(capacity, min_interval_ms), 4).unwrap()
    }

    fn payloads(messages: &[Message]) -> Vec<Bytes> {
        messages.iter().map(|m| m.payload.clone()).collect()
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = BroadcastQueue::new(QueueConfig::new(0, 500), 0).unwrap_err();
        assert!(matches!(err, TempoError::InvalidConfig(_)));
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let cfg = QueueConfig::new(usize::MAX, 500).with_log_retention(usize::MAX);
        let q = BroadcastQueue::new(cfg, 0).unwrap();
        for i in 0..100 {
            assert!(q.enqueue(format!("m{i}"), 0));
        }
        assert_eq!(q.len(), 100);
        assert_eq!(q.overflow_count(), 0);
        assert_eq!(q.poll(500), 1);
        assert_eq!(q.emitted_log().len(), 1);
    }

    #[test]
    fn overflow_rejects_newest_and_leaves_buffer_intact() {
        let q = queue(10, 500);
        let accepted: Vec<bool> = (0..12).map(|i| q.enqueue(format!("m{i}"), 0)).collect();

        assert!(accepted[..10].iter().all(|ok| *ok));
        assert!(accepted[10..].iter().all(|ok| !*ok));
        assert_eq!(q.overflow_count(), 2);
        assert_eq!(q.len(), 10);

        // head is still the first message, not one of the rejected ones
        assert_eq!(q.poll_message(500).unwrap().payload, Bytes::from_static(b"m0"));
    }

    #[test]
    fn rate_gate_measures_from_sentinel() {
        let q = queue(10, 500);
        for i in 0..4 {
            q.enqueue(format!("m{i}"), 0);
        }

        assert_eq!(q.poll(0), 0);
        assert_eq!(q.poll(500), 1);
        assert_eq!(q.poll(600), 0);
        assert_eq!(q.poll(1000), 1);
        assert_eq!(q.last_emit_timestamp(), 1000);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn gated_poll_leaves_buffer_untouched() {
        let q = queue(4, 500);
        q.enqueue("a", 0);
        assert_eq!(q.poll(499), 0);
        assert_eq!(q.len(), 1);
        assert_eq!(q.emitted_count(), 0);
        assert_eq!(q.last_emit_timestamp(), NEVER_EMITTED);
    }

    #[test]
    fn empty_poll_does_not_move_gate() {
        let q = queue(4, 500);
        assert_eq!(q.poll(10_000), 0);
        assert_eq!(q.last_emit_timestamp(), NEVER_EMITTED);

        q.enqueue("a", 10_000);
        assert_eq!(q.poll(10_000), 1);
    }

    #[test]
    fn one_emission_per_poll_in_fifo_order() {
        let q = queue(10, 500);
        for p in ["a", "b", "c"] {
            assert!(q.enqueue(p, 0));
        }

        let emitted: usize = [500, 1000, 1500].iter().map(|t| q.poll(*t)).sum();
        assert_eq!(emitted, 3);

        let log = q.emitted_log();
        assert_eq!(
            payloads(&log),
            vec![
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c")
            ]
        );
        let times: Vec<_> = log.iter().map(|m| m.emitted_at).collect();
        assert_eq!(times, vec![Some(500), Some(1000), Some(1500)]);
    }

    #[test]
    fn reset_clears_everything() {
        let q = queue(10, 500);
        for i in 0..12 {
            q.enqueue(format!("m{i}"), 0);
        }
        q.poll(500);
        q.reset();

        assert_eq!(q.len(), 0);
        assert_eq!(q.overflow_count(), 0);
        assert_eq!(q.emitted_count(), 0);
        assert!(q.emitted_log().is_empty());
        assert_eq!(q.last_emit_timestamp(), NEVER_EMITTED);

        // second reset is a no-op
        q.reset();
        assert_eq!(q.stats().queue_len, 0);
    }

    #[test]
    fn backward_clock_holds_backlog() {
        let q = queue(4, 100);
        q.enqueue("a", 0);
        q.enqueue("b", 0);
        assert_eq!(q.poll(1_000), 1);

        assert_eq!(q.poll(900), 0);
        assert_eq!(q.len(), 1);
        assert_eq!(q.last_emit_timestamp(), 1_000);

        assert_eq!(q.poll(1_100), 1);
    }

    #[test]
    fn zero_interval_emits_every_poll() {
        let q = queue(4, 0);
        q.enqueue("a", 0);
        q.enqueue("b", 0);
        assert_eq!(q.poll(0), 1);
        assert_eq!(q.poll(0), 1);
        assert_eq!(q.poll(0), 0);
    }

    #[test]
    fn subscriber_snapshot_is_metadata_only() {
        let q = queue(2, 100);
        q.enqueue("four", 0);
        q.set_subscriber_count(0);
        q.enqueue("zero", 0);

        // no subscribers does not stop emission
        let first = q.poll_message(100).unwrap();
        let second = q.poll_message(200).unwrap();
        assert_eq!(first.subscriber_count, 4);
        assert_eq!(second.subscriber_count, 0);
    }

    #[test]
    fn drop_oldest_keeps_latest_values() {
        let cfg = QueueConfig::new(1, 500).with_overflow_policy(OverflowPolicy::DropOldest);
        let q = BroadcastQueue::new(cfg, 0).unwrap();

        assert!(q.enqueue("120", 0));
        assert!(q.enqueue("121", 10));
        assert!(q.enqueue("122", 20));
        assert_eq!(q.len(), 1);
        assert_eq!(q.overflow_count(), 2);

        let m = q.poll_message(500).unwrap();
        assert_eq!(m.payload, Bytes::from_static(b"122"));
        assert_eq!(m.enqueued_at, 20);
    }

    #[test]
    fn log_retention_caps_history_but_not_count() {
        let cfg = QueueConfig::new(8, 0).with_log_retention(2);
        let q = BroadcastQueue::new(cfg, 0).unwrap();
        for p in ["a", "b", "c", "d"] {
            q.enqueue(p, 0);
        }
        for t in 0..4 {
            q.poll(t);
        }

        assert_eq!(q.emitted_count(), 4);
        assert_eq!(
            payloads(&q.emitted_log()),
            vec![Bytes::from_static(b"c"), Bytes::from_static(b"d")]
        );
    }

    #[test]
    fn zero_retention_keeps_only_count() {
        let cfg = QueueConfig::new(2, 0).with_log_retention(0);
        let q = BroadcastQueue::new(cfg, 0).unwrap();
        q.enqueue("a", 0);
        assert_eq!(q.poll(0), 1);
        assert_eq!(q.emitted_count(), 1);
        assert!(q.emitted_log().is_empty());
    }

    #[test]
    fn stats_reflect_state() {
        let q = queue(3, 250);
        for i in 0..5 {
            q.enqueue(format!("m{i}"), 0);
        }
        q.poll(250);

        let stats = q.stats();
        assert_eq!(
            stats,
            QueueStats {
                queue_len: 2,
                capacity: 3,
                overflow_count: 2,
                emitted_count: 1,
                subscriber_count: 4,
                last_emit_ms: 250,
                min_interval_ms: 250,
            }
        );
    }
}
