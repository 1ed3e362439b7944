use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};

/// A payload travelling through the broadcast queue.
///
/// `subscriber_count` is the snapshot taken when the message was enqueued.
/// It is carried for diagnostics and never consulted by queue logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub payload: Bytes,
    pub enqueued_at: u64,
    /// Set by the queue at the moment the message leaves the buffer.
    pub emitted_at: Option<u64>,
    pub subscriber_count: u32,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>, enqueued_at: u64, subscriber_count: u32) -> Self {
        Self {
            id: generate_id(),
            payload: payload.into(),
            enqueued_at,
            emitted_at: None,
            subscriber_count,
        }
    }

    /// Emission time once emitted, enqueue time before that.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.emitted_at.unwrap_or(self.enqueued_at)
    }

    /// Milliseconds spent waiting in the buffer, if emitted.
    pub fn queue_latency_ms(&self) -> Option<u64> {
        self.emitted_at
            .map(|emitted| emitted.saturating_sub(self.enqueued_at))
    }
}

/// Generates a monotonically increasing u64 ID (fast, lock-free).
static NEXT_ID: AtomicU64 = AtomicU64::new(1);
fn generate_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}
