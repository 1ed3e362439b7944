use std::sync::atomic::{AtomicU64, Ordering};

// Global counters (low overhead). These are coarse-grained and process-wide.
static ENQUEUED: AtomicU64 = AtomicU64::new(0);
static DROPPED_OVERFLOW: AtomicU64 = AtomicU64::new(0);
static EMITTED: AtomicU64 = AtomicU64::new(0);
static DELIVERED: AtomicU64 = AtomicU64::new(0);
static DROPPED_SLOW_SUBSCRIBER: AtomicU64 = AtomicU64::new(0);

// Gauge
static SUBSCRIBERS: AtomicU64 = AtomicU64::new(0);

#[inline]
pub fn inc_enqueued(n: u64) {
    ENQUEUED.fetch_add(n, Ordering::Relaxed);
}
#[inline]
pub fn inc_dropped_overflow(n: u64) {
    DROPPED_OVERFLOW.fetch_add(n, Ordering::Relaxed);
}
#[inline]
pub fn inc_emitted(n: u64) {
    EMITTED.fetch_add(n, Ordering::Relaxed);
}
#[inline]
pub fn inc_delivered(n: u64) {
    DELIVERED.fetch_add(n, Ordering::Relaxed);
}
#[inline]
pub fn inc_dropped_slow_subscriber(n: u64) {
    DROPPED_SLOW_SUBSCRIBER.fetch_add(n, Ordering::Relaxed);
}
#[inline]
pub fn set_subscribers(n: u64) {
    SUBSCRIBERS.store(n, Ordering::Relaxed);
}

pub fn snapshot() -> String {
    // Simple text format (Prometheus-style without HELP/TYPE lines for brevity)
    format!(
        "tempocast_enqueued {}\ntempocast_dropped_overflow {}\ntempocast_emitted {}\ntempocast_delivered {}\ntempocast_dropped_slow_subscriber {}\ntempocast_subscribers {}\n",
        ENQUEUED.load(Ordering::Relaxed),
        DROPPED_OVERFLOW.load(Ordering::Relaxed),
        EMITTED.load(Ordering::Relaxed),
        DELIVERED.load(Ordering::Relaxed),
        DROPPED_SLOW_SUBSCRIBER.load(Ordering::Relaxed),
        SUBSCRIBERS.load(Ordering::Relaxed),
    )
}
