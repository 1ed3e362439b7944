//! Rate-gated broadcast queue.
//!
//! A bounded FIFO that accepts producer messages without ever blocking and
//! releases at most one message per poll, subject to a minimum interval
//! between emissions.
//!
//! Supports:
//! - Overflow policies (drop newest / drop oldest)
//! - Bounded or unbounded retention of the emitted log

pub mod broadcast;
pub mod policy;

pub use broadcast::{BroadcastQueue, QueueStats, NEVER_EMITTED};
pub use policy::OverflowPolicy;
