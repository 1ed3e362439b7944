//! tempocast – paced broadcasting of a live tempo reading.
//!
//! This crate exports
//!  * `core`    – message, rate-gated broadcast queue, clock, fan-out sink, drainer
//!  * `service` – wiring of queue + sink + drainer into one tempo service
//!  * `config`  – TOML-driven runtime configuration
//!
//! A producer pushes measurements with [`BroadcastQueue::enqueue`]; a drainer
//! calls [`BroadcastQueue::poll`] on its own cadence and hands at most one
//! message per eligible poll to the transport sink.

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;
pub mod service;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use config::{load_config, Config};
pub use crate::core::error::TempoError;
pub use crate::core::message::Message;
pub use crate::core::queue::{BroadcastQueue, OverflowPolicy, QueueStats};
pub use service::TempoService;
