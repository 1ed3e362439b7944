use thiserror::Error;

use crate::core::subscriber::SubscriberId;

/// Faults reported by the tempo service.
///
/// A full buffer and a rate-gated poll are normal pacing outcomes and are
/// reported through return values, never through this type.
#[derive(Debug, Error)]
pub enum TempoError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("subscriber limit reached (max {max})")]
    SubscriberLimit { max: usize },

    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(SubscriberId),

    #[error("drainer is not running")]
    DrainerClosed,

    #[error("failed to encode tempo payload: {0}")]
    Encode(#[from] serde_json::Error),
}
