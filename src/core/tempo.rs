use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The reading the device broadcasts: current tempo and whether it has
/// settled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoUpdate {
    pub bpm: f32,
    pub stable: bool,
}

impl TempoUpdate {
    pub fn new(bpm: f32, stable: bool) -> Self {
        Self { bpm, stable }
    }

    /// JSON body, e.g. `{"bpm":120.0,"stable":true}`.
    pub fn to_payload(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
