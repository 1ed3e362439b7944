use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What `enqueue` does when the buffer is already at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the message being submitted; the buffer is left untouched.
    #[default]
    DropNewest,
    /// Evict the oldest buffered message to make room for the new one.
    /// With a capacity of one this keeps only the latest pending value.
    DropOldest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => f.write_str("drop_newest"),
            OverflowPolicy::DropOldest => f.write_str("drop_oldest"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop_newest" | "drop_new" => Ok(OverflowPolicy::DropNewest),
            "drop_oldest" | "drop_old" => Ok(OverflowPolicy::DropOldest),
            other => Err(format!("unknown overflow policy: {other}")),
        }
    }
}
