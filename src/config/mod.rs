use anyhow::Context;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::core::error::TempoError;
use crate::core::queue::OverflowPolicy;

/// Environment variable that overrides the config path used by the binary.
pub const CONFIG_ENV: &str = "TEMPOCAST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tempocast.toml";
/// Emitted-log cap the service applies when `queue.log_retention` is unset.
pub const DEFAULT_LOG_RETENTION: usize = 64;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub min_interval_ms: u64,
    pub overflow_policy: OverflowPolicy,
    /// Keep only the newest N emitted messages; `None` keeps all of them.
    pub log_retention: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            min_interval_ms: 500,
            overflow_policy: OverflowPolicy::DropNewest,
            log_retention: None,
        }
    }
}

impl QueueConfig {
    pub fn new(capacity: usize, min_interval_ms: u64) -> Self {
        Self {
            capacity,
            min_interval_ms,
            ..Self::default()
        }
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_log_retention(mut self, retention: usize) -> Self {
        self.log_retention = Some(retention);
        self
    }

    pub fn validate(&self) -> Result<(), TempoError> {
        if self.capacity == 0 {
            return Err(TempoError::InvalidConfig(
                "queue.capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DrainerConfig {
    pub poll_interval_ms: u64,
}

impl Default for DrainerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SubscriberConfig {
    pub max_subscribers: usize,
    pub channel_capacity: usize,
    pub initial_count_hint: u32,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 4,
            channel_capacity: 16,
            initial_count_hint: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub queue: QueueConfig,
    pub drainer: DrainerConfig,
    pub subscribers: SubscriberConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), TempoError> {
        self.queue.validate()?;
        if self.drainer.poll_interval_ms == 0 {
            return Err(TempoError::InvalidConfig(
                "drainer.poll_interval_ms must be at least 1".into(),
            ));
        }
        if self.subscribers.max_subscribers == 0 {
            return Err(TempoError::InvalidConfig(
                "subscribers.max_subscribers must be at least 1".into(),
            ));
        }
        if self.subscribers.channel_capacity == 0 {
            return Err(TempoError::InvalidConfig(
                "subscribers.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Parses and validates a TOML document.
pub fn parse_config(raw: &str) -> Result<Config, anyhow::Error> {
    let config: Config = toml::from_str(raw).context("malformed tempocast config")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, anyhow::Error> {
    let path = path.as_ref();
    let raw: String = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&raw)
}
