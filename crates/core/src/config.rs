// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! model = "immutable"
//! codecs = ["bincode", "json"]
//!
//! [snapshotting]
//! every = 1000
//! interval = "30s"
//!
//! [journaling]
//! tx_volume_size = 67108864
//! channel = "fsync"
//! ```

use crate::serializer::Codec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How domain entities are changed inside a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Entities are modified in place; undo keeps serialized pre-images
    #[default]
    Mutable,
    /// Entities are replaced copy-on-write; undo keeps prior pointers
    Immutable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshottingConfig {
    /// Take a snapshot during clean shutdown
    pub at_shutdown: bool,
    /// Snapshot after every N transactions; 0 disables
    pub every: u64,
    /// Snapshot on a fixed wall-clock period
    #[serde(with = "humantime_serde")]
    pub interval: Option<Duration>,
}

/// Durability of journal writes at the end of each batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Flush and fsync
    #[default]
    Fsync,
    /// Flush to the OS only
    Buffered,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalingConfig {
    /// Roll the transaction journal once a segment exceeds this many bytes; 0 never
    pub tx_volume_size: u64,
    /// Roll the events journal once a segment exceeds this many bytes; 0 never
    pub events_volume_size: u64,
    pub channel: ChannelMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub map_capacity: usize,
    pub map_load_factor: f32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            map_capacity: 512,
            map_load_factor: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model: ModelType,
    pub codecs: Vec<Codec>,
    pub snapshotting: SnapshottingConfig,
    pub journaling: JournalingConfig,
    pub repository: RepositoryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelType::default(),
            codecs: vec![Codec::Bincode, Codec::Json],
            snapshotting: SnapshottingConfig::default(),
            journaling: JournalingConfig::default(),
            repository: RepositoryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.codecs.is_empty() {
            return Err(ConfigError::Invalid("codecs must not be empty".to_string()));
        }
        if !(self.repository.map_load_factor > 0.0 && self.repository.map_load_factor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "map_load_factor must be in (0, 1], got {}",
                self.repository.map_load_factor
            )));
        }
        if self.snapshotting.interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::Invalid("snapshot interval must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_model(mut self, model: ModelType) -> Self {
        self.model = model;
        self
    }

    pub fn with_snapshot_every(mut self, every: u64) -> Self {
        self.snapshotting.every = every;
        self
    }

    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshotting.interval = Some(interval);
        self
    }

    pub fn with_snapshot_at_shutdown(mut self, at_shutdown: bool) -> Self {
        self.snapshotting.at_shutdown = at_shutdown;
        self
    }

    pub fn with_volume_sizes(mut self, tx: u64, events: u64) -> Self {
        self.journaling.tx_volume_size = tx;
        self.journaling.events_volume_size = events;
        self
    }

    pub fn with_codecs(mut self, codecs: Vec<Codec>) -> Self {
        self.codecs = codecs;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
