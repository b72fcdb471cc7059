// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Coalescer Configuration
//
// The debounce delay is the only tuning knob the engine has. The name is
// carried into every log line and metric label so several coalescers in one
// process can be told apart.
//
// Example (YAML):
//
//   name: modify-volume
//   delay: 2s

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Settings for a single [`Coalescer`](crate::application::Coalescer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalescerConfig {
    /// Label used in logs and metrics
    #[serde(default = "default_name")]
    pub name: String,

    /// Fixed wait after the first request for a key before that key's batch
    /// executes. Later requests joining the batch do not extend it.
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,
}

impl CoalescerConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            name: default_name(),
            delay,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self::new(default_delay())
    }
}

fn default_name() -> String {
    "coalescer".to_string()
}

fn default_delay() -> Duration {
    Duration::from_secs(2)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
