// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the coalesce CLI

pub mod config;
pub mod simulate;

pub use self::config::ConfigCommand;
pub use self::simulate::SimulateArgs;

use anyhow::{Context, Result};
use std::path::Path;
use volume_coalescer_core::CoalescerConfig;

/// Load the config file if one was given, otherwise the defaults
pub(crate) fn load_config(path: Option<&Path>) -> Result<CoalescerConfig> {
    match path {
        Some(path) => CoalescerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(CoalescerConfig::default().with_name("modify-volume")),
    }
}
