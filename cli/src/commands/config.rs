// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use super::load_config;
use volume_coalescer_core::CoalescerConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration as YAML
    Show,

    /// Validate a configuration file
    Validate {
        /// Path to config file (default: --config)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show => show(config_override),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
    }
}

fn show(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;

    match &config_path {
        Some(path) => println!("{} {}", "Configuration from".bold(), path.display()),
        None => println!("{}", "Default configuration:".bold()),
    }
    println!();
    print!("{}", config.to_yaml().context("Failed to render configuration")?);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.context("No configuration file given (pass FILE or --config)")?;
    println!("Validating {}...", path.display());

    let config = CoalescerConfig::from_file(&path)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    println!("{} Configuration is valid", "✓".green());
    println!("  Name: {}", config.name);
    println!("  Delay: {}", humantime::format_duration(config.delay));

    Ok(())
}
