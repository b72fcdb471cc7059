// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Simulation command
//!
//! Fires a burst of concurrent modification requests per volume at an
//! in-memory backend and reports what each caller got back and how many
//! backend calls the burst turned into.
//!
//! Per volume, request 0 grows the volume to `--size`, the last
//! `--conflicts` requests ask for a different size (and are rejected at
//! merge time), and the rest each add one tag.

use anyhow::{ensure, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::load_config;
use volume_coalescer_core::application::VolumeServiceError;
use volume_coalescer_core::infrastructure::{InMemoryVolumeModifier, VolumeRecord};
use volume_coalescer_core::{CoalesceError, CoalescerConfig, ModifyVolumeRequest, ModifyVolumeService, VolumeId};

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of volumes modified in parallel
    #[arg(long, default_value_t = 1)]
    pub volumes: usize,

    /// Concurrent requests per volume
    #[arg(long, default_value_t = 10)]
    pub requests: usize,

    /// Coalescing window (overrides the config file), e.g. 50ms
    #[arg(long, value_parser = humantime::parse_duration)]
    pub delay: Option<Duration>,

    /// Requests per volume that ask for a conflicting size
    #[arg(long, default_value_t = 0)]
    pub conflicts: usize,

    /// Size of every volume before the burst, in GiB
    #[arg(long, default_value_t = 10)]
    pub initial_size: u32,

    /// Size requested by the burst, in GiB
    #[arg(long, default_value_t = 20)]
    pub size: u32,

    /// Simulated backend latency per call
    #[arg(long, value_parser = humantime::parse_duration, default_value = "20ms")]
    pub latency: Duration,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub coalescer: String,
    pub delay_ms: u64,
    pub backend_modify_calls: usize,
    pub backend_tag_calls: usize,
    pub volumes: Vec<VolumeReport>,
}

#[derive(Debug, Serialize)]
pub struct VolumeReport {
    pub volume_id: VolumeId,
    pub outcomes: Vec<RequestOutcome>,
    pub final_state: Option<VolumeRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Applied,
    Rejected,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct RequestOutcome {
    pub request: usize,
    pub status: RequestStatus,
    pub detail: String,
}

impl VolumeReport {
    pub fn count(&self, status: RequestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

pub async fn handle_command(args: SimulateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(delay) = args.delay {
        config.delay = delay;
    }

    let report = run_simulation(config, &args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Request `index` of `args.requests` for one volume.
pub fn plan_request(index: usize, args: &SimulateArgs) -> ModifyVolumeRequest {
    let first_conflict = args.requests.saturating_sub(args.conflicts).max(1);
    if index == 0 {
        ModifyVolumeRequest::resize(args.size)
    } else if index >= first_conflict {
        ModifyVolumeRequest::resize(args.size.saturating_add(u32::try_from(index).unwrap_or(u32::MAX)))
    } else {
        ModifyVolumeRequest::default().with_tag(format!("request-{index}"), "applied")
    }
}

pub async fn run_simulation(config: CoalescerConfig, args: &SimulateArgs) -> Result<SimulationReport> {
    ensure!(args.volumes > 0, "--volumes must be at least 1");
    ensure!(args.requests > 0, "--requests must be at least 1");
    ensure!(
        args.conflicts < args.requests,
        "--conflicts must leave at least one non-conflicting request"
    );

    let backend = Arc::new(InMemoryVolumeModifier::new().with_latency(args.latency));
    let volume_ids: Vec<VolumeId> = (1..=args.volumes)
        .map(|n| VolumeId::new(format!("vol-{n:04}")))
        .collect();
    for volume_id in &volume_ids {
        backend.add_volume(volume_id.clone(), args.initial_size);
    }

    info!(
        coalescer = %config.name,
        volumes = args.volumes,
        requests = args.requests,
        delay = %humantime::format_duration(config.delay),
        "Starting simulation"
    );
    let coalescer = config.name.clone();
    let delay_ms = u64::try_from(config.delay.as_millis()).unwrap_or(u64::MAX);
    let service = ModifyVolumeService::new(config, backend.clone());

    let bursts = volume_ids.iter().map(|volume_id| {
        let service = &service;
        async move {
            let calls = (0..args.requests).map(move |index| {
                let request = plan_request(index, args);
                service.modify_volume(volume_id.clone(), request)
            });
            let results = futures::future::join_all(calls).await;
            let outcomes = results
                .into_iter()
                .enumerate()
                .map(|(request, result)| to_outcome(request, result))
                .collect::<Vec<_>>();
            (volume_id.clone(), outcomes)
        }
    });
    let bursts = futures::future::join_all(bursts).await;

    let volumes = bursts
        .into_iter()
        .map(|(volume_id, outcomes)| VolumeReport {
            final_state: backend.volume(&volume_id),
            volume_id,
            outcomes,
        })
        .collect();

    Ok(SimulationReport {
        coalescer,
        delay_ms,
        backend_modify_calls: backend.modify_calls(),
        backend_tag_calls: backend.tag_calls(),
        volumes,
    })
}

fn to_outcome(request: usize, result: Result<u32, VolumeServiceError>) -> RequestOutcome {
    let (status, detail) = match result {
        Ok(size_gib) => (RequestStatus::Applied, format!("volume is now {size_gib} GiB")),
        Err(VolumeServiceError::Coalesce(CoalesceError::Merge(e))) => (RequestStatus::Rejected, e.to_string()),
        Err(e) => (RequestStatus::Failed, e.to_string()),
    };
    RequestOutcome {
        request,
        status,
        detail,
    }
}

fn print_report(report: &SimulationReport) {
    println!(
        "{} {} (window {} ms)",
        "Coalescer".bold(),
        report.coalescer,
        report.delay_ms
    );
    println!();

    for volume in &report.volumes {
        println!(
            "{}  {} applied, {} rejected, {} failed",
            volume.volume_id.to_string().bold(),
            volume.count(RequestStatus::Applied).to_string().green(),
            volume.count(RequestStatus::Rejected).to_string().yellow(),
            volume.count(RequestStatus::Failed).to_string().red(),
        );
        for outcome in &volume.outcomes {
            let status = match outcome.status {
                RequestStatus::Applied => "applied ".green(),
                RequestStatus::Rejected => "rejected".yellow(),
                RequestStatus::Failed => "failed  ".red(),
            };
            println!("  #{:<4} {}  {}", outcome.request, status, outcome.detail);
        }
        if let Some(state) = &volume.final_state {
            println!(
                "  final: {} GiB, type {}, {} tag(s)",
                state.size_gib,
                state.volume_type,
                state.tags.len()
            );
        }
        println!();
    }

    let total: usize = report.volumes.iter().map(|v| v.outcomes.len()).sum();
    println!(
        "{} {} requests -> {} backend modify call(s), {} tag call(s)",
        "Summary:".bold(),
        total,
        report.backend_modify_calls,
        report.backend_tag_calls
    );
}
