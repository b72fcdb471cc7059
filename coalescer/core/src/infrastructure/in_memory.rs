// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Volume Backend
//!
//! Simulated block storage for the CLI and for tests. Applies the same
//! acceptance rules a real backend would for a modification (the volume must
//! exist, it may only grow, and it may not exceed the maximum size) and counts
//! every call so callers can see how many requests were coalesced away.
//!
//! **Limitations:**
//! - State is lost when the process exits
//! - No modification cooldown or optimizing/completed states

use crate::domain::volume::{DiskOptions, ModifyVolumeError, TagModification, VolumeId, VolumeModifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_SIZE_GIB: u32 = 16 * 1024;
const DEFAULT_VOLUME_TYPE: &str = "gp3";

/// Current state of one simulated volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeRecord {
    pub size_gib: u32,
    pub volume_type: String,
    pub iops: Option<u32>,
    pub throughput: Option<u32>,
    pub tags: BTreeMap<String, String>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl VolumeRecord {
    fn new(size_gib: u32) -> Self {
        Self {
            size_gib,
            volume_type: DEFAULT_VOLUME_TYPE.to_string(),
            iops: None,
            throughput: None,
            tags: BTreeMap::new(),
            modified_at: None,
        }
    }
}

pub struct InMemoryVolumeModifier {
    volumes: Mutex<HashMap<VolumeId, VolumeRecord>>,
    max_size_gib: u32,
    latency: Duration,
    modify_calls: AtomicUsize,
    tag_calls: AtomicUsize,
}

impl InMemoryVolumeModifier {
    pub fn new() -> Self {
        Self {
            volumes: Mutex::new(HashMap::new()),
            max_size_gib: DEFAULT_MAX_SIZE_GIB,
            latency: Duration::ZERO,
            modify_calls: AtomicUsize::new(0),
            tag_calls: AtomicUsize::new(0),
        }
    }

    /// Largest size a volume may be grown to
    pub fn with_max_size_gib(mut self, max_size_gib: u32) -> Self {
        self.max_size_gib = max_size_gib;
        self
    }

    /// Delay applied to every backend call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_volume(self, volume_id: impl Into<VolumeId>, size_gib: u32) -> Self {
        self.add_volume(volume_id, size_gib);
        self
    }

    pub fn add_volume(&self, volume_id: impl Into<VolumeId>, size_gib: u32) {
        self.volumes.lock().insert(volume_id.into(), VolumeRecord::new(size_gib));
    }

    pub fn volume(&self, volume_id: &VolumeId) -> Option<VolumeRecord> {
        self.volumes.lock().get(volume_id).cloned()
    }

    /// Number of `resize_or_modify` calls received
    pub fn modify_calls(&self) -> usize {
        self.modify_calls.load(Ordering::SeqCst)
    }

    /// Number of `modify_tags` calls received
    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for InMemoryVolumeModifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VolumeModifier for InMemoryVolumeModifier {
    async fn modify_tags(&self, volume_id: &VolumeId, tags: &TagModification) -> Result<(), ModifyVolumeError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut volumes = self.volumes.lock();
        let record = volumes.get_mut(volume_id).ok_or_else(|| ModifyVolumeError::TagUpdate {
            volume_id: volume_id.clone(),
            reason: "volume not found".to_string(),
        })?;

        for key in &tags.remove {
            record.tags.remove(key);
        }
        record
            .tags
            .extend(tags.add.iter().map(|(k, v)| (k.clone(), v.clone())));
        record.modified_at = Some(Utc::now());

        debug!(volume_id = %volume_id, added = tags.add.len(), removed = tags.remove.len(), "Updated volume tags");
        Ok(())
    }

    async fn resize_or_modify(
        &self,
        volume_id: &VolumeId,
        size_gib: Option<u32>,
        options: &DiskOptions,
    ) -> Result<u32, ModifyVolumeError> {
        self.modify_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut volumes = self.volumes.lock();
        let record = volumes
            .get_mut(volume_id)
            .ok_or_else(|| ModifyVolumeError::VolumeNotFound(volume_id.clone()))?;

        if let Some(size_gib) = size_gib {
            if size_gib < record.size_gib {
                return Err(ModifyVolumeError::Backend {
                    volume_id: volume_id.clone(),
                    reason: format!("cannot shrink from {} GiB to {} GiB", record.size_gib, size_gib),
                });
            }
            if size_gib > self.max_size_gib {
                return Err(ModifyVolumeError::Backend {
                    volume_id: volume_id.clone(),
                    reason: format!("{} GiB exceeds the maximum of {} GiB", size_gib, self.max_size_gib),
                });
            }
        }

        if size_gib.is_none() && options.is_empty() {
            return Ok(record.size_gib);
        }

        if let Some(size_gib) = size_gib {
            record.size_gib = size_gib;
        }
        if let Some(volume_type) = &options.volume_type {
            record.volume_type = volume_type.clone();
        }
        if options.iops.is_some() {
            record.iops = options.iops;
        }
        if options.throughput.is_some() {
            record.throughput = options.throughput;
        }
        record.modified_at = Some(Utc::now());

        debug!(volume_id = %volume_id, size_gib = record.size_gib, "Modified volume");
        Ok(record.size_gib)
    }
}
