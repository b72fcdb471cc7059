// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Volume Modification Domain
//!
//! Resize and attribute changes for a block volume arrive as independent
//! requests (an expansion from one caller, a type or IOPS change from
//! another). They are folded into a single [`ModifyVolumeRequest`] per volume
//! so the storage backend sees one call per window.
//!
//! - [`ModifyVolumeRequest::merge`] is the merge rule handed to the coalescer.
//! - [`VolumeModifier`] is the backend port the batched request executes against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use thiserror::Error;

/// Bytes per GiB.
pub const GIB: u64 = 1 << 30;

const PARAM_VOLUME_TYPE: &str = "type";
const PARAM_IOPS: &str = "iops";
const PARAM_THROUGHPUT: &str = "throughput";
const PARAM_TAG_SPECIFICATION_PREFIX: &str = "tagspecification";
const PARAM_TAG_DELETION_PREFIX: &str = "tagdeletion";

// ============================================================================
// Value Objects
// ============================================================================

/// Backend identifier of a block volume (e.g. `vol-0a1b2c`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub String);

impl VolumeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VolumeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VolumeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Mutable disk attributes. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,
    /// MiB/s
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<u32>,
}

impl DiskOptions {
    pub fn is_empty(&self) -> bool {
        self.volume_type.is_none() && self.iops.is_none() && self.throughput.is_none()
    }
}

/// Tags to set and tag keys to delete on a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagModification {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub remove: BTreeSet<String>,
}

impl TagModification {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Everything that should change on one volume, possibly accumulated from
/// several callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyVolumeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gib: Option<u32>,
    #[serde(default)]
    pub disk: DiskOptions,
    #[serde(default)]
    pub tags: TagModification,
}

impl ModifyVolumeRequest {
    /// A request that only grows the volume.
    pub fn resize(size_gib: u32) -> Self {
        Self {
            size_gib: Some(size_gib),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.add.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.size_gib.is_none() && self.disk.is_empty() && self.tags.is_empty()
    }

    /// Build a request from orchestrator-supplied mutable parameters.
    ///
    /// Keys are matched case-insensitively:
    /// - `type`, `iops`, `throughput`
    /// - `tagSpecification_<n>` with a `key=value` value
    /// - `tagDeletion_<n>` with a tag key value
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Result<Self, ModifyVolumeError> {
        let mut request = Self::default();

        for (key, value) in parameters {
            let lowered = key.to_lowercase();
            match lowered.as_str() {
                PARAM_VOLUME_TYPE => {
                    if value.trim().is_empty() {
                        return Err(ModifyVolumeError::invalid(key, "volume type must not be empty"));
                    }
                    request.disk.volume_type = Some(value.trim().to_string());
                }
                PARAM_IOPS => request.disk.iops = Some(parse_u32(key, value)?),
                PARAM_THROUGHPUT => request.disk.throughput = Some(parse_u32(key, value)?),
                _ if lowered.starts_with(PARAM_TAG_SPECIFICATION_PREFIX) => {
                    let (tag_key, tag_value) = value
                        .split_once('=')
                        .map(|(k, v)| (k.trim(), v.trim()))
                        .filter(|(k, _)| !k.is_empty())
                        .ok_or_else(|| ModifyVolumeError::invalid(key, "expected key=value"))?;
                    if let Some(previous) = request.tags.add.get(tag_key) {
                        if previous != tag_value {
                            return Err(ModifyVolumeError::invalid(
                                key,
                                format!("tag {tag_key} specified with conflicting values"),
                            ));
                        }
                    }
                    request.tags.add.insert(tag_key.to_string(), tag_value.to_string());
                }
                _ if lowered.starts_with(PARAM_TAG_DELETION_PREFIX) => {
                    let tag_key = value.trim();
                    if tag_key.is_empty() {
                        return Err(ModifyVolumeError::invalid(key, "tag key must not be empty"));
                    }
                    request.tags.remove.insert(tag_key.to_string());
                }
                _ => return Err(ModifyVolumeError::invalid(key, "unknown mutable parameter")),
            }
        }

        if let Some(tag_key) = request.tags.add.keys().find(|k| request.tags.remove.contains(*k)) {
            return Err(ModifyVolumeError::invalid(
                tag_key,
                "tag cannot be both specified and deleted",
            ));
        }

        Ok(request)
    }

    /// Fold `self` (a newly arrived request) into `pending`.
    ///
    /// Fields set in both must agree. On conflict `pending` is untouched and
    /// the caller that sent `self` gets the error.
    pub fn merge(self, pending: &Self) -> Result<Self, ModifyVolumeError> {
        let mut merged = pending.clone();

        merged.size_gib = merge_field("size", self.size_gib, &pending.size_gib)?;
        merged.disk.volume_type =
            merge_field("volume type", self.disk.volume_type, &pending.disk.volume_type)?;
        merged.disk.iops = merge_field("iops", self.disk.iops, &pending.disk.iops)?;
        merged.disk.throughput =
            merge_field("throughput", self.disk.throughput, &pending.disk.throughput)?;

        for (key, value) in self.tags.add {
            if pending.tags.remove.contains(&key) {
                return Err(ModifyVolumeError::Conflict {
                    field: format!("tag {key}"),
                    current: "<deleted>".to_string(),
                    requested: value,
                });
            }
            if let Some(current) = merged.tags.add.get(&key) {
                if *current != value {
                    return Err(ModifyVolumeError::Conflict {
                        field: format!("tag {key}"),
                        current: current.clone(),
                        requested: value,
                    });
                }
            }
            merged.tags.add.insert(key, value);
        }

        for key in self.tags.remove {
            if let Some(current) = pending.tags.add.get(&key) {
                return Err(ModifyVolumeError::Conflict {
                    field: format!("tag {key}"),
                    current: current.clone(),
                    requested: "<deleted>".to_string(),
                });
            }
            merged.tags.remove.insert(key);
        }

        Ok(merged)
    }
}

fn merge_field<T>(field: &str, requested: Option<T>, current: &Option<T>) -> Result<Option<T>, ModifyVolumeError>
where
    T: Clone + PartialEq + Display,
{
    match (requested, current) {
        (None, current) => Ok(current.clone()),
        (Some(requested), Some(current)) if requested != *current => Err(ModifyVolumeError::Conflict {
            field: field.to_string(),
            current: current.to_string(),
            requested: requested.to_string(),
        }),
        (Some(requested), _) => Ok(Some(requested)),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ModifyVolumeError> {
    value
        .trim()
        .parse()
        .map_err(|e| ModifyVolumeError::invalid(key, format!("{value:?} is not a valid number: {e}")))
}

/// Smallest whole number of GiB holding `bytes`.
pub fn bytes_to_gib_rounded_up(bytes: u64) -> u64 {
    bytes.div_ceil(GIB)
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while parsing, merging or applying a volume modification.
///
/// Cloneable because an execution failure is handed to every caller of the
/// batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModifyVolumeError {
    #[error("different {field} was requested by a previous request: current {current}, requested {requested}")]
    Conflict {
        field: String,
        current: String,
        requested: String,
    },

    #[error("invalid parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("volume {0} not found")]
    VolumeNotFound(VolumeId),

    #[error("could not modify tags of volume {volume_id}: {reason}")]
    TagUpdate { volume_id: VolumeId, reason: String },

    #[error("could not modify volume {volume_id}: {reason}")]
    Backend { volume_id: VolumeId, reason: String },
}

impl ModifyVolumeError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Backend Port
// ============================================================================

/// Storage backend operations a batched modification executes against.
#[async_trait]
pub trait VolumeModifier: Send + Sync {
    /// Apply tag additions and deletions.
    async fn modify_tags(&self, volume_id: &VolumeId, tags: &TagModification) -> Result<(), ModifyVolumeError>;

    /// Grow the volume and/or change its attributes. Returns the size in GiB
    /// after the change.
    async fn resize_or_modify(
        &self,
        volume_id: &VolumeId,
        size_gib: Option<u32>,
        options: &DiskOptions,
    ) -> Result<u32, ModifyVolumeError>;
}
