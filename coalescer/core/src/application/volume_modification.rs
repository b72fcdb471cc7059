// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Modification Application Service
//!
//! Expansion and attribute changes for the same volume share one coalescer
//! keyed by [`VolumeId`], so a resize and a type change arriving together
//! reach the storage backend as a single call.

use crate::application::coalescer::Coalescer;
use crate::domain::config::CoalescerConfig;
use crate::domain::error::CoalesceError;
use crate::domain::volume::{
    bytes_to_gib_rounded_up, ModifyVolumeError, ModifyVolumeRequest, VolumeId, VolumeModifier, GIB,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VolumeServiceError {
    /// Rejected before it was submitted for coalescing.
    #[error("invalid request: {0}")]
    InvalidRequest(ModifyVolumeError),

    #[error(transparent)]
    Coalesce(#[from] CoalesceError<ModifyVolumeError>),
}

pub struct ModifyVolumeService {
    coalescer: Coalescer<VolumeId, ModifyVolumeRequest, u32, ModifyVolumeError>,
}

impl ModifyVolumeService {
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: CoalescerConfig, modifier: Arc<dyn VolumeModifier>) -> Self {
        let coalescer = Coalescer::with_config(
            config,
            ModifyVolumeRequest::merge,
            move |volume_id: VolumeId, request: ModifyVolumeRequest| {
                execute_modification(Arc::clone(&modifier), volume_id, request)
            },
        );
        Self { coalescer }
    }

    /// Grow `volume_id` to at least `required_bytes`. Returns the resulting
    /// capacity in bytes.
    pub async fn expand_volume(&self, volume_id: VolumeId, required_bytes: u64) -> Result<u64, VolumeServiceError> {
        if required_bytes == 0 {
            return Err(VolumeServiceError::InvalidRequest(ModifyVolumeError::InvalidParameter {
                key: "capacity".to_string(),
                reason: "required bytes must be greater than zero".to_string(),
            }));
        }
        let size_gib = u32::try_from(bytes_to_gib_rounded_up(required_bytes)).map_err(|_| {
            VolumeServiceError::InvalidRequest(ModifyVolumeError::InvalidParameter {
                key: "capacity".to_string(),
                reason: format!("{required_bytes} bytes exceeds the largest supported volume"),
            })
        })?;

        info!(volume_id = %volume_id, size_gib, "Expanding volume");
        let new_size_gib = self
            .coalescer
            .coalesce(volume_id.clone(), ModifyVolumeRequest::resize(size_gib))
            .await?;
        debug!(volume_id = %volume_id, new_size_gib, "Volume expansion completed");

        Ok(u64::from(new_size_gib) * GIB)
    }

    /// Apply `request` to `volume_id`. Returns the size in GiB afterwards.
    pub async fn modify_volume(
        &self,
        volume_id: VolumeId,
        request: ModifyVolumeRequest,
    ) -> Result<u32, VolumeServiceError> {
        info!(volume_id = %volume_id, request = ?request, "Modifying volume");
        Ok(self.coalescer.coalesce(volume_id, request).await?)
    }

    /// Parse orchestrator mutable parameters, then [`modify_volume`](Self::modify_volume).
    pub async fn modify_volume_with_parameters(
        &self,
        volume_id: VolumeId,
        parameters: &HashMap<String, String>,
    ) -> Result<u32, VolumeServiceError> {
        let request = ModifyVolumeRequest::from_parameters(parameters).map_err(VolumeServiceError::InvalidRequest)?;
        self.modify_volume(volume_id, request).await
    }
}

async fn execute_modification(
    modifier: Arc<dyn VolumeModifier>,
    volume_id: VolumeId,
    request: ModifyVolumeRequest,
) -> Result<u32, ModifyVolumeError> {
    if !request.tags.is_empty() {
        modifier.modify_tags(&volume_id, &request.tags).await?;
    }
    modifier
        .resize_or_modify(&volume_id, request.size_gib, &request.disk)
        .await
}
