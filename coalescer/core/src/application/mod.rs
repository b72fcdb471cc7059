// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coalescer Application Layer
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`coalescer`] | `Coalescer` handle and its coordinator task |
//! | [`volume_modification`] | `ModifyVolumeService`, `VolumeServiceError` |

mod batch;
pub mod coalescer;
pub mod volume_modification;

pub use coalescer::Coalescer;
pub use volume_modification::{ModifyVolumeService, VolumeServiceError};
