// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coalescer Domain Layer
//!
//! Pure types with no runtime dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`config`] | `CoalescerConfig`, `ConfigError` |
//! | [`error`] | `CoalesceError` |
//! | [`volume`] | `VolumeId`, `ModifyVolumeRequest`, `VolumeModifier` |

pub mod config;
pub mod error;
pub mod volume;

pub use config::*;
pub use error::*;
pub use volume::*;
