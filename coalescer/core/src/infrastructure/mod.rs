// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure adapters for the [`VolumeModifier`](crate::domain::VolumeModifier) port.

pub mod in_memory;

pub use in_memory::{InMemoryVolumeModifier, VolumeRecord};
