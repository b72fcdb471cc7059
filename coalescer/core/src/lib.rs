// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `volume-coalescer-core` - Key-Scoped Request Coalescing
//!
//! Collapses concurrent "modify this resource" requests that arrive for the
//! same key into a single outbound operation and fans the one outcome back
//! out to every caller that was folded into it.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `CoalescerConfig`, `CoalesceError`, `ModifyVolumeRequest`, `VolumeModifier` |
//! | [`application`] | Application | `Coalescer` engine, `ModifyVolumeService` |
//! | [`infrastructure`] | Infrastructure | `InMemoryVolumeModifier` backend |
//!
//! ## Key Concepts
//!
//! - **Batch**: the merged input for one key, accumulated during a fixed
//!   window that starts with the first request for that key.
//! - **Coordinator**: the single task that owns every pending batch. Callers
//!   and timers only talk to it through channels.
//! - **Waiter**: a one-shot handle per caller, resolved exactly once, either
//!   immediately (merge rejected) or when the batch executes.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::{Coalescer, ModifyVolumeService};
