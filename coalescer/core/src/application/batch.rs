// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pending batches and waiter handles.
//!
//! Only the coordinator task touches a [`PendingBatch`] while it is
//! accumulating. Once dispatched, the batch is moved into the execute task and
//! consumed by [`resolve`].

use crate::domain::error::CoalesceError;
use tokio::sync::oneshot;

pub(crate) type Outcome<O, E> = Result<O, CoalesceError<E>>;

/// Single-use delivery handle for one caller.
pub(crate) struct Waiter<O, E> {
    reply: oneshot::Sender<Outcome<O, E>>,
}

impl<O, E> Waiter<O, E> {
    pub(crate) fn new(reply: oneshot::Sender<Outcome<O, E>>) -> Self {
        Self { reply }
    }

    /// Best-effort, never blocks. Returns `false` if the caller stopped
    /// listening.
    pub(crate) fn deliver(self, outcome: Outcome<O, E>) -> bool {
        self.reply.send(outcome).is_ok()
    }
}

/// Merged input and accepted waiters for one key's open window.
pub(crate) struct PendingBatch<I, O, E> {
    pub(crate) id: u64,
    merged: I,
    waiters: Vec<Waiter<O, E>>,
}

impl<I, O, E> PendingBatch<I, O, E> {
    pub(crate) fn open(id: u64, input: I, waiter: Waiter<O, E>) -> Self {
        Self {
            id,
            merged: input,
            waiters: vec![waiter],
        }
    }

    /// Fold `input` into the batch. On rejection the batch is left as it was
    /// and the waiter is handed back together with the merge error.
    pub(crate) fn join<F>(&mut self, input: I, waiter: Waiter<O, E>, merge: F) -> Result<(), (Waiter<O, E>, E)>
    where
        F: FnOnce(I, &I) -> Result<I, E>,
    {
        match merge(input, &self.merged) {
            Ok(merged) => {
                self.merged = merged;
                self.waiters.push(waiter);
                Ok(())
            }
            Err(e) => Err((waiter, e)),
        }
    }

    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn into_parts(self) -> (I, Vec<Waiter<O, E>>) {
        (self.merged, self.waiters)
    }
}

/// Hand one execution outcome to every waiter. Returns how many waiters had
/// already gone away.
pub(crate) fn resolve<O, E>(waiters: Vec<Waiter<O, E>>, outcome: Result<O, E>) -> usize
where
    O: Clone,
    E: Clone,
{
    let outcome = outcome.map_err(CoalesceError::Execute);
    waiters
        .into_iter()
        .map(|waiter| waiter.deliver(outcome.clone()))
        .filter(|delivered| !delivered)
        .count()
}
