// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Outcome of a failed [`Coalescer::coalesce`](crate::application::Coalescer::coalesce) call.
///
/// `E` is the error type produced by the caller-supplied merge and execute
/// functions. A merge rejection is scoped to the one caller whose request
/// could not be folded into the pending batch; an execution failure is shared
/// verbatim by every caller of the executed batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoalesceError<E> {
    /// The merge function rejected this request. The pending batch is unchanged.
    #[error("request rejected by pending batch: {0}")]
    Merge(E),

    /// The batched operation ran and failed.
    #[error("coalesced operation failed: {0}")]
    Execute(E),

    /// The coordinator task is gone (runtime shut down or coordinator panic),
    /// so the request was never accepted.
    #[error("coalescer is no longer accepting requests")]
    Shutdown,

    /// The request was accepted but its batch ended without delivering an outcome.
    #[error("batch outcome was lost before delivery")]
    Lost,
}

impl<E> CoalesceError<E> {
    pub fn is_merge_rejection(&self) -> bool {
        matches!(self, Self::Merge(_))
    }

    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::Execute(_))
    }

    /// The caller-supplied error, if this failure carries one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Merge(e) | Self::Execute(e) => Some(e),
            Self::Shutdown | Self::Lost => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let merge: CoalesceError<String> = CoalesceError::Merge("negative".into());
        let execute: CoalesceError<String> = CoalesceError::Execute("too large".into());

        assert!(merge.is_merge_rejection());
        assert!(!merge.is_execution_failure());
        assert!(execute.is_execution_failure());
        assert!(!CoalesceError::<String>::Lost.is_merge_rejection());
    }

    #[test]
    fn test_into_inner() {
        assert_eq!(
            CoalesceError::Execute("boom".to_string()).into_inner(),
            Some("boom".to_string())
        );
        assert_eq!(CoalesceError::<String>::Shutdown.into_inner(), None);
    }

    #[test]
    fn test_display_includes_cause() {
        let err: CoalesceError<String> = CoalesceError::Merge("size conflict".into());
        assert_eq!(err.to_string(), "request rejected by pending batch: size conflict");
    }
}
