// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request Coalescer
//!
//! Collapses concurrent requests for the same key into one execution.
//!
//! ```text
//! coalesce(k, a) ─┐                 ┌──────────── Coordinator ────────────┐
//! coalesce(k, b) ─┼─ submissions ──►│ HashMap<K, PendingBatch>            │
//! coalesce(j, c) ─┘                 │   first request: open + arm timer   │
//!                                   │   later request: merge or reject    │
//!        timer(k) ── expirations ──►│   expiry: remove + spawn execute    │
//!                                   └──────────────────┬──────────────────┘
//!                                                      ▼
//!                                     execute(k, merged) ─► every waiter
//! ```
//!
//! The pending map is owned by the coordinator task alone. Callers and
//! timers reach it only through channels, so it needs no lock. Executions
//! run on their own tasks; a slow backend never holds up new requests.

use crate::application::batch::{self, PendingBatch, Waiter};
use crate::domain::config::CoalescerConfig;
use crate::domain::error::CoalesceError;
use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type MergeFn<I, E> = Arc<dyn Fn(I, &I) -> Result<I, E> + Send + Sync>;
type ExecuteFn<K, I, O, E> = Arc<dyn Fn(K, I) -> BoxFuture<'static, Result<O, E>> + Send + Sync>;

struct Submission<K, I, O, E> {
    key: K,
    input: I,
    waiter: Waiter<O, E>,
}

struct Expiry<K> {
    key: K,
    batch: u64,
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to a running coalescer. Cheap to clone; every clone feeds the same
/// coordinator.
///
/// # Example
///
/// ```no_run
/// # use volume_coalescer_core::Coalescer;
/// # use std::time::Duration;
/// # async fn demo() {
/// let coalescer = Coalescer::new(
///     Duration::from_millis(50),
///     |input: u64, pending: &u64| Ok::<_, String>(input + pending),
///     |_key: String, total: u64| async move { Ok::<_, String>(total) },
/// );
/// let total = coalescer.coalesce("vol-1".to_string(), 5).await;
/// # }
/// ```
pub struct Coalescer<K, I, O, E> {
    name: Arc<str>,
    submissions: mpsc::UnboundedSender<Submission<K, I, O, E>>,
}

impl<K, I, O, E> Clone for Coalescer<K, I, O, E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            submissions: self.submissions.clone(),
        }
    }
}

impl<K, I, O, E> Debug for Coalescer<K, I, O, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("name", &self.name)
            .field("closed", &self.submissions.is_closed())
            .finish()
    }
}

impl<K, I, O, E> Coalescer<K, I, O, E>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    I: Send + 'static,
    O: Clone + Send + 'static,
    E: Clone + Display + Send + 'static,
{
    /// Start a coalescer that executes each key's batch `delay` after the
    /// first request for that key.
    ///
    /// `merge(new, pending)` folds a new request into the pending input for
    /// its key. An error rejects only that request. `execute(key, merged)`
    /// runs once per batch on its own task.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime; the coordinator task is
    /// spawned immediately.
    pub fn new<M, X, Fut>(delay: Duration, merge: M, execute: X) -> Self
    where
        M: Fn(I, &I) -> Result<I, E> + Send + Sync + 'static,
        X: Fn(K, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        Self::with_config(CoalescerConfig::new(delay), merge, execute)
    }

    /// Same as [`Coalescer::new`], taking the delay and name from `config`.
    pub fn with_config<M, X, Fut>(config: CoalescerConfig, merge: M, execute: X) -> Self
    where
        M: Fn(I, &I) -> Result<I, E> + Send + Sync + 'static,
        X: Fn(K, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let (submissions, inbox) = mpsc::unbounded_channel();
        let (expirations_tx, expirations) = mpsc::unbounded_channel();
        let name: Arc<str> = Arc::from(config.name.as_str());

        let coordinator = Coordinator {
            name: Arc::clone(&name),
            delay: config.delay,
            merge: Arc::new(merge),
            execute: Arc::new(move |key: K, input: I| -> BoxFuture<'static, Result<O, E>> {
                execute(key, input).boxed()
            }),
            pending: HashMap::new(),
            next_batch_id: 0,
            expirations: expirations_tx,
            metrics: CoalescerMetrics::new(&name),
        };
        tokio::spawn(coordinator.run(inbox, expirations));

        Self { name, submissions }
    }

    /// Submit `input` for `key` and wait for its outcome.
    ///
    /// Resolves with the shared execution result of the batch this request
    /// was merged into, or with this request's own merge rejection. There is
    /// no built-in timeout; dropping the future abandons the wait without
    /// withdrawing the already-merged input.
    pub async fn coalesce(&self, key: K, input: I) -> Result<O, CoalesceError<E>> {
        let (reply, outcome) = oneshot::channel();
        self.submissions
            .send(Submission {
                key,
                input,
                waiter: Waiter::new(reply),
            })
            .map_err(|_| CoalesceError::Shutdown)?;

        outcome.await.unwrap_or(Err(CoalesceError::Lost))
    }
}

impl<K, I, O, E> Coalescer<K, I, O, E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if the coordinator can no longer accept requests. While any
    /// handle is alive this only happens after the runtime shut down or the
    /// coordinator task panicked.
    pub fn is_closed(&self) -> bool {
        self.submissions.is_closed()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

struct Coordinator<K, I, O, E> {
    name: Arc<str>,
    delay: Duration,
    merge: MergeFn<I, E>,
    execute: ExecuteFn<K, I, O, E>,
    pending: HashMap<K, PendingBatch<I, O, E>>,
    next_batch_id: u64,
    expirations: mpsc::UnboundedSender<Expiry<K>>,
    metrics: CoalescerMetrics,
}

impl<K, I, O, E> Coordinator<K, I, O, E>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    I: Send + 'static,
    O: Clone + Send + 'static,
    E: Clone + Display + Send + 'static,
{
    /// Runs until every handle is dropped and no batch is left pending.
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Submission<K, I, O, E>>,
        mut expirations: mpsc::UnboundedReceiver<Expiry<K>>,
    ) {
        info!(
            coalescer = %self.name,
            delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
            "Coalescer coordinator started"
        );

        let mut accepting = true;
        loop {
            tokio::select! {
                submission = inbox.recv(), if accepting => match submission {
                    Some(submission) => self.accept(submission),
                    None => {
                        debug!(
                            coalescer = %self.name,
                            pending = self.pending.len(),
                            "All coalescer handles dropped, draining pending batches"
                        );
                        accepting = false;
                    }
                },
                Some(expiry) = expirations.recv() => self.dispatch(expiry),
            }

            if !accepting && self.pending.is_empty() {
                break;
            }
        }

        info!(coalescer = %self.name, "Coalescer coordinator stopped");
    }

    fn accept(&mut self, submission: Submission<K, I, O, E>) {
        let Submission { key, input, waiter } = submission;
        self.metrics.requests.increment(1);

        if let Some(batch) = self.pending.get_mut(&key) {
            match batch.join(input, waiter, &*self.merge) {
                Ok(()) => debug!(
                    coalescer = %self.name,
                    key = ?key,
                    batch = batch.id,
                    waiters = batch.waiter_count(),
                    "Request merged into pending batch"
                ),
                Err((waiter, e)) => {
                    warn!(
                        coalescer = %self.name,
                        key = ?key,
                        batch = batch.id,
                        error = %e,
                        "Request rejected by pending batch"
                    );
                    self.metrics.merge_rejections.increment(1);
                    if !waiter.deliver(Err(CoalesceError::Merge(e))) {
                        self.metrics.abandoned_waiters.increment(1);
                    }
                }
            }
            return;
        }

        self.next_batch_id += 1;
        let id = self.next_batch_id;
        debug!(coalescer = %self.name, key = ?key, batch = id, "Opened batch");

        self.arm_timer(key.clone(), id);
        self.pending.insert(key, PendingBatch::open(id, input, waiter));
        self.metrics.pending_batches.set(self.pending.len() as f64);
    }

    /// The timer never touches the map; it posts an expiry back to the
    /// coordinator like any other event.
    fn arm_timer(&self, key: K, batch: u64) {
        let expirations = self.expirations.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = expirations.send(Expiry { key, batch });
        });
    }

    fn dispatch(&mut self, expiry: Expiry<K>) {
        let Expiry { key, batch: batch_id } = expiry;

        if self.pending.get(&key).map(|batch| batch.id) != Some(batch_id) {
            warn!(
                coalescer = %self.name,
                key = ?key,
                batch = batch_id,
                "Timer fired for a batch that is no longer pending"
            );
            return;
        }
        let Some(batch) = self.pending.remove(&key) else {
            return;
        };
        self.metrics.pending_batches.set(self.pending.len() as f64);

        let (merged, waiters) = batch.into_parts();
        let waiter_count = waiters.len();
        self.metrics.batch_size.record(waiter_count as f64);
        debug!(
            coalescer = %self.name,
            key = ?key,
            batch = batch_id,
            waiters = waiter_count,
            "Dispatching batch"
        );

        let execute = Arc::clone(&self.execute);
        let name = Arc::clone(&self.name);
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let outcome = execute(key.clone(), merged).await;
            metrics.batches_executed.increment(1);

            match &outcome {
                Ok(_) => debug!(
                    coalescer = %name,
                    key = ?key,
                    batch = batch_id,
                    waiters = waiter_count,
                    "Coalesced operation succeeded"
                ),
                Err(e) => {
                    metrics.execution_failures.increment(1);
                    warn!(
                        coalescer = %name,
                        key = ?key,
                        batch = batch_id,
                        waiters = waiter_count,
                        error = %e,
                        "Coalesced operation failed"
                    );
                }
            }

            let abandoned = batch::resolve(waiters, outcome);
            if abandoned > 0 {
                metrics.abandoned_waiters.increment(u64::try_from(abandoned).unwrap_or(u64::MAX));
                debug!(
                    coalescer = %name,
                    key = ?key,
                    batch = batch_id,
                    abandoned,
                    "Some callers stopped waiting before the outcome was ready"
                );
            }
        });
    }
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Clone)]
struct CoalescerMetrics {
    requests: Counter,
    merge_rejections: Counter,
    batches_executed: Counter,
    execution_failures: Counter,
    abandoned_waiters: Counter,
    batch_size: Histogram,
    pending_batches: Gauge,
}

impl CoalescerMetrics {
    fn new(name: &str) -> Self {
        let label = name.to_string();
        Self {
            requests: counter!("coalescer_requests_total", "coalescer" => label.clone()),
            merge_rejections: counter!("coalescer_merge_rejections_total", "coalescer" => label.clone()),
            batches_executed: counter!("coalescer_batches_executed_total", "coalescer" => label.clone()),
            execution_failures: counter!("coalescer_execution_failures_total", "coalescer" => label.clone()),
            abandoned_waiters: counter!("coalescer_abandoned_waiters_total", "coalescer" => label.clone()),
            batch_size: histogram!("coalescer_batch_size", "coalescer" => label.clone()),
            pending_batches: gauge!("coalescer_pending_batches", "coalescer" => label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Instant};

    const KEY: &str = "vol-0123456789";

    fn sum_merge(input: i64, pending: &i64) -> Result<i64, String> {
        if input < 0 {
            Err(format!("cannot merge negative input {input}"))
        } else {
            Ok(input + pending)
        }
    }

    /// Sums inputs and fails once the merged value reaches `fail_at`.
    fn summing_coalescer(
        delay: Duration,
        executions: Arc<AtomicUsize>,
        fail_at: i64,
    ) -> Coalescer<String, i64, i64, String> {
        Coalescer::new(delay, sum_merge, move |_key: String, merged: i64| {
            let executions = Arc::clone(&executions);
            async move {
                executions.fetch_add(1, Ordering::SeqCst);
                if merged >= fail_at {
                    Err(format!("merged value {merged} is too large"))
                } else {
                    Ok(merged)
                }
            }
        })
    }

    async fn coalesce_all(
        coalescer: &Coalescer<String, i64, i64, String>,
        inputs: &[i64],
    ) -> Vec<Result<i64, CoalesceError<String>>> {
        let handles: Vec<_> = inputs
            .iter()
            .map(|&input| {
                let coalescer = coalescer.clone();
                tokio::spawn(async move { coalescer.coalesce(KEY.to_string(), input).await })
            })
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("caller task panicked"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_request() {
        let coalescer = Coalescer::new(
            Duration::from_millis(50),
            sum_merge,
            |_key: String, _merged: i64| async { Ok::<_, String>("success".to_string()) },
        );

        let start = Instant::now();
        let result = coalescer.coalesce(KEY.to_string(), 42).await;

        assert_eq!(result, Ok("success".to_string()));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_execution() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), i64::MAX);

        let inputs: Vec<i64> = (1..=10).collect();
        let results = coalesce_all(&coalescer, &inputs).await;

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| *r == Ok(55)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_rejection_is_isolated() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), i64::MAX);

        let inputs: Vec<i64> = (1..=10).map(|n| if n % 2 == 0 { -n } else { n }).collect();
        let results = coalesce_all(&coalescer, &inputs).await;

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        for (input, result) in inputs.iter().zip(&results) {
            if *input < 0 {
                assert_eq!(
                    *result,
                    Err(CoalesceError::Merge(format!("cannot merge negative input {input}")))
                );
            } else {
                assert_eq!(*result, Ok(1 + 3 + 5 + 7 + 9));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_failure_is_shared() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), 100);

        let mut inputs: Vec<i64> = (1..=10).collect();
        inputs.push(100);
        let results = coalesce_all(&coalescer, &inputs).await;

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        let expected = Err(CoalesceError::Execute("merged value 155 is too large".to_string()));
        assert_eq!(results.len(), 11);
        assert!(results.iter().all(|r| *r == expected));

        // Failures are not fatal to the coordinator.
        assert_eq!(coalescer.coalesce(KEY.to_string(), 7).await, Ok(7));
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let coalescer: Coalescer<String, i64, i64, String> = Coalescer::new(
            Duration::from_millis(50),
            sum_merge,
            |key: String, merged: i64| async move {
                if key == "slow" {
                    sleep(Duration::from_secs(1)).await;
                }
                Ok(merged)
            },
        );

        let start = Instant::now();
        let slow = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move { coalescer.coalesce("slow".to_string(), 1).await })
        };
        let fast = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                let result = coalescer.coalesce("fast".to_string(), 2).await;
                (result, start.elapsed())
            })
        };

        let (fast_result, fast_elapsed) = fast.await.unwrap();
        assert_eq!(fast_result, Ok(2));
        assert!(fast_elapsed < Duration::from_millis(100));
        assert!(!slow.is_finished());

        assert_eq!(slow.await.unwrap(), Ok(1));
        assert!(start.elapsed() >= Duration::from_millis(1050));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_is_anchored_to_first_request() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), i64::MAX);
        let start = Instant::now();

        let first = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                let result = coalescer.coalesce(KEY.to_string(), 1).await;
                (result, start.elapsed())
            })
        };
        let late_joiner = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(30)).await;
                let result = coalescer.coalesce(KEY.to_string(), 2).await;
                (result, start.elapsed())
            })
        };

        let (first_result, first_elapsed) = first.await.unwrap();
        let (late_result, late_elapsed) = late_joiner.await.unwrap();

        assert_eq!(first_result, Ok(3));
        assert_eq!(late_result, Ok(3));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        for elapsed in [first_elapsed, late_elapsed] {
            assert!(elapsed >= Duration::from_millis(50), "{elapsed:?}");
            assert!(elapsed < Duration::from_millis(60), "{elapsed:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_during_execution_starts_new_batch() {
        let executions = Arc::new(AtomicUsize::new(0));
        let counter = executions.clone();
        let coalescer: Coalescer<String, i64, i64, String> =
            Coalescer::new(Duration::from_millis(50), sum_merge, move |_key: String, merged: i64| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(100)).await;
                    Ok(merged)
                }
            });

        let first = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move { coalescer.coalesce(KEY.to_string(), 1).await })
        };

        // The first batch fires at 50ms and its execution runs until 150ms.
        sleep(Duration::from_millis(60)).await;
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        let second = coalescer.coalesce(KEY.to_string(), 2).await;

        assert_eq!(first.await.unwrap(), Ok(1));
        assert_eq!(second, Ok(2));
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesce_blocks_until_outcome() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), i64::MAX);

        let call = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move { coalescer.coalesce(KEY.to_string(), 9).await })
        };

        sleep(Duration::from_millis(40)).await;
        assert!(!call.is_finished());
        assert_eq!(executions.load(Ordering::SeqCst), 0);

        assert_eq!(call.await.unwrap(), Ok(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_does_not_stall_batch() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), i64::MAX);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            coalescer.coalesce(KEY.to_string(), 5),
        )
        .await;
        assert!(abandoned.is_err());

        // The abandoned input was already merged; only its listener is gone.
        assert_eq!(coalescer.coalesce(KEY.to_string(), 6).await, Ok(11));
        assert_eq!(executions.load(Ordering::SeqCst), 1);

        assert_eq!(coalescer.coalesce(KEY.to_string(), 1).await, Ok(1));
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_rejected_request_does_not_break_coordinator() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), i64::MAX);

        let pending = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move { coalescer.coalesce(KEY.to_string(), 4).await })
        };
        sleep(Duration::from_millis(1)).await;

        // Submitted, then abandoned before the coordinator gets to reject it.
        let gave_up = tokio::time::timeout(Duration::ZERO, coalescer.coalesce(KEY.to_string(), -1)).await;
        assert!(gave_up.is_err());

        let rejected = coalescer.coalesce(KEY.to_string(), -2).await;
        assert_eq!(rejected, Err(CoalesceError::Merge("cannot merge negative input -2".to_string())));

        assert_eq!(pending.await.unwrap(), Ok(4));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_execution_reports_lost_outcome() {
        let coalescer: Coalescer<String, i64, i64, String> =
            Coalescer::new(Duration::from_millis(50), sum_merge, |_key: String, merged: i64| async move {
                if merged == 13 {
                    panic!("backend exploded");
                }
                Ok(merged)
            });

        let results = coalesce_all(&coalescer, &[6, 7]).await;
        assert!(results.iter().all(|r| *r == Err(CoalesceError::Lost)));

        assert_eq!(coalescer.coalesce(KEY.to_string(), 3).await, Ok(3));
    }

    #[tokio::test]
    async fn test_with_config_name() {
        let config = CoalescerConfig::new(Duration::from_millis(1)).with_name("modify-volume");
        let coalescer = Coalescer::with_config(config, sum_merge, |_key: String, merged: i64| async move {
            Ok::<_, String>(merged)
        });

        assert_eq!(coalescer.name(), "modify-volume");
        assert!(!coalescer.is_closed());
        assert_eq!(coalescer.coalesce(KEY.to_string(), 2).await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_batch_executes_after_handles_dropped() {
        let executions = Arc::new(AtomicUsize::new(0));
        let coalescer = summing_coalescer(Duration::from_millis(50), executions.clone(), i64::MAX);
        let other = coalescer.clone();

        let gave_up = tokio::time::timeout(Duration::from_millis(10), coalescer.coalesce(KEY.to_string(), 5)).await;
        assert!(gave_up.is_err());

        drop(coalescer);
        drop(other);
        sleep(Duration::from_millis(100)).await;

        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runtime_shutdown_closes_coalescer() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let coalescer: Coalescer<String, i64, i64, String> = runtime.block_on(async {
            Coalescer::new(Duration::from_millis(50), sum_merge, |_key: String, merged: i64| async move {
                Ok(merged)
            })
        });
        drop(runtime);

        assert!(coalescer.is_closed());
        let result = futures::executor::block_on(coalescer.coalesce(KEY.to_string(), 1));
        assert_eq!(result, Err(CoalesceError::Shutdown));
    }
}
