use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use haven_types::ExtendedHeader;

use crate::availability::Availability;
use crate::checkpoint::CheckpointTracker;
use crate::observer::DasObserver;
use crate::{DasError, Parameters, Result};

/// Source of historical headers for the catch-up walk. Supplied by the
/// blockchain client.
#[async_trait]
pub trait HeaderFetcher: Send + Sync {
    async fn header_by_height(&self, height: u64) -> Result<ExtendedHeader>;
}

#[derive(Debug, Clone)]
struct Job {
    header: ExtendedHeader,
    attempts: u32,
}

struct RetryEntry {
    header: ExtendedHeader,
    attempts: u32,
    not_before: Instant,
}

/// Schedules sampling over new heads and the historical backlog. A bounded
/// worker pool drains a bounded job queue; failures re-enter a retry set
/// drained on a timer with exponential backoff; terminal verdicts feed the
/// checkpoint, which advances only over a gapless prefix.
pub struct SamplingCoordinator {
    availability: Arc<dyn Availability>,
    tracker: Arc<CheckpointTracker>,
    observer: Arc<dyn DasObserver>,
    params: Parameters,
    cancel: CancellationToken,
    queue_tx: Mutex<Option<mpsc::Sender<Job>>>,
    retries: Mutex<BTreeMap<u64, RetryEntry>>,
    /// Heights queued, in flight or awaiting retry.
    pending: Mutex<HashSet<u64>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SamplingCoordinator {
    pub fn new(
        availability: Arc<dyn Availability>,
        tracker: Arc<CheckpointTracker>,
        observer: Arc<dyn DasObserver>,
        params: Parameters,
    ) -> Result<Arc<Self>> {
        params.validate()?;
        Ok(Arc::new(Self {
            availability,
            tracker,
            observer,
            params,
            cancel: CancellationToken::new(),
            queue_tx: Mutex::new(None),
            retries: Mutex::new(BTreeMap::new()),
            pending: Mutex::new(HashSet::new()),
            workers: Mutex::new(Vec::new()),
            background: Mutex::new(Vec::new()),
        }))
    }

    /// Launch the worker pool and the retry and checkpoint timers.
    pub fn start(self: &Arc<Self>) {
        let (tx, rx) = mpsc::channel::<Job>(self.params.queue_size);
        *self.queue_tx.lock() = Some(tx);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut workers = self.workers.lock();
        for _ in 0..self.params.concurrency {
            let this = Arc::clone(self);
            let rx = Arc::clone(&rx);
            workers.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => this.process(job).await,
                        None => break,
                    }
                }
            }));
        }
        drop(workers);

        let mut background = self.background.lock();
        background.push(tokio::spawn(Arc::clone(self).retry_loop()));
        background.push(tokio::spawn(Arc::clone(self).checkpoint_loop()));
        info!(workers = self.params.concurrency, "sampling coordinator started");
    }

    /// Feed a newly observed head. Never blocks the caller: a full queue
    /// defers the header to the retry timer instead.
    pub fn on_new_head(&self, header: ExtendedHeader) -> Result<()> {
        let height = header.height;
        self.observer.on_new_head(height);

        if self.tracker.is_done(height) || !self.pending.lock().insert(height) {
            debug!(height, "head already sampled or pending, skipping");
            return Ok(());
        }
        let result = self.enqueue(Job {
            header,
            attempts: 0,
        });
        if result.is_err() {
            self.pending.lock().remove(&height);
        }
        result
    }

    /// Walk the historical backlog from the checkpoint up to `head`,
    /// enqueueing every height without a terminal verdict. Backpressure
    /// from the queue paces the walk.
    pub fn catch_up(self: &Arc<Self>, fetcher: Arc<dyn HeaderFetcher>, head: u64) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let from = this.tracker.sampled_before();
            debug!(from, to = head, "catch-up started");
            for height in from..=head {
                if this.cancel.is_cancelled() {
                    break;
                }
                if this.tracker.is_done(height) || !this.pending.lock().insert(height) {
                    continue;
                }
                let header = match fetcher.header_by_height(height).await {
                    Ok(header) => header,
                    Err(err) => {
                        warn!(height, %err, "catch-up header fetch failed");
                        this.pending.lock().remove(&height);
                        continue;
                    }
                };
                let tx = this.queue_tx.lock().clone();
                let Some(tx) = tx else { break };
                if tx
                    .send(Job {
                        header,
                        attempts: 0,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        self.background.lock().push(handle);
    }

    /// Stop intake, wait for in-flight jobs up to the deadline, cancel the
    /// rest and persist the checkpoint.
    pub async fn stop(&self, deadline: Duration) -> Result<()> {
        // Dropping the sender lets workers drain the queue and exit.
        self.queue_tx.lock().take();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let drained = timeout(deadline, futures::future::join_all(workers)).await;
        if drained.is_err() {
            warn!("stop deadline passed, cancelling in-flight sampling");
        }

        self.cancel.cancel();
        let background: Vec<JoinHandle<()>> = self.background.lock().drain(..).collect();
        let _ = futures::future::join_all(background).await;

        self.tracker.persist()?;
        self.observer.on_checkpoint(&self.tracker.checkpoint());
        info!(
            sampled_before = self.tracker.sampled_before(),
            "sampling coordinator stopped"
        );
        Ok(())
    }

    async fn process(&self, job: Job) {
        let height = job.header.height;
        let token = self.cancel.child_token();
        let started = Instant::now();

        let outcome = match timeout(
            self.params.sample_timeout,
            self.availability.shares_available(&token, &job.header),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(DasError::Timeout),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => {
                self.observer.on_sample(height, elapsed, true);
                self.tracker.record_success(height);
                self.pending.lock().remove(&height);
            }
            Err(DasError::Cancelled) => {
                // Not a verdict. The height stays below the checkpoint and
                // gets resampled after a restart.
                debug!(height, "sampling cancelled");
            }
            Err(err) => {
                self.observer.on_sample(height, elapsed, false);
                let attempts = job.attempts + 1;
                if !err.is_retryable() || attempts >= self.params.max_retries {
                    warn!(height, attempts, %err, "sampling failed permanently");
                    self.observer.on_persistent_failure(height, attempts);
                    self.tracker.record_permanent_failure(height, attempts);
                    self.pending.lock().remove(&height);
                } else {
                    debug!(height, attempts, %err, "sampling failed, scheduling retry");
                    self.schedule_retry(job.header, attempts);
                }
            }
        }
    }

    fn enqueue(&self, job: Job) -> Result<()> {
        let tx = self.queue_tx.lock().clone().ok_or(DasError::NotRunning)?;
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(height = job.header.height, "job queue full, deferring to retry timer");
                self.schedule_retry_at(job.header, job.attempts, Instant::now());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DasError::NotRunning),
        }
    }

    fn schedule_retry(&self, header: ExtendedHeader, attempts: u32) {
        let exponent = attempts.saturating_sub(1).min(20);
        let backoff = self
            .params
            .backoff_base
            .saturating_mul(1 << exponent)
            .min(self.params.backoff_max);
        self.schedule_retry_at(header, attempts, Instant::now() + backoff);
    }

    fn schedule_retry_at(&self, header: ExtendedHeader, attempts: u32, not_before: Instant) {
        self.retries.lock().insert(
            header.height,
            RetryEntry {
                header,
                attempts,
                not_before,
            },
        );
    }

    async fn retry_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.params.retry_interval) => {}
            }

            let now = Instant::now();
            let due: Vec<RetryEntry> = {
                let mut retries = self.retries.lock();
                let heights: Vec<u64> = retries
                    .iter()
                    .filter(|(_, e)| e.not_before <= now)
                    .map(|(h, _)| *h)
                    .collect();
                heights
                    .into_iter()
                    .filter_map(|h| retries.remove(&h))
                    .collect()
            };

            for entry in due {
                let job = Job {
                    header: entry.header,
                    attempts: entry.attempts,
                };
                if self.enqueue(job).is_err() {
                    break;
                }
            }
        }
    }

    async fn checkpoint_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.params.checkpoint_interval) => {}
            }
            if let Err(err) = self.tracker.persist() {
                warn!(%err, "periodic checkpoint persist failed");
                continue;
            }
            self.observer.on_checkpoint(&self.tracker.checkpoint());
        }
    }
}
