use std::time::Duration;

use crate::checkpoint::Checkpoint;

/// Sink for coordinator and sampler events. Every method defaults to a
/// no-op so implementations override only what they report.
pub trait DasObserver: Send + Sync {
    /// A new head entered the sampling queue.
    fn on_new_head(&self, _height: u64) {}

    /// One sampling job finished, successfully or not.
    fn on_sample(&self, _height: u64, _elapsed: Duration, _success: bool) {}

    /// The checkpoint was persisted.
    fn on_checkpoint(&self, _checkpoint: &Checkpoint) {}

    /// A height exhausted its retries and is reported as a terminal
    /// failure; sampling of other heights continues.
    fn on_persistent_failure(&self, _height: u64, _attempts: u32) {}
}

/// Default observer discarding everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDasObserver;

impl DasObserver for NoopDasObserver {}
