use std::time::Duration;

use thiserror::Error;

pub mod availability;
pub mod checkpoint;
pub mod coordinator;
pub mod observer;
pub mod select;

pub use availability::{Availability, LightAvailability};
pub use checkpoint::{Checkpoint, CheckpointTracker};
pub use coordinator::{HeaderFetcher, SamplingCoordinator};
pub use observer::{DasObserver, NoopDasObserver};
pub use select::{CoordinateSelector, UniformRandomSelector};

#[derive(Debug, Error)]
pub enum DasError {
    #[error("Sampled share not found by any source")]
    NotFound,

    #[error("Sampled share failed commitment verification")]
    ProofInvalid,

    #[error("Sampling timed out")]
    Timeout,

    #[error("No eligible peers")]
    PoolExhausted,

    #[error("Sampling cancelled")]
    Cancelled,

    #[error("Coordinator is not running")]
    NotRunning,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Storage error: {0}")]
    Storage(#[from] haven_storage::StorageError),

    #[error("Retrieval error: {0}")]
    Getter(haven_getters::GetterError),
}

pub type Result<T> = std::result::Result<T, DasError>;

impl From<haven_getters::GetterError> for DasError {
    fn from(err: haven_getters::GetterError) -> Self {
        use haven_getters::GetterError as G;
        match err {
            G::NotFound => Self::NotFound,
            G::ProofInvalid => Self::ProofInvalid,
            G::Timeout => Self::Timeout,
            G::PoolExhausted => Self::PoolExhausted,
            G::Cancelled => Self::Cancelled,
            other => Self::Getter(other),
        }
    }
}

impl DasError {
    /// Failures worth another attempt from a different source or later.
    /// Proof violations stay retryable for the height because another peer
    /// may still serve honest data.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::ProofInvalid | Self::Timeout | Self::PoolExhausted
        )
    }
}

/// Sampler and coordinator tuning. Defaults follow the light-client
/// profile: a fixed sample count independent of square size.
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Coordinates sampled per header.
    pub sample_amount: usize,
    /// Concurrent share fetches per sampling job.
    pub fan_out: usize,
    /// Concurrent sampling workers.
    pub concurrency: usize,
    /// Job queue capacity; intake past this is deferred to the retry timer.
    pub queue_size: usize,
    /// Deadline for one whole sampling job.
    pub sample_timeout: Duration,
    /// First retry backoff; doubles per attempt.
    pub backoff_base: Duration,
    /// Backoff ceiling.
    pub backoff_max: Duration,
    /// Attempts before a height is reported persistently failed.
    pub max_retries: u32,
    /// How often the retry set is drained.
    pub retry_interval: Duration,
    /// How often the checkpoint is persisted while running.
    pub checkpoint_interval: Duration,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            sample_amount: 16,
            fan_out: 16,
            concurrency: 16,
            queue_size: 256,
            sample_timeout: Duration::from_secs(60),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10 * 60),
            max_retries: 17,
            retry_interval: Duration::from_secs(5),
            checkpoint_interval: Duration::from_secs(10),
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        if self.sample_amount == 0 {
            return Err(DasError::InvalidParameters(
                "sample amount must be positive".into(),
            ));
        }
        if self.fan_out == 0 || self.concurrency == 0 {
            return Err(DasError::InvalidParameters(
                "fan-out and concurrency must be positive".into(),
            ));
        }
        if self.queue_size == 0 {
            return Err(DasError::InvalidParameters(
                "queue size must be positive".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(DasError::InvalidParameters(
                "max retries must be positive".into(),
            ));
        }
        Ok(())
    }
}
