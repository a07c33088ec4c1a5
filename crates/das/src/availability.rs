use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use haven_getters::Getter;
use haven_square::empty_root;
use haven_storage::{keys, Database};
use haven_types::ExtendedHeader;

use crate::select::{CoordinateSelector, UniformRandomSelector};
use crate::{DasError, Parameters, Result};

/// Availability verdict capability consumed by the coordinator.
#[async_trait]
pub trait Availability: Send + Sync {
    /// Decide whether the header's data is retrievable. `Ok(())` means
    /// available; the error distinguishes transient absence (`NotFound`,
    /// `Timeout`) from integrity violations (`ProofInvalid`).
    async fn shares_available(
        &self,
        token: &CancellationToken,
        header: &ExtendedHeader,
    ) -> Result<()>;
}

/// Light-client sampler: verifies availability probabilistically by
/// fetching a handful of random coordinates through the retrieval cascade
/// and proof-checking each one against the header's commitment.
pub struct LightAvailability {
    getter: Arc<dyn Getter>,
    db: Arc<dyn Database>,
    selector: Box<dyn CoordinateSelector>,
    sample_amount: usize,
    fan_out: usize,
}

impl LightAvailability {
    pub fn new(getter: Arc<dyn Getter>, db: Arc<dyn Database>, params: &Parameters) -> Self {
        Self {
            getter,
            db,
            selector: Box::new(UniformRandomSelector),
            sample_amount: params.sample_amount,
            fan_out: params.fan_out,
        }
    }

    /// Swap the coordinate-selection strategy.
    pub fn with_selector(mut self, selector: Box<dyn CoordinateSelector>) -> Self {
        self.selector = selector;
        self
    }

    async fn sample(&self, token: &CancellationToken, header: &ExtendedHeader) -> Result<()> {
        let width = header.dah.square_width();
        let coords = self.selector.select(width, self.sample_amount);
        debug!(height = header.height, width, samples = coords.len(), "sampling header");

        // Bounded fan-out: at most `fan_out` fetches in flight. The first
        // failure aborts the job; dropping the stream drops the unfinished
        // fetches with it.
        let mut fetches = FuturesUnordered::new();
        let mut pending = coords.into_iter();
        loop {
            while fetches.len() < self.fan_out {
                match pending.next() {
                    Some(coord) => fetches.push(async move {
                        let swp = self.getter.get_share(header, coord).await?;
                        if !swp.verify(&header.dah) {
                            return Err(DasError::ProofInvalid);
                        }
                        Ok::<_, DasError>(())
                    }),
                    None => break,
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(DasError::Cancelled),
                outcome = fetches.next() => match outcome {
                    Some(Ok(())) => {}
                    Some(Err(err)) => {
                        warn!(height = header.height, %err, "sample failed");
                        return Err(err);
                    }
                    None => return Ok(()),
                },
            }
        }
    }
}

#[async_trait]
impl Availability for LightAvailability {
    async fn shares_available(
        &self,
        token: &CancellationToken,
        header: &ExtendedHeader,
    ) -> Result<()> {
        let root = header.data_hash();

        // Headers committing to the empty square carry no data.
        if root == empty_root() {
            return Ok(());
        }

        // Roots verified earlier stay verified.
        let cache_key = keys::verified_root_key(&root);
        if self.db.contains(&cache_key)? {
            return Ok(());
        }

        self.sample(token, header).await?;

        self.db.put(&cache_key, &[])?;
        debug!(height = header.height, root = %root, "header verified available");
        Ok(())
    }
}
