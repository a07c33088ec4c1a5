use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use haven_square::{ExtendedDataSquare, ShareWithProof};
use haven_types::{Coordinate, ExtendedHeader, Namespace, Share};

use crate::{Getter, GetterError, NoopRetrievalObserver, Result, RetrievalObserver};

/// Ordered fallback chain over retrieval strategies. The first success
/// short-circuits the rest; every resolution reports the number of
/// strategies attempted to the observer.
pub struct CascadeGetter {
    strategies: Vec<Arc<dyn Getter>>,
    observer: Arc<dyn RetrievalObserver>,
}

impl CascadeGetter {
    pub fn new(strategies: Vec<Arc<dyn Getter>>) -> Self {
        Self {
            strategies,
            observer: Arc::new(NoopRetrievalObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetrievalObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Try strategies in order. `ProofInvalid` outranks `Timeout` outranks
    /// `NotFound` in the error the caller finally sees; `Cancelled` is
    /// surfaced immediately without trying further strategies.
    async fn resolve<T, F, Fut>(&self, height: u64, run: F) -> Result<T>
    where
        F: Fn(Arc<dyn Getter>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut worst: Option<GetterError> = None;
        let mut attempts = 0;

        for strategy in &self.strategies {
            attempts += 1;
            match run(Arc::clone(strategy)).await {
                Ok(value) => {
                    self.observer.on_retrieval(height, attempts, true);
                    return Ok(value);
                }
                Err(GetterError::Cancelled) => {
                    self.observer.on_retrieval(height, attempts, false);
                    return Err(GetterError::Cancelled);
                }
                Err(err) => {
                    debug!(height, strategy = strategy.name(), %err, "strategy failed");
                    worst = Some(match worst.take() {
                        Some(prev) if severity(&prev) >= severity(&err) => prev,
                        _ => err,
                    });
                }
            }
        }

        self.observer.on_retrieval(height, attempts, false);
        Err(worst.unwrap_or(GetterError::NotFound))
    }
}

fn severity(err: &GetterError) -> u8 {
    match err {
        GetterError::ProofInvalid => 3,
        GetterError::Timeout => 2,
        GetterError::Store(_) => 1,
        _ => 0,
    }
}

#[async_trait]
impl Getter for CascadeGetter {
    async fn get_share(
        &self,
        header: &ExtendedHeader,
        coord: Coordinate,
    ) -> Result<ShareWithProof> {
        self.resolve(header.height, |s| async move {
            s.get_share(header, coord).await
        })
        .await
    }

    async fn get_eds(&self, header: &ExtendedHeader) -> Result<ExtendedDataSquare> {
        self.resolve(header.height, |s| async move { s.get_eds(header).await })
            .await
    }

    async fn get_shares_by_namespace(
        &self,
        header: &ExtendedHeader,
        namespace: Namespace,
    ) -> Result<Vec<Share>> {
        self.resolve(header.height, |s| async move {
            s.get_shares_by_namespace(header, namespace).await
        })
        .await
    }

    fn name(&self) -> &'static str {
        "cascade"
    }
}
