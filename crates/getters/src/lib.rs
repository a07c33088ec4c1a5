use async_trait::async_trait;
use thiserror::Error;

pub mod cascade;
pub mod p2p;
pub mod store;

pub use cascade::CascadeGetter;
pub use p2p::P2pGetter;
pub use store::StoreGetter;

use haven_square::{ExtendedDataSquare, ShareWithProof};
use haven_types::{Coordinate, ExtendedHeader, Namespace, Share};

/// Retrieval failure kinds. `NotFound` and `Timeout` are transient;
/// `ProofInvalid` signals an integrity violation by whichever source
/// produced the data.
#[derive(Debug, Error)]
pub enum GetterError {
    #[error("Share not found by any source")]
    NotFound,

    #[error("Fetched share failed commitment verification")]
    ProofInvalid,

    #[error("Retrieval timed out")]
    Timeout,

    #[error("No eligible peers for the request")]
    PoolExhausted,

    #[error("Retrieval cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(haven_eds::EdsError),
}

pub type Result<T> = std::result::Result<T, GetterError>;

impl From<haven_eds::EdsError> for GetterError {
    fn from(err: haven_eds::EdsError) -> Self {
        match err {
            haven_eds::EdsError::NotFound => Self::NotFound,
            haven_eds::EdsError::IntegrityMismatch { .. } => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

/// Retrieval capability over one source of block data. Implementations are
/// strategies in the cascade: the local store, a direct request protocol,
/// a content-exchange fallback.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Fetch one share with its row-inclusion proof.
    async fn get_share(
        &self,
        header: &ExtendedHeader,
        coord: Coordinate,
    ) -> Result<ShareWithProof>;

    /// Fetch the whole extended square.
    async fn get_eds(&self, header: &ExtendedHeader) -> Result<ExtendedDataSquare>;

    /// Fetch all original-data shares in a namespace.
    async fn get_shares_by_namespace(
        &self,
        header: &ExtendedHeader,
        namespace: Namespace,
    ) -> Result<Vec<Share>>;

    /// Strategy name for logs and observer reports.
    fn name(&self) -> &'static str;
}

/// What a transport collaborator returns before any verification happens.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Peer does not have the data")]
    NotFound,

    #[error("Request timed out")]
    Timeout,

    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Raw request/response transport against one specific peer. Supplied by
/// the networking layer; responses are unverified bytes that the caller
/// must proof-check.
#[async_trait]
pub trait ShareClient: Send + Sync {
    async fn request_share(
        &self,
        peer: haven_p2p::PeerId,
        header: &ExtendedHeader,
        coord: Coordinate,
    ) -> std::result::Result<ShareWithProof, ClientError>;

    async fn request_eds(
        &self,
        peer: haven_p2p::PeerId,
        header: &ExtendedHeader,
    ) -> std::result::Result<ExtendedDataSquare, ClientError>;

    async fn request_namespace(
        &self,
        peer: haven_p2p::PeerId,
        header: &ExtendedHeader,
        namespace: Namespace,
    ) -> std::result::Result<Vec<Share>, ClientError>;
}

/// Sink for per-retrieval observability. All methods default to no-ops.
pub trait RetrievalObserver: Send + Sync {
    /// Called once per cascade resolution with the number of strategies
    /// attempted and whether any succeeded.
    fn on_retrieval(&self, _height: u64, _attempts: usize, _success: bool) {}
}

/// Default observer doing nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRetrievalObserver;

impl RetrievalObserver for NoopRetrievalObserver {}
