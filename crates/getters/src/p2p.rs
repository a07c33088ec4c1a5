use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use haven_p2p::{PeerId, PeerPool};
use haven_square::{ExtendedDataSquare, ShareWithProof};
use haven_types::{Coordinate, ExtendedHeader, Namespace, Share};

use crate::{ClientError, Getter, GetterError, Result, ShareClient};

/// How many peers one request may try before giving up.
const PEERS_PER_REQUEST: usize = 3;

/// Direct request/response strategy. Picks peers from the pool in trust
/// order, applies a per-peer deadline and verifies every response against
/// the header's commitment before reporting success. Timeouts cool peers
/// down; invalid proofs blacklist them.
pub struct P2pGetter {
    pool: Arc<PeerPool>,
    client: Arc<dyn ShareClient>,
    request_timeout: Duration,
    cooldown: Duration,
}

impl P2pGetter {
    pub fn new(
        pool: Arc<PeerPool>,
        client: Arc<dyn ShareClient>,
        request_timeout: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            pool,
            client,
            request_timeout,
            cooldown,
        }
    }

    fn peers(&self) -> Result<Vec<PeerId>> {
        self.pool
            .select(PEERS_PER_REQUEST)
            .map_err(|_| GetterError::PoolExhausted)
    }

    /// Run one peer-scoped request under the deadline and translate its
    /// outcome into pool feedback. `verify` decides whether the response
    /// honors the commitment.
    async fn try_peer<T, F, Fut, V>(
        &self,
        peer: PeerId,
        request: F,
        verify: V,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, ClientError>>,
        V: FnOnce(&T) -> bool,
    {
        let outcome = timeout(self.request_timeout, request()).await;
        match outcome {
            Err(_) => {
                debug!(peer = %peer, "peer request timed out");
                let _ = self.pool.report_failure(&peer, self.cooldown);
                Err(GetterError::Timeout)
            }
            Ok(Err(ClientError::NotFound)) => {
                let _ = self.pool.report_failure(&peer, self.cooldown);
                Err(GetterError::NotFound)
            }
            Ok(Err(ClientError::Timeout)) | Ok(Err(ClientError::Transport(_))) => {
                let _ = self.pool.report_failure(&peer, self.cooldown);
                Err(GetterError::Timeout)
            }
            Ok(Ok(response)) => {
                if !verify(&response) {
                    warn!(peer = %peer, "peer served data failing proof verification");
                    let _ = self.pool.blacklist(&peer);
                    return Err(GetterError::ProofInvalid);
                }
                let _ = self.pool.report_success(&peer);
                Ok(response)
            }
        }
    }

    /// Walk the selected peers until one yields a verified response.
    /// A proof violation ends the walk immediately; transient failures move
    /// on to the next peer.
    async fn over_peers<T, F, Fut, V>(&self, request: F, verify: V) -> Result<T>
    where
        F: Fn(PeerId) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, ClientError>>,
        V: Fn(&T) -> bool,
    {
        let mut last = GetterError::NotFound;
        for peer in self.peers()? {
            match self.try_peer(peer, || request(peer), &verify).await {
                Ok(response) => return Ok(response),
                Err(err @ GetterError::ProofInvalid) => return Err(err),
                Err(err) => last = err,
            }
        }
        Err(last)
    }
}

#[async_trait]
impl Getter for P2pGetter {
    async fn get_share(
        &self,
        header: &ExtendedHeader,
        coord: Coordinate,
    ) -> Result<ShareWithProof> {
        self.over_peers(
            |peer| self.client.request_share(peer, header, coord),
            |swp: &ShareWithProof| swp.coord == coord && swp.verify(&header.dah),
        )
        .await
    }

    async fn get_eds(&self, header: &ExtendedHeader) -> Result<ExtendedDataSquare> {
        let expected = header.data_hash();
        self.over_peers(
            |peer| self.client.request_eds(peer, header),
            |eds: &ExtendedDataSquare| eds.data_hash() == expected,
        )
        .await
    }

    async fn get_shares_by_namespace(
        &self,
        header: &ExtendedHeader,
        namespace: Namespace,
    ) -> Result<Vec<Share>> {
        // Namespace responses carry no inclusion proofs over this transport;
        // membership in the claimed namespace is the only local check.
        self.over_peers(
            |peer| self.client.request_namespace(peer, header, namespace),
            |shares: &Vec<Share>| shares.iter().all(|s| s.namespace() == namespace),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "p2p"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_p2p::PeerStatus;
    use haven_square::random_eds;
    use parking_lot::Mutex;

    /// Scripted transport: serves shares from a fixed square, optionally
    /// lying about one coordinate.
    struct FakeClient {
        eds: ExtendedDataSquare,
        corrupt: Option<Coordinate>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ShareClient for FakeClient {
        async fn request_share(
            &self,
            _peer: PeerId,
            _header: &ExtendedHeader,
            coord: Coordinate,
        ) -> std::result::Result<ShareWithProof, ClientError> {
            *self.calls.lock() += 1;
            let mut swp = self
                .eds
                .share_with_proof(coord)
                .map_err(|_| ClientError::NotFound)?;
            if self.corrupt == Some(coord) {
                let mut rng = rand::thread_rng();
                let ns = Namespace::random(&mut rng);
                swp.share = Share::random(&mut rng, ns);
            }
            Ok(swp)
        }

        async fn request_eds(
            &self,
            _peer: PeerId,
            _header: &ExtendedHeader,
        ) -> std::result::Result<ExtendedDataSquare, ClientError> {
            *self.calls.lock() += 1;
            Ok(self.eds.clone())
        }

        async fn request_namespace(
            &self,
            _peer: PeerId,
            _header: &ExtendedHeader,
            namespace: Namespace,
        ) -> std::result::Result<Vec<Share>, ClientError> {
            *self.calls.lock() += 1;
            Ok(self
                .eds
                .original_shares()
                .into_iter()
                .filter(|s| s.namespace() == namespace)
                .collect())
        }
    }

    fn setup(corrupt: Option<Coordinate>) -> (P2pGetter, Arc<PeerPool>, ExtendedHeader, PeerId) {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let header = ExtendedHeader::new(5, eds.da_header());

        let pool = Arc::new(PeerPool::new("shrex"));
        let peer = PeerId::random(&mut rng);
        pool.add(peer);

        let client = Arc::new(FakeClient {
            eds,
            corrupt,
            calls: Mutex::new(0),
        });
        let getter = P2pGetter::new(
            Arc::clone(&pool),
            client,
            Duration::from_secs(1),
            Duration::from_secs(30),
        );
        (getter, pool, header, peer)
    }

    #[tokio::test]
    async fn test_verified_share_promotes_peer() {
        let (getter, pool, header, peer) = setup(None);
        let swp = getter
            .get_share(&header, Coordinate::new(0, 1))
            .await
            .unwrap();
        assert!(swp.verify(&header.dah));
        assert_eq!(pool.status(&peer), Some(PeerStatus::Validated));
    }

    #[tokio::test]
    async fn test_bad_proof_blacklists_peer() {
        let coord = Coordinate::new(2, 2);
        let (getter, pool, header, peer) = setup(Some(coord));

        let err = getter.get_share(&header, coord).await.unwrap_err();
        assert!(matches!(err, GetterError::ProofInvalid));
        assert_eq!(pool.status(&peer), Some(PeerStatus::Blacklisted));
    }

    struct TimeoutClient;

    #[async_trait]
    impl ShareClient for TimeoutClient {
        async fn request_share(
            &self,
            _peer: PeerId,
            _header: &ExtendedHeader,
            _coord: Coordinate,
        ) -> std::result::Result<ShareWithProof, ClientError> {
            Err(ClientError::Timeout)
        }

        async fn request_eds(
            &self,
            _peer: PeerId,
            _header: &ExtendedHeader,
        ) -> std::result::Result<ExtendedDataSquare, ClientError> {
            Err(ClientError::Timeout)
        }

        async fn request_namespace(
            &self,
            _peer: PeerId,
            _header: &ExtendedHeader,
            _namespace: Namespace,
        ) -> std::result::Result<Vec<Share>, ClientError> {
            Err(ClientError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_timeout_cools_down_without_blacklisting() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let header = ExtendedHeader::new(5, eds.da_header());

        let pool = Arc::new(PeerPool::new("shrex"));
        let peer = PeerId::random(&mut rng);
        pool.add(peer);
        pool.report_success(&peer).unwrap();

        let getter = P2pGetter::new(
            Arc::clone(&pool),
            Arc::new(TimeoutClient),
            Duration::from_secs(1),
            Duration::from_secs(30),
        );

        let err = getter
            .get_share(&header, Coordinate::new(0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, GetterError::Timeout));
        assert!(matches!(
            pool.status(&peer),
            Some(PeerStatus::Cooldown { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_pool_exhausted() {
        let (getter, _pool, header, _peer) = setup(None);
        let getter = P2pGetter {
            pool: Arc::new(PeerPool::new("shrex")),
            ..getter
        };
        let err = getter
            .get_share(&header, Coordinate::new(0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, GetterError::PoolExhausted));
    }

    #[tokio::test]
    async fn test_eds_root_checked() {
        let (getter, pool, header, peer) = setup(None);
        // Ask for a different header: the served square no longer matches.
        let mut rng = rand::thread_rng();
        let other = ExtendedHeader::new(6, random_eds(&mut rng, 2).da_header());

        let err = getter.get_eds(&other).await.unwrap_err();
        assert!(matches!(err, GetterError::ProofInvalid));
        assert_eq!(pool.status(&peer), Some(PeerStatus::Blacklisted));
        let _ = header;
    }
}
