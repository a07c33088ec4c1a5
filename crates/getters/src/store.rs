use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use haven_eds::EdsStore;
use haven_square::{ExtendedDataSquare, ShareWithProof};
use haven_types::{Coordinate, ExtendedHeader, Namespace, Share};

use crate::{Getter, GetterError, Result};

/// First rung of the cascade: serve requests from locally stored shards.
/// A shard whose content no longer matches the header's commitment is
/// removed so the next request falls through to the network.
pub struct StoreGetter {
    store: Arc<EdsStore>,
}

impl StoreGetter {
    pub fn new(store: Arc<EdsStore>) -> Self {
        Self { store }
    }

    fn load_verified(&self, header: &ExtendedHeader) -> Result<ExtendedDataSquare> {
        let root = header.data_hash();
        // `get` re-derives the root from the archive and drops the shard on
        // mismatch, so anything returned here already matches the header.
        Ok(self.store.get(&root)?)
    }
}

#[async_trait]
impl Getter for StoreGetter {
    async fn get_share(
        &self,
        header: &ExtendedHeader,
        coord: Coordinate,
    ) -> Result<ShareWithProof> {
        let eds = self.load_verified(header)?;
        let swp = eds
            .share_with_proof(coord)
            .map_err(|_| GetterError::NotFound)?;
        Ok(swp)
    }

    async fn get_eds(&self, header: &ExtendedHeader) -> Result<ExtendedDataSquare> {
        self.load_verified(header)
    }

    async fn get_shares_by_namespace(
        &self,
        header: &ExtendedHeader,
        namespace: Namespace,
    ) -> Result<Vec<Share>> {
        let root = header.data_hash();
        let accessor = self.store.open(&root)?;
        match accessor.shares_by_namespace(namespace) {
            Ok(shares) => Ok(shares),
            Err(err) => {
                // A read error on an open shard means the archive went bad
                // underneath us. Evict it and let the cascade re-fetch.
                warn!(root = %root, %err, "namespace read failed, removing shard");
                let _ = self.store.remove(&root);
                Err(GetterError::NotFound)
            }
        }
    }

    fn name(&self) -> &'static str {
        "store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_eds::Parameters;
    use haven_square::random_eds;
    use haven_storage::MemoryDatabase;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<EdsStore>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            EdsStore::new(
                dir.path().join("blocks"),
                Arc::new(MemoryDatabase::new()),
                Parameters::default(),
            )
            .unwrap(),
        );
        (dir, store)
    }

    #[tokio::test]
    async fn test_serves_stored_square() {
        let (_dir, store) = setup();
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        store.put(&eds).unwrap();

        let header = ExtendedHeader::new(7, eds.da_header());
        let getter = StoreGetter::new(store);

        assert_eq!(getter.get_eds(&header).await.unwrap(), eds);

        let swp = getter
            .get_share(&header, Coordinate::new(1, 2))
            .await
            .unwrap();
        assert!(swp.verify(&header.dah));
    }

    #[tokio::test]
    async fn test_missing_shard_is_not_found() {
        let (_dir, store) = setup();
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let header = ExtendedHeader::new(7, eds.da_header());

        let getter = StoreGetter::new(store);
        assert!(matches!(
            getter.get_eds(&header).await,
            Err(GetterError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_namespace_reads_original_data() {
        let (_dir, store) = setup();
        let mut rng = rand::thread_rng();
        let ns = Namespace::random(&mut rng);
        let original: Vec<Share> = (0..4).map(|_| Share::random(&mut rng, ns)).collect();
        let eds = ExtendedDataSquare::extend(&original).unwrap();
        store.put(&eds).unwrap();

        let header = ExtendedHeader::new(1, eds.da_header());
        let getter = StoreGetter::new(store);
        assert_eq!(
            getter.get_shares_by_namespace(&header, ns).await.unwrap(),
            original
        );
    }
}
