use thiserror::Error;

pub mod accessor;
pub mod index;
pub mod shard;
pub mod store;

pub use accessor::ShardAccessor;
pub use index::InvertedIndex;
pub use shard::reconstruct;
pub use store::EdsStore;

use haven_types::DataHash;

#[derive(Debug, Error)]
pub enum EdsError {
    #[error("Shard not found")]
    NotFound,

    #[error("Accessor already closed")]
    AccessorClosed,

    #[error("Content integrity mismatch: derived root {got} does not match expected {expected}")]
    IntegrityMismatch { expected: DataHash, got: DataHash },

    #[error("Invalid shard: {0}")]
    InvalidShard(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] haven_storage::StorageError),

    #[error("Square error: {0}")]
    Square(#[from] haven_square::SquareError),

    #[error("Type error: {0}")]
    Types(#[from] haven_types::TypesError),
}

pub type Result<T> = std::result::Result<T, EdsError>;

/// Block store tuning knobs. Eviction is size-based, not time-based.
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Capacity of the cache of recently opened shard accessors.
    pub accessor_cache_size: usize,
    /// Capacity of the cache of recently read shares.
    pub recent_shares_cache_size: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            accessor_cache_size: 128,
            recent_shares_cache_size: 512,
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        if self.accessor_cache_size == 0 {
            return Err(EdsError::InvalidParameters(
                "accessor cache size must be positive".into(),
            ));
        }
        if self.recent_shares_cache_size == 0 {
            return Err(EdsError::InvalidParameters(
                "recent shares cache size must be positive".into(),
            ));
        }
        Ok(())
    }
}
