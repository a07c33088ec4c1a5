use thiserror::Error;

pub mod memory;
pub mod rocksdb;
pub mod traits;

pub use memory::MemoryDatabase;
pub use rocksdb::RocksDatabase;
pub use traits::{Database, TypedDatabase, WriteBatch};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Key-value pair type alias
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Key prefixes separating the record families sharing one database.
#[derive(Debug, Clone, Copy)]
pub enum KeyPrefix {
    /// Commitment roots whose availability has been verified.
    VerifiedRoot = 0x00,
    /// Inverted index: share content hash -> shard key.
    ShareIndex = 0x01,
    /// Sampling coordinator checkpoint.
    Checkpoint = 0x02,
}

impl KeyPrefix {
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    pub fn make_key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(self.as_byte());
        key.extend_from_slice(suffix);
        key
    }
}

/// Helper functions for encoding common key types
pub mod keys {
    use super::*;
    use haven_types::DataHash;

    pub fn verified_root_key(root: &DataHash) -> Vec<u8> {
        KeyPrefix::VerifiedRoot.make_key(root.as_bytes())
    }

    pub fn share_index_key(content_hash: &DataHash) -> Vec<u8> {
        KeyPrefix::ShareIndex.make_key(content_hash.as_bytes())
    }

    pub fn share_index_prefix() -> Vec<u8> {
        vec![KeyPrefix::ShareIndex.as_byte()]
    }

    pub fn checkpoint_key() -> Vec<u8> {
        KeyPrefix::Checkpoint.make_key(b"das")
    }
}
