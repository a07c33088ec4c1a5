use std::sync::Arc;

use serde::{Deserialize, Serialize};

use haven_square::ExtendedDataSquare;
use haven_storage::{keys, Database, StorageError, TypedDatabase, WriteBatch};
use haven_types::{Coordinate, DataHash};

use crate::shard::share_position;
use crate::Result;

/// Where a share lives: the shard holding it and its quadrant-major serial
/// position inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub shard: DataHash,
    pub pos: u32,
}

/// Mapping from share content hash to shard location, kept in the shared
/// database under its own key prefix. Duplicate shares across shards keep
/// whichever entry was written last; any entry resolves to valid bytes.
pub struct InvertedIndex {
    db: Arc<dyn Database>,
}

impl InvertedIndex {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Index every share of a square in one atomic batch.
    pub fn add_square(&self, eds: &ExtendedDataSquare) -> Result<()> {
        let root = eds.data_hash();
        let width = eds.width();
        let mut batch = WriteBatch::new();
        for row in 0..width {
            for col in 0..width {
                let coord = Coordinate::new(row, col);
                let share = eds.share(coord)?;
                let entry = IndexEntry {
                    shard: root,
                    pos: share_position(width, coord),
                };
                let value = bincode::serialize(&entry)
                    .map_err(|e| StorageError::SerializationError(e.to_string()))?;
                batch.put(&keys::share_index_key(&share.content_hash()), &value);
            }
        }
        self.db.write_batch(batch)?;
        Ok(())
    }

    pub fn get(&self, content_hash: &DataHash) -> Result<Option<IndexEntry>> {
        Ok(self.db.get_typed(&keys::share_index_key(content_hash))?)
    }

    /// Drop the entries a square contributed. Entries that a later square
    /// overwrote are left for that square.
    pub fn remove_square(&self, eds: &ExtendedDataSquare) -> Result<()> {
        let root = eds.data_hash();
        let width = eds.width();
        let mut batch = WriteBatch::new();
        for row in 0..width {
            for col in 0..width {
                let share = eds.share(Coordinate::new(row, col))?;
                let key = keys::share_index_key(&share.content_hash());
                if let Some(entry) = self.db.get_typed::<IndexEntry>(&key)? {
                    if entry.shard == root {
                        batch.delete(&key);
                    }
                }
            }
        }
        self.db.write_batch(batch)?;
        Ok(())
    }

    /// Prefix-scan fallback for when the square itself can no longer be
    /// read back, e.g. after detecting a corrupt archive.
    pub fn remove_by_root(&self, root: &DataHash) -> Result<()> {
        let mut batch = WriteBatch::new();
        for entry in self.db.iter_prefix(&keys::share_index_prefix()) {
            let (key, value) = entry?;
            let decoded: IndexEntry = bincode::deserialize(&value)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            if decoded.shard == *root {
                batch.delete(&key);
            }
        }
        self.db.write_batch(batch)?;
        Ok(())
    }
}
