use std::path::Path;
use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch as RocksWriteBatch, DB};

use crate::traits::BatchOp;
use crate::{Database, KeyValue, Result, StorageError, WriteBatch};

/// Durable database backend over RocksDB.
pub struct RocksDatabase {
    db: Arc<DB>,
}

impl RocksDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_max_open_files(1024);

        let db = DB::open(&opts, path).map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        DB::destroy(&Options::default(), path)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }
}

impl Database for RocksDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db
            .delete(key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut rocks_batch = RocksWriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => rocks_batch.put(key, value),
                BatchOp::Delete(key) => rocks_batch.delete(key),
            }
        }
        self.db
            .write(rocks_batch)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = Result<KeyValue>> + '_> {
        let prefix = prefix.to_vec();
        let iter = self
            .db
            .iterator(IteratorMode::From(&prefix, Direction::Forward));
        Box::new(
            iter.map(|result| {
                result
                    .map_err(|e| StorageError::DatabaseError(e.to_string()))
                    .map(|(k, v)| (k.to_vec(), v.to_vec()))
            })
            .take_while(move |entry| match entry {
                Ok((k, _)) => k.starts_with(&prefix),
                Err(_) => true,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rocksdb_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        db.put(b"test_key", b"test_value").unwrap();
        assert_eq!(db.get(b"test_key").unwrap(), Some(b"test_value".to_vec()));
        assert!(db.contains(b"test_key").unwrap());

        db.delete(b"test_key").unwrap();
        assert!(!db.contains(b"test_key").unwrap());
    }

    #[test]
    fn test_rocksdb_batch() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        let mut batch = WriteBatch::new();
        for i in 0..100u8 {
            batch.put(&[i], &[i, i]);
        }
        db.write_batch(batch).unwrap();

        for i in 0..100u8 {
            assert_eq!(db.get(&[i]).unwrap(), Some(vec![i, i]));
        }
    }

    #[test]
    fn test_rocksdb_iter_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        db.put(b"idx/1", b"a").unwrap();
        db.put(b"idx/2", b"b").unwrap();
        db.put(b"jdx/3", b"c").unwrap();

        let entries: Vec<KeyValue> = db
            .iter_prefix(b"idx/")
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
    }
}
