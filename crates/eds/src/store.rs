use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use haven_square::ExtendedDataSquare;
use haven_storage::Database;
use haven_types::{DataHash, Share};

use crate::accessor::ShardAccessor;
use crate::index::InvertedIndex;
use crate::shard::{self, write_shard};
use crate::{EdsError, Parameters, Result};

/// Content-addressed store of extended data squares. Each square lives in
/// one shard archive on disk, named by its commitment root; share lookups by
/// content hash go through the inverted index in the shared database.
pub struct EdsStore {
    dir: PathBuf,
    index: InvertedIndex,
    accessors: Mutex<LruCache<DataHash, Arc<ShardAccessor>>>,
    recent_shares: Mutex<LruCache<DataHash, Share>>,
}

impl EdsStore {
    pub fn new<P: AsRef<Path>>(
        dir: P,
        db: Arc<dyn Database>,
        params: Parameters,
    ) -> Result<Self> {
        params.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let accessor_cap = NonZeroUsize::new(params.accessor_cache_size)
            .ok_or_else(|| EdsError::InvalidParameters("accessor cache size".into()))?;
        let shares_cap = NonZeroUsize::new(params.recent_shares_cache_size)
            .ok_or_else(|| EdsError::InvalidParameters("shares cache size".into()))?;
        Ok(Self {
            dir,
            index: InvertedIndex::new(db),
            accessors: Mutex::new(LruCache::new(accessor_cap)),
            recent_shares: Mutex::new(LruCache::new(shares_cap)),
        })
    }

    fn shard_path(&self, root: &DataHash) -> PathBuf {
        self.dir.join(hex::encode(root.as_bytes()))
    }

    /// Persist a square. Writing goes through a temp file and an atomic
    /// rename so a crash never leaves a half-written archive under the final
    /// name. Re-putting an existing square is a no-op.
    pub fn put(&self, eds: &ExtendedDataSquare) -> Result<DataHash> {
        let root = eds.data_hash();
        let path = self.shard_path(&root);
        if path.exists() {
            debug!(root = %root, "shard already stored");
            return Ok(root);
        }

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            write_shard(&mut writer, eds)?;
        }
        fs::rename(&tmp, &path)?;
        self.index.add_square(eds)?;
        debug!(root = %root, width = eds.width(), "stored shard");
        Ok(root)
    }

    /// Read a square from an archive stream, verify it against the expected
    /// root and persist it.
    pub fn ingest<R: Read>(&self, expected: DataHash, reader: R) -> Result<DataHash> {
        let eds = shard::reconstruct(expected, reader)?;
        self.put(&eds)
    }

    pub fn has(&self, root: &DataHash) -> bool {
        self.shard_path(root).exists()
    }

    /// Open (or reuse) a random-access handle for a stored square.
    pub fn open(&self, root: &DataHash) -> Result<Arc<ShardAccessor>> {
        let mut cache = self.accessors.lock();
        if let Some(accessor) = cache.get(root) {
            if !accessor.is_closed() {
                return Ok(Arc::clone(accessor));
            }
            cache.pop(root);
        }

        let path = self.shard_path(root);
        if !path.exists() {
            return Err(EdsError::NotFound);
        }
        let accessor = Arc::new(ShardAccessor::open(path, *root)?);
        cache.put(*root, Arc::clone(&accessor));
        Ok(accessor)
    }

    /// Load the full square, re-deriving it from the original-data quadrant
    /// of the archive. A root mismatch means the archive is corrupt: the
    /// shard is dropped from the store before the error is returned.
    pub fn get(&self, root: &DataHash) -> Result<ExtendedDataSquare> {
        let path = self.shard_path(root);
        if !path.exists() {
            return Err(EdsError::NotFound);
        }
        match shard::reconstruct(*root, File::open(&path)?) {
            Ok(eds) => Ok(eds),
            Err(err @ EdsError::IntegrityMismatch { .. }) => {
                warn!(root = %root, "corrupt shard detected, removing");
                self.remove(root)?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Look up a single share by its content hash. Hits the recent-shares
    /// cache first, then the inverted index. A share whose bytes no longer
    /// hash to the requested value marks its whole shard as corrupt.
    pub fn get_share_by_hash(&self, content_hash: &DataHash) -> Result<Share> {
        if let Some(share) = self.recent_shares.lock().get(content_hash) {
            return Ok(share.clone());
        }

        let entry = self.index.get(content_hash)?.ok_or(EdsError::NotFound)?;
        let accessor = self.open(&entry.shard)?;
        let share = accessor.share_at(entry.pos)?;
        if share.content_hash() != *content_hash {
            warn!(root = %entry.shard, pos = entry.pos, "share bytes do not match index, removing shard");
            self.remove(&entry.shard)?;
            return Err(EdsError::NotFound);
        }

        self.recent_shares.lock().put(*content_hash, share.clone());
        Ok(share)
    }

    /// Delete a square: evict and close its accessor, drop its index
    /// entries, then remove the archive. Index cleanup falls back to a
    /// prefix scan when the archive can no longer be read.
    pub fn remove(&self, root: &DataHash) -> Result<()> {
        if let Some(accessor) = self.accessors.lock().pop(root) {
            accessor.close();
        }

        let path = self.shard_path(root);
        if !path.exists() {
            return Err(EdsError::NotFound);
        }

        match shard::reconstruct(*root, File::open(&path)?) {
            Ok(eds) => self.index.remove_square(&eds)?,
            Err(_) => self.index.remove_by_root(root)?,
        }

        fs::remove_file(&path)?;
        debug!(root = %root, "removed shard");
        Ok(())
    }
}
