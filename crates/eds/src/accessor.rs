use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;

use haven_types::{Coordinate, DataHash, Namespace, Share, SHARE_SIZE};

use crate::shard::{self, read_header};
use crate::{EdsError, Result};

/// Random-access handle over one shard archive on disk. Cheap to clone via
/// `Arc`, safe to share across tasks. Closing is idempotent and any read
/// after close fails with `AccessorClosed`.
pub struct ShardAccessor {
    root: DataHash,
    width: usize,
    file: Mutex<Option<File>>,
}

impl ShardAccessor {
    /// Open an archive and check its header against the expected root.
    pub fn open<P: AsRef<Path>>(path: P, expected: DataHash) -> Result<Self> {
        let mut file = File::open(path)?;
        let header = read_header(&mut file)?;
        if header.root != expected {
            return Err(EdsError::IntegrityMismatch {
                expected,
                got: header.root,
            });
        }
        Ok(Self {
            root: expected,
            width: header.width,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn root(&self) -> DataHash {
        self.root
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Read the share at a coordinate of the extended square.
    pub fn share(&self, coord: Coordinate) -> Result<Share> {
        if coord.row >= self.width || coord.col >= self.width {
            return Err(EdsError::InvalidShard(format!(
                "coordinate {coord} out of bounds for width {}",
                self.width
            )));
        }
        self.read_at(shard::share_offset(self.width, coord) as u64)
    }

    /// Read the share at a quadrant-major serial position, the form the
    /// inverted index stores.
    pub fn share_at(&self, pos: u32) -> Result<Share> {
        if pos as usize >= self.width * self.width {
            return Err(EdsError::InvalidShard(format!(
                "position {pos} out of bounds for width {}",
                self.width
            )));
        }
        self.read_at((shard::HEADER_LEN + pos as usize * SHARE_SIZE) as u64)
    }

    /// All shares of one row of the extended square.
    pub fn row(&self, index: usize) -> Result<Vec<Share>> {
        (0..self.width)
            .map(|col| self.share(Coordinate::new(index, col)))
            .collect()
    }

    /// Original-data shares carrying the given namespace, scanned in
    /// row-major order. Parity quadrants never hold namespaced data.
    pub fn shares_by_namespace(&self, namespace: Namespace) -> Result<Vec<Share>> {
        let n = self.width / 2;
        let mut out = Vec::new();
        for row in 0..n {
            for col in 0..n {
                let share = self.share(Coordinate::new(row, col))?;
                if share.namespace() == namespace {
                    out.push(share);
                }
            }
        }
        Ok(out)
    }

    /// Release the file handle. Subsequent reads fail.
    pub fn close(&self) {
        *self.file.lock() = None;
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }

    fn read_at(&self, offset: u64) -> Result<Share> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(EdsError::AccessorClosed)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; SHARE_SIZE];
        file.read_exact(&mut buf)?;
        Ok(Share::new(buf)?)
    }
}

impl std::fmt::Debug for ShardAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardAccessor")
            .field("root", &self.root)
            .field("width", &self.width)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::write_shard;
    use haven_square::random_eds;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_shard(
        eds: &haven_square::ExtendedDataSquare,
    ) -> (NamedTempFile, DataHash) {
        let mut file = NamedTempFile::new().unwrap();
        let mut buf = Vec::new();
        write_shard(&mut buf, eds).unwrap();
        file.write_all(&buf).unwrap();
        (file, eds.data_hash())
    }

    #[test]
    fn test_open_and_read_every_share() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let (file, root) = write_temp_shard(&eds);

        let accessor = ShardAccessor::open(file.path(), root).unwrap();
        assert_eq!(accessor.width(), 4);
        for row in 0..4 {
            for col in 0..4 {
                let coord = Coordinate::new(row, col);
                assert_eq!(&accessor.share(coord).unwrap(), eds.share(coord).unwrap());
            }
        }
    }

    #[test]
    fn test_open_rejects_wrong_root() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let (file, _) = write_temp_shard(&eds);

        let err = ShardAccessor::open(file.path(), DataHash::repeat_byte(0x11)).unwrap_err();
        assert!(matches!(err, EdsError::IntegrityMismatch { .. }));
    }

    #[test]
    fn test_row_matches_square() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let (file, root) = write_temp_shard(&eds);

        let accessor = ShardAccessor::open(file.path(), root).unwrap();
        assert_eq!(accessor.row(1).unwrap(), eds.row(1).unwrap());
    }

    #[test]
    fn test_namespace_scan_covers_original_quadrant_only() {
        let mut rng = rand::thread_rng();
        let ns = Namespace::random(&mut rng);
        let original: Vec<Share> = (0..4).map(|_| Share::random(&mut rng, ns)).collect();
        let eds = haven_square::ExtendedDataSquare::extend(&original).unwrap();
        let (file, root) = write_temp_shard(&eds);

        let accessor = ShardAccessor::open(file.path(), root).unwrap();
        let found = accessor.shares_by_namespace(ns).unwrap();
        assert_eq!(found, original);
    }

    #[test]
    fn test_close_is_idempotent_and_fails_reads() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let (file, root) = write_temp_shard(&eds);

        let accessor = ShardAccessor::open(file.path(), root).unwrap();
        accessor.close();
        accessor.close();
        assert!(accessor.is_closed());
        let err = accessor.share(Coordinate::new(0, 0)).unwrap_err();
        assert!(matches!(err, EdsError::AccessorClosed));
    }
}
