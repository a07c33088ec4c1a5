use primitive_types::H256;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::{Result, TypesError};

/// Hash of a data-availability commitment, the content address of a full
/// extended square.
pub type DataHash = H256;

/// Position of a share within the extended square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: usize,
    pub col: usize,
}

impl Coordinate {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Data-availability commitment over a 2n x 2n extended square: one Merkle
/// root per row and per column. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAvailabilityHeader {
    pub row_roots: Vec<H256>,
    pub col_roots: Vec<H256>,
}

impl DataAvailabilityHeader {
    pub fn new(row_roots: Vec<H256>, col_roots: Vec<H256>) -> Result<Self> {
        let dah = Self {
            row_roots,
            col_roots,
        };
        dah.validate_basic()?;
        Ok(dah)
    }

    /// Width of the committed extended square.
    pub fn square_width(&self) -> usize {
        self.row_roots.len()
    }

    /// Width of the original data quadrant.
    pub fn original_width(&self) -> usize {
        self.square_width() / 2
    }

    /// Structural validation: root counts must match, be even and a power of
    /// two, since the square is a 2n x 2n extension of an n x n original.
    pub fn validate_basic(&self) -> Result<()> {
        let width = self.row_roots.len();
        if width == 0 {
            return Err(TypesError::InvalidCommitment("no row roots".into()));
        }
        if width != self.col_roots.len() {
            return Err(TypesError::InvalidCommitment(format!(
                "row/col root count mismatch: {} != {}",
                width,
                self.col_roots.len()
            )));
        }
        if !width.is_power_of_two() || width < 2 {
            return Err(TypesError::InvalidCommitment(format!(
                "square width {width} is not an even power of two"
            )));
        }
        Ok(())
    }

    /// Content address of the commitment: Keccak-256 over the length-prefixed
    /// concatenation of all row and column roots.
    pub fn hash(&self) -> DataHash {
        let mut hasher = Keccak256::new();
        hasher.update((self.row_roots.len() as u32).to_be_bytes());
        for root in &self.row_roots {
            hasher.update(root.as_bytes());
        }
        for root in &self.col_roots {
            hasher.update(root.as_bytes());
        }
        H256::from_slice(&hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_roots(n: usize) -> Vec<H256> {
        (0..n).map(|i| H256::repeat_byte(i as u8)).collect()
    }

    #[test]
    fn test_validate_basic() {
        let dah = DataAvailabilityHeader::new(dummy_roots(4), dummy_roots(4)).unwrap();
        assert_eq!(dah.square_width(), 4);
        assert_eq!(dah.original_width(), 2);

        assert!(DataAvailabilityHeader::new(dummy_roots(4), dummy_roots(2)).is_err());
        assert!(DataAvailabilityHeader::new(dummy_roots(3), dummy_roots(3)).is_err());
        assert!(DataAvailabilityHeader::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let a = DataAvailabilityHeader::new(dummy_roots(2), dummy_roots(2)).unwrap();
        let mut row_roots = dummy_roots(2);
        row_roots.reverse();
        let b = DataAvailabilityHeader::new(row_roots, dummy_roots(2)).unwrap();
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.hash());
    }
}
