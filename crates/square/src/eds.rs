use std::sync::OnceLock;

use primitive_types::H256;
use rand::Rng;
use serde::{Deserialize, Serialize};

use haven_types::{Coordinate, DataAvailabilityHeader, DataHash, Namespace, Share};

use crate::codec::extend_chunks;
use crate::merkle::{leaf_hash, merkle_root, MerkleProof};
use crate::{Result, SquareError, MAX_ORIGINAL_WIDTH};

/// 2n x 2n matrix of shares in row-major order. The first n x n quadrant is
/// original data, the remaining three quadrants are erasure-coding parity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedDataSquare {
    width: usize,
    shares: Vec<Share>,
}

impl ExtendedDataSquare {
    /// Erasure-extend an n x n original square into its 2n x 2n form: rows of
    /// the original are extended first, then every column of the upper half
    /// is extended downwards. Linearity of the code makes the lower-right
    /// quadrant consistent either way.
    pub fn extend(original: &[Share]) -> Result<Self> {
        let n = integer_sqrt(original.len());
        if n == 0 || n * n != original.len() || !n.is_power_of_two() {
            return Err(SquareError::InvalidSquareSize(original.len()));
        }
        if n > MAX_ORIGINAL_WIDTH {
            return Err(SquareError::TooLarge { width: n });
        }
        let width = 2 * n;

        // Row extension: n rows of width n grow to width 2n.
        let mut upper: Vec<Vec<Share>> = Vec::with_capacity(n);
        for row in original.chunks(n) {
            let data: Vec<Vec<u8>> = row.iter().map(|s| s.as_bytes().to_vec()).collect();
            let parity = extend_chunks(&data)?;
            let mut extended: Vec<Share> = row.to_vec();
            for chunk in parity {
                extended.push(Share::new(chunk)?);
            }
            upper.push(extended);
        }

        // Column extension: each of the 2n columns of the upper half grows
        // from n to 2n cells, filling the lower half.
        let mut lower: Vec<Vec<Share>> = vec![Vec::with_capacity(width); n];
        for col in 0..width {
            let data: Vec<Vec<u8>> = upper.iter().map(|r| r[col].as_bytes().to_vec()).collect();
            let parity = extend_chunks(&data)?;
            for (i, chunk) in parity.into_iter().enumerate() {
                lower[i].push(Share::new(chunk)?);
            }
        }

        let mut shares = Vec::with_capacity(width * width);
        for row in upper {
            shares.extend(row);
        }
        for row in lower {
            shares.extend(row);
        }
        Ok(Self { width, shares })
    }

    /// Assemble a square from an already extended share list. Parity
    /// consistency is not checked here; callers compare the recomputed
    /// commitment against a trusted root instead.
    pub fn from_shares(shares: Vec<Share>) -> Result<Self> {
        let width = integer_sqrt(shares.len());
        if width * width != shares.len() || !width.is_power_of_two() || width < 2 {
            return Err(SquareError::InvalidSquareSize(shares.len()));
        }
        Ok(Self { width, shares })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn original_width(&self) -> usize {
        self.width / 2
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn share(&self, coord: Coordinate) -> Result<&Share> {
        if coord.row >= self.width || coord.col >= self.width {
            return Err(SquareError::OutOfBounds(coord, self.width));
        }
        Ok(&self.shares[coord.row * self.width + coord.col])
    }

    pub fn row(&self, index: usize) -> Result<&[Share]> {
        if index >= self.width {
            return Err(SquareError::OutOfBounds(
                Coordinate::new(index, 0),
                self.width,
            ));
        }
        Ok(&self.shares[index * self.width..(index + 1) * self.width])
    }

    pub fn column(&self, index: usize) -> Result<Vec<Share>> {
        if index >= self.width {
            return Err(SquareError::OutOfBounds(
                Coordinate::new(0, index),
                self.width,
            ));
        }
        Ok((0..self.width)
            .map(|row| self.shares[row * self.width + index].clone())
            .collect())
    }

    /// Shares of the original data quadrant in row-major order.
    pub fn original_shares(&self) -> Vec<Share> {
        let n = self.original_width();
        let mut out = Vec::with_capacity(n * n);
        for row in 0..n {
            out.extend_from_slice(&self.shares[row * self.width..row * self.width + n]);
        }
        out
    }

    /// Recompute the data-availability commitment over this square.
    pub fn da_header(&self) -> DataAvailabilityHeader {
        let row_roots = (0..self.width)
            .map(|i| {
                let leaves = self.row_leaves(i);
                merkle_root(&leaves)
            })
            .collect();
        let col_roots = (0..self.width)
            .map(|j| {
                let leaves: Vec<H256> = (0..self.width)
                    .map(|i| leaf_hash(self.shares[i * self.width + j].as_bytes()))
                    .collect();
                merkle_root(&leaves)
            })
            .collect();
        DataAvailabilityHeader {
            row_roots,
            col_roots,
        }
    }

    /// Content address of this square.
    pub fn data_hash(&self) -> DataHash {
        self.da_header().hash()
    }

    /// A share together with its row-inclusion proof.
    pub fn share_with_proof(&self, coord: Coordinate) -> Result<ShareWithProof> {
        let share = self.share(coord)?.clone();
        let leaves = self.row_leaves(coord.row);
        let proof = MerkleProof::build(&leaves, coord.col);
        Ok(ShareWithProof {
            share,
            coord,
            proof,
        })
    }

    fn row_leaves(&self, row: usize) -> Vec<H256> {
        self.shares[row * self.width..(row + 1) * self.width]
            .iter()
            .map(|s| leaf_hash(s.as_bytes()))
            .collect()
    }
}

/// Share paired with the Merkle proof of its inclusion in a committed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareWithProof {
    pub share: Share,
    pub coord: Coordinate,
    pub proof: MerkleProof,
}

impl ShareWithProof {
    /// Check the proof against the row root the commitment declares for this
    /// coordinate.
    pub fn verify(&self, dah: &DataAvailabilityHeader) -> bool {
        if self.coord.row >= dah.square_width() || self.proof.index != self.coord.col {
            return false;
        }
        let root = &dah.row_roots[self.coord.row];
        self.proof.verify(root, &leaf_hash(self.share.as_bytes()))
    }
}

static EMPTY_EDS: OnceLock<ExtendedDataSquare> = OnceLock::new();
static EMPTY_ROOT: OnceLock<DataHash> = OnceLock::new();

/// The well-known 2x2 extension of a single empty share. Headers committing
/// to it carry no data and need no sampling.
pub fn empty_eds() -> &'static ExtendedDataSquare {
    EMPTY_EDS.get_or_init(|| {
        ExtendedDataSquare::extend(&[Share::empty()]).expect("empty square always extends")
    })
}

/// Commitment hash of the empty square.
pub fn empty_root() -> DataHash {
    *EMPTY_ROOT.get_or_init(|| empty_eds().data_hash())
}

/// Random fully-extended square for tests and simulations.
pub fn random_eds<R: Rng>(rng: &mut R, original_width: usize) -> ExtendedDataSquare {
    let shares: Vec<Share> = (0..original_width * original_width)
        .map(|_| {
            let ns = Namespace::random(rng);
            Share::random(rng, ns)
        })
        .collect();
    ExtendedDataSquare::extend(&shares).expect("random square always extends")
}

fn integer_sqrt(n: usize) -> usize {
    (n as f64).sqrt().round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_shape() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 4);
        assert_eq!(eds.width(), 8);
        assert_eq!(eds.original_width(), 4);
        assert_eq!(eds.shares().len(), 64);
    }

    #[test]
    fn test_original_quadrant_preserved() {
        let mut rng = rand::thread_rng();
        let ns = Namespace::random(&mut rng);
        let original: Vec<Share> = (0..16).map(|_| Share::random(&mut rng, ns)).collect();
        let eds = ExtendedDataSquare::extend(&original).unwrap();
        assert_eq!(eds.original_shares(), original);
    }

    #[test]
    fn test_reextension_from_quadrant_matches() {
        // Reconstructing from the first quadrant alone must yield the same
        // square and the same commitment.
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 4);
        let again = ExtendedDataSquare::extend(&eds.original_shares()).unwrap();
        assert_eq!(eds, again);
        assert_eq!(eds.data_hash(), again.data_hash());
    }

    #[test]
    fn test_commitment_validates() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let dah = eds.da_header();
        dah.validate_basic().unwrap();
        assert_eq!(dah.square_width(), 4);
    }

    #[test]
    fn test_share_proofs_verify_everywhere() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let dah = eds.da_header();
        for row in 0..eds.width() {
            for col in 0..eds.width() {
                let swp = eds.share_with_proof(Coordinate::new(row, col)).unwrap();
                assert!(swp.verify(&dah));
            }
        }
    }

    #[test]
    fn test_tampered_share_fails_proof() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let dah = eds.da_header();
        let mut swp = eds.share_with_proof(Coordinate::new(1, 2)).unwrap();
        let ns = Namespace::random(&mut rng);
        swp.share = Share::random(&mut rng, ns);
        assert!(!swp.verify(&dah));
    }

    #[test]
    fn test_empty_root_is_stable() {
        assert_eq!(empty_root(), empty_root());
        assert_eq!(empty_eds().width(), 2);
        assert_eq!(empty_eds().data_hash(), empty_root());
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        let mut rng = rand::thread_rng();
        let ns = Namespace::random(&mut rng);
        let three: Vec<Share> = (0..3).map(|_| Share::random(&mut rng, ns)).collect();
        assert!(ExtendedDataSquare::extend(&three).is_err());
        assert!(ExtendedDataSquare::from_shares(three).is_err());
    }
}
