use thiserror::Error;

pub mod codec;
pub mod eds;
pub mod merkle;

pub use eds::{empty_eds, empty_root, random_eds, ExtendedDataSquare, ShareWithProof};
pub use merkle::MerkleProof;

/// Maximum width of the original data quadrant. The Galois-8 Reed-Solomon
/// field caps the extended width at 256 shards per axis.
pub const MAX_ORIGINAL_WIDTH: usize = 128;

#[derive(Debug, Error)]
pub enum SquareError {
    #[error("Invalid square size: {0} shares do not form a power-of-two square")]
    InvalidSquareSize(usize),

    #[error("Square too large: original width {width} exceeds {MAX_ORIGINAL_WIDTH}")]
    TooLarge { width: usize },

    #[error("Coordinate {0} out of bounds for width {1}")]
    OutOfBounds(haven_types::Coordinate, usize),

    #[error("Erasure coding failed: {0}")]
    Erasure(String),

    #[error("Type error: {0}")]
    Types(#[from] haven_types::TypesError),
}

pub type Result<T> = std::result::Result<T, SquareError>;
