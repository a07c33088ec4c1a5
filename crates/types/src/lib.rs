use thiserror::Error;

pub mod dah;
pub mod header;
pub mod share;

pub use dah::{Coordinate, DataAvailabilityHeader, DataHash};
pub use header::ExtendedHeader;
pub use share::{Namespace, Share};

/// Size of a single share in bytes, namespace prefix included.
pub const SHARE_SIZE: usize = 256;

/// Size of the namespace prefix of a share in bytes.
pub const NAMESPACE_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("Invalid share size: expected {expected}, got {got}")]
    InvalidShareSize { expected: usize, got: usize },

    #[error("Invalid namespace length: {0}")]
    InvalidNamespace(usize),

    #[error("Invalid commitment: {0}")]
    InvalidCommitment(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
