use serde::{Deserialize, Serialize};

use crate::dah::{DataAvailabilityHeader, DataHash};

/// Block header extended with a data-availability commitment. Produced by the
/// blockchain client, consumed here by reference only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedHeader {
    pub height: u64,
    pub dah: DataAvailabilityHeader,
}

impl ExtendedHeader {
    pub fn new(height: u64, dah: DataAvailabilityHeader) -> Self {
        Self { height, dah }
    }

    /// Content address of the committed square.
    pub fn data_hash(&self) -> DataHash {
        self.dah.hash()
    }
}

impl std::fmt::Display for ExtendedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "header(height={}, root=0x{})",
            self.height,
            hex::encode(&self.data_hash().as_bytes()[..8])
        )
    }
}
