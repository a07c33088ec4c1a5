use thiserror::Error;

pub mod lifecycle;
pub mod pool;

pub use lifecycle::{PeerStatus, ResumeStatus, StatusEvent};
pub use pool::{PeerPool, PeerRecord};

/// Opaque peer identity as handed over by the transport layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    pub fn random<R: rand::Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes);
        Self(bytes)
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PeerId({})", &hex::encode(self.0)[..8])
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &hex::encode(self.0)[..8])
    }
}

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("Unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("Illegal status transition from {from} on {event}")]
    IllegalTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("No eligible peers in the pool")]
    PoolExhausted,
}

pub type Result<T> = std::result::Result<T, P2pError>;
