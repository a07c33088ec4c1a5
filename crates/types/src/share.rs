use primitive_types::H256;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::{Result, TypesError, NAMESPACE_SIZE, SHARE_SIZE};

/// Namespace prefix identifying the application data carried by a share.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Namespace(pub [u8; NAMESPACE_SIZE]);

impl Namespace {
    pub const fn new(bytes: [u8; NAMESPACE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NAMESPACE_SIZE {
            return Err(TypesError::InvalidNamespace(bytes.len()));
        }
        let mut ns = [0u8; NAMESPACE_SIZE];
        ns.copy_from_slice(bytes);
        Ok(Self(ns))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Generate a random non-zero namespace, used by tests and fixtures.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut ns = [0u8; NAMESPACE_SIZE];
        rng.fill(&mut ns);
        ns[0] |= 1;
        Self(ns)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Namespace(0x{})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Fixed-size chunk of namespaced data, the atomic unit of sampling and
/// storage. The first `NAMESPACE_SIZE` bytes are the namespace prefix.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share(Vec<u8>);

impl Share {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() != SHARE_SIZE {
            return Err(TypesError::InvalidShareSize {
                expected: SHARE_SIZE,
                got: data.len(),
            });
        }
        Ok(Self(data))
    }

    /// Build a share from arbitrary payload bytes, zero-padding the tail.
    /// Payloads longer than the share body are truncated.
    pub fn tail_padded(namespace: Namespace, payload: &[u8]) -> Self {
        let mut data = vec![0u8; SHARE_SIZE];
        data[..NAMESPACE_SIZE].copy_from_slice(namespace.as_bytes());
        let body = &mut data[NAMESPACE_SIZE..];
        let n = payload.len().min(body.len());
        body[..n].copy_from_slice(&payload[..n]);
        Self(data)
    }

    /// The all-zero share used to build the well-known empty square.
    pub fn empty() -> Self {
        Self(vec![0u8; SHARE_SIZE])
    }

    pub fn namespace(&self) -> Namespace {
        let mut ns = [0u8; NAMESPACE_SIZE];
        ns.copy_from_slice(&self.0[..NAMESPACE_SIZE]);
        Namespace(ns)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Keccak-256 over the full share, used as its content address in the
    /// inverted index.
    pub fn content_hash(&self) -> H256 {
        let mut hasher = Keccak256::new();
        hasher.update(&self.0);
        H256::from_slice(&hasher.finalize())
    }

    /// Generate a share with a random body under the given namespace.
    pub fn random<R: Rng>(rng: &mut R, namespace: Namespace) -> Self {
        let mut body = vec![0u8; SHARE_SIZE - NAMESPACE_SIZE];
        rng.fill(body.as_mut_slice());
        Self::tail_padded(namespace, &body)
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Share(ns={}, {}..)",
            self.namespace(),
            hex::encode(&self.0[NAMESPACE_SIZE..NAMESPACE_SIZE + 4])
        )
    }
}

impl AsRef<[u8]> for Share {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_size_enforced() {
        assert!(Share::new(vec![0u8; SHARE_SIZE]).is_ok());
        assert!(Share::new(vec![0u8; SHARE_SIZE - 1]).is_err());
        assert!(Share::new(vec![0u8; SHARE_SIZE + 1]).is_err());
    }

    #[test]
    fn test_namespace_prefix() {
        let mut rng = rand::thread_rng();
        let ns = Namespace::random(&mut rng);
        let share = Share::random(&mut rng, ns);
        assert_eq!(share.namespace(), ns);
        assert_eq!(share.as_bytes().len(), SHARE_SIZE);
    }

    #[test]
    fn test_content_hash_differs() {
        let mut rng = rand::thread_rng();
        let ns = Namespace::random(&mut rng);
        let a = Share::random(&mut rng, ns);
        let b = Share::random(&mut rng, ns);
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), a.clone().content_hash());
    }

    #[test]
    fn test_tail_padding_truncates() {
        let ns = Namespace::new([1; NAMESPACE_SIZE]);
        let long = vec![0xAB; SHARE_SIZE * 2];
        let share = Share::tail_padded(ns, &long);
        assert_eq!(share.as_bytes().len(), SHARE_SIZE);
    }
}
