use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::lifecycle::{transition, PeerStatus, StatusEvent};
use crate::{P2pError, PeerId, Result};

/// Per-peer mutable state, scoped to the owning pool's protocol: a peer
/// tracked under several protocols has one record per pool. Updates are
/// serialized by the record's own mutex; the pool map is only locked to
/// find or insert records.
#[derive(Debug)]
pub struct PeerRecord {
    pub id: PeerId,
    pub status: PeerStatus,
    pub last_result: Instant,
}

impl PeerRecord {
    fn new(id: PeerId) -> Self {
        Self {
            id,
            status: PeerStatus::Created,
            last_result: Instant::now(),
        }
    }

    fn apply(&mut self, event: StatusEvent) -> Result<()> {
        self.status = transition(self.status, event)?;
        self.last_result = Instant::now();
        Ok(())
    }
}

/// Tracked set of peers for one retrieval protocol. Selection ranks
/// synced > validated > created; cooled-down peers are excluded until their
/// deadline and restored lazily on the next selection pass; blacklisted
/// peers are never selected again.
pub struct PeerPool {
    protocol: &'static str,
    peers: RwLock<HashMap<PeerId, Arc<Mutex<PeerRecord>>>>,
}

impl PeerPool {
    pub fn new(protocol: &'static str) -> Self {
        Self {
            protocol,
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Register a discovered peer. Re-adding an existing peer keeps its
    /// current status, blacklisted included.
    pub fn add(&self, id: PeerId) {
        let mut peers = self.peers.write();
        peers
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(PeerRecord::new(id))));
    }

    pub fn status(&self, id: &PeerId) -> Option<PeerStatus> {
        self.record(id).map(|r| r.lock().status)
    }

    /// Record a verified response from a peer.
    pub fn report_success(&self, id: &PeerId) -> Result<()> {
        self.apply(id, StatusEvent::Success)
    }

    /// Record a transient failure, cooling the peer down for the given
    /// backoff. Never blacklists.
    pub fn report_failure(&self, id: &PeerId, backoff: Duration) -> Result<()> {
        let until = Instant::now() + backoff;
        debug!(protocol = self.protocol, peer = %id, ?backoff, "peer cooling down");
        self.apply(id, StatusEvent::TransientFailure { until })
    }

    /// Permanently exclude a peer after a cryptographic-proof violation.
    pub fn blacklist(&self, id: &PeerId) -> Result<()> {
        warn!(protocol = self.protocol, peer = %id, "blacklisting peer");
        self.apply(id, StatusEvent::ProofViolation)
    }

    /// Pick up to `n` eligible peers, best status first. Expired cooldowns
    /// are restored in passing. Errors with `PoolExhausted` when nothing is
    /// eligible.
    pub fn select(&self, n: usize) -> Result<Vec<PeerId>> {
        let now = Instant::now();
        let records: Vec<Arc<Mutex<PeerRecord>>> =
            self.peers.read().values().cloned().collect();

        let mut ranked: Vec<(u8, PeerId)> = Vec::new();
        for record in records {
            let mut record = record.lock();
            if let PeerStatus::Cooldown { until, .. } = record.status {
                if now >= until {
                    record.apply(StatusEvent::CooldownExpired)?;
                }
            }
            let rank = match record.status {
                PeerStatus::Synced => 0,
                PeerStatus::Validated => 1,
                PeerStatus::Created => 2,
                PeerStatus::Cooldown { .. } | PeerStatus::Blacklisted => continue,
            };
            ranked.push((rank, record.id));
        }

        if ranked.is_empty() {
            return Err(P2pError::PoolExhausted);
        }
        ranked.sort_by_key(|(rank, _)| *rank);
        Ok(ranked.into_iter().take(n).map(|(_, id)| id).collect())
    }

    fn record(&self, id: &PeerId) -> Option<Arc<Mutex<PeerRecord>>> {
        self.peers.read().get(id).cloned()
    }

    fn apply(&self, id: &PeerId, event: StatusEvent) -> Result<()> {
        let record = self.record(id).ok_or(P2pError::UnknownPeer(*id))?;
        let result = record.lock().apply(event);
        result
    }
}
