use std::time::Instant;

use crate::{P2pError, Result};

/// Status a cooled-down peer returns to once its backoff expires. Only
/// peers that already served a success can cool down, so the resume point is
/// never `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStatus {
    Validated,
    Synced,
}

/// Peer health lifecycle. Forward-only: a peer never loses trust it earned
/// except through the terminal `Blacklisted` state, and `Cooldown` always
/// returns to the exact status the peer held before the transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    /// Discovered, no successful response yet.
    Created,
    /// Served at least one verified response.
    Validated,
    /// Actively serving requests.
    Synced,
    /// Temporarily excluded after a transient failure.
    Cooldown { resume: ResumeStatus, until: Instant },
    /// Terminal. Set on proof violation or protocol misbehavior.
    Blacklisted,
}

impl PeerStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Validated => "validated",
            Self::Synced => "synced",
            Self::Cooldown { .. } => "cooldown",
            Self::Blacklisted => "blacklisted",
        }
    }

    pub fn is_blacklisted(&self) -> bool {
        matches!(self, Self::Blacklisted)
    }
}

/// Everything that can happen to a peer, fed into [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// A response was received and verified.
    Success,
    /// Timeout or other network-level failure. Never blacklists.
    TransientFailure { until: Instant },
    /// The cooldown deadline passed.
    CooldownExpired,
    /// The peer returned data failing cryptographic verification.
    ProofViolation,
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TransientFailure { .. } => "transient_failure",
            Self::CooldownExpired => "cooldown_expired",
            Self::ProofViolation => "proof_violation",
        }
    }
}

/// The single authorized state transition. Every status change in the pool
/// goes through here; illegal moves are rejected rather than silently
/// coerced.
pub fn transition(status: PeerStatus, event: StatusEvent) -> Result<PeerStatus> {
    use PeerStatus::*;
    use StatusEvent::*;

    let next = match (status, event) {
        // Blacklisting is absorbing and applies from any state.
        (_, ProofViolation) => Blacklisted,
        (Blacklisted, _) => return illegal(status, event),

        (Created, Success) => Validated,
        (Validated, Success) => Synced,
        (Synced, Success) => Synced,

        // A peer that never proved itself has nothing to resume to.
        (Created, TransientFailure { .. }) => Created,
        (Validated, TransientFailure { until }) => Cooldown {
            resume: ResumeStatus::Validated,
            until,
        },
        (Synced, TransientFailure { until }) => Cooldown {
            resume: ResumeStatus::Synced,
            until,
        },

        (Cooldown { resume, .. }, CooldownExpired) => match resume {
            ResumeStatus::Validated => Validated,
            ResumeStatus::Synced => Synced,
        },

        _ => return illegal(status, event),
    };
    Ok(next)
}

fn illegal(status: PeerStatus, event: StatusEvent) -> Result<PeerStatus> {
    Err(P2pError::IllegalTransition {
        from: status.name(),
        event: event.name(),
    })
}
