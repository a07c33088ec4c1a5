use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use haven_storage::{keys, Database, TypedDatabase};

use crate::Result;

/// Persisted sampling progress. `sampled_before` is the first height
/// without a terminal verdict: every height below it was either verified
/// available or recorded in `failed` after exhausting retries. The value
/// only ever advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub sampled_before: u64,
    /// Heights that exhausted retries, with their attempt counts. Kept so a
    /// later catch-up pass can revisit them.
    pub failed: BTreeMap<u64, u32>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            sampled_before: 1,
            failed: BTreeMap::new(),
        }
    }
}

/// Owns the checkpoint and the out-of-order completion buffer. Verdicts
/// arrive in any order; the persisted height only moves once the prefix
/// below it is gapless.
pub struct CheckpointTracker {
    db: Arc<dyn Database>,
    state: Mutex<State>,
}

struct State {
    checkpoint: Checkpoint,
    /// Terminal verdicts above the contiguous prefix.
    done: BTreeSet<u64>,
}

impl CheckpointTracker {
    /// Load the persisted checkpoint, or start fresh from height one.
    pub fn load(db: Arc<dyn Database>) -> Result<Self> {
        let checkpoint: Checkpoint = db
            .get_typed(&keys::checkpoint_key())?
            .unwrap_or_default();
        debug!(sampled_before = checkpoint.sampled_before, "loaded checkpoint");
        Ok(Self {
            db,
            state: Mutex::new(State {
                checkpoint,
                done: BTreeSet::new(),
            }),
        })
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.state.lock().checkpoint.clone()
    }

    /// First height without a terminal verdict.
    pub fn sampled_before(&self) -> u64 {
        self.state.lock().checkpoint.sampled_before
    }

    /// True if the height already has a terminal verdict.
    pub fn is_done(&self, height: u64) -> bool {
        let state = self.state.lock();
        height < state.checkpoint.sampled_before || state.done.contains(&height)
    }

    /// Record a verified-available verdict.
    pub fn record_success(&self, height: u64) {
        let mut state = self.state.lock();
        state.checkpoint.failed.remove(&height);
        state.settle(height);
    }

    /// Record a terminal failure after retries ran out. Counts toward the
    /// contiguous prefix so one dead height never stalls the checkpoint;
    /// the height stays listed in `failed`.
    pub fn record_permanent_failure(&self, height: u64, attempts: u32) {
        let mut state = self.state.lock();
        state.checkpoint.failed.insert(height, attempts);
        state.settle(height);
    }

    /// Write the current checkpoint to the database.
    pub fn persist(&self) -> Result<()> {
        let checkpoint = self.checkpoint();
        self.db.put_typed(&keys::checkpoint_key(), &checkpoint)?;
        debug!(
            sampled_before = checkpoint.sampled_before,
            failed = checkpoint.failed.len(),
            "persisted checkpoint"
        );
        Ok(())
    }
}

impl State {
    fn settle(&mut self, height: u64) {
        if height < self.checkpoint.sampled_before {
            return;
        }
        self.done.insert(height);
        while self.done.remove(&self.checkpoint.sampled_before) {
            self.checkpoint.sampled_before += 1;
        }
    }
}
