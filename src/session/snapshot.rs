//! Snapshot pacing

use crate::revolver::{MechanismEvent, Revolver};
use crate::ws::protocol::ServerMsg;

/// Decides when to publish a snapshot and builds it
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used when events are waiting)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(&self, tick: u64, revolver: &Revolver, events: Vec<MechanismEvent>) -> ServerMsg {
        ServerMsg::Snapshot {
            tick,
            state: revolver.snapshot(),
            events,
        }
    }
}
