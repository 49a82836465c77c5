use super::config::SnapshotSettings;
use super::direction::{Direction, DirectionSlots};

/// What to write for one evaluated step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CadenceDecision {
    pub snapshot: bool,
    pub checkpoint: bool,
}

/// Per-direction throttle for snapshot and checkpoint writes.
///
/// Snapshot and checkpoint counters advance independently. A write fires once
/// the step has moved at least `interval_steps` past the last write of its
/// kind. A direction with no snapshot yet counts from step -1, so snapshots
/// land on steps `interval - 1`, `2 * interval - 1`, ...; a direction with no
/// checkpoint yet always checkpoints its first step.
#[derive(Debug, Clone)]
pub struct SnapshotCadence {
    settings: SnapshotSettings,
    last_snapshot: DirectionSlots<Option<u64>>,
    last_checkpoint: DirectionSlots<Option<u64>>,
}

impl SnapshotCadence {
    pub fn new(settings: SnapshotSettings) -> Self {
        Self {
            settings,
            last_snapshot: DirectionSlots::default(),
            last_checkpoint: DirectionSlots::default(),
        }
    }

    /// Treats `step` as already written for `direction`, for resumed runs.
    pub fn seed(&mut self, direction: Direction, step: u64) {
        self.last_snapshot[direction] = Some(step);
        self.last_checkpoint[direction] = Some(step);
    }

    pub fn last_checkpoint(&self, direction: Direction) -> Option<u64> {
        self.last_checkpoint[direction]
    }

    /// Decides the writes for `step` and records the ones that fire.
    pub fn decide(&mut self, direction: Direction, step: u64) -> CadenceDecision {
        let interval = self.settings.interval_steps();
        let since = |last: u64| step.saturating_sub(last) >= interval;

        let snapshot = self.settings.write_last()
            && match self.last_snapshot[direction] {
                None => step.saturating_add(1) >= interval,
                Some(last) => since(last),
            };
        if snapshot {
            self.last_snapshot[direction] = Some(step);
        }
        let checkpoint = self.last_checkpoint[direction].is_none_or(since);
        if checkpoint {
            self.last_checkpoint[direction] = Some(step);
        }
        CadenceDecision {
            snapshot,
            checkpoint,
        }
    }
}
