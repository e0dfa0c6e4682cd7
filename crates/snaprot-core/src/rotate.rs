//! Rotation: shift every slot of a generation one index older.
//!
//! Indices are visited strictly from `max_index` down to 0. Slot `i` may only
//! land on `i + 1` after `i + 1` itself has moved on; walking low-to-high
//! would overwrite slots that have not been promoted yet.

use serde::Serialize;
use tracing::{error, info, trace, warn};

use crate::engine::Engine;
use crate::error::SnaprotError;
use crate::generation::{Generation, SlotId};

/// The order in which rotation visits indices `0..=max_index`.
pub fn rotation_order(max_index: u32) -> impl Iterator<Item = u32> {
    (0..=max_index).rev()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// Atomic rename of an existing snapshot.
    Rename,
    /// Fresh read-only snapshot of the writable `hourly.0`.
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Move {
    pub from: SlotId,
    pub to: SlotId,
    pub kind: MoveKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    pub moves: Vec<Move>,
    /// Indices whose move failed; the rest of the rotation still ran.
    pub failures: Vec<String>,
}

impl Engine {
    /// Shift every existing slot of `generation` to the next index.
    ///
    /// Missing indices are skipped. A failed move is logged and recorded in
    /// the report; the remaining indices are still rotated.
    ///
    /// # Errors
    ///
    /// [`SnaprotError::Corrupted`] when a slot about to be renamed is not a
    /// genuine snapshot.
    pub fn rotate(&self, generation: Generation) -> Result<RotationReport, SnaprotError> {
        let mut report = RotationReport::default();

        for index in rotation_order(self.policy.max_index(generation)) {
            let from = SlotId::new(generation, index);
            if !self.store.exists(from) {
                trace!(slot = %from, "gap, skipping");
                continue;
            }
            let to = from.older();
            let src = self.store.path_of(from);
            let dst = self.store.path_of(to);

            let outcome = if index == 0 && generation == Generation::Hourly {
                self.snapshot_slot(&src, &dst)
                    .map(|()| MoveKind::Snapshot)
            } else {
                if !self.store.is_valid_snapshot(&src) {
                    error!(slot = %from, path = %src.display(), "refusing to rotate a non-snapshot");
                    return Err(SnaprotError::Corrupted { path: src });
                }
                self.ops.rename(&src, &dst).map(|()| MoveKind::Rename)
            };

            match outcome {
                Ok(kind) => {
                    info!(from = %from, to = %to, ?kind, "rotated");
                    report.moves.push(Move { from, to, kind });
                }
                Err(err) => {
                    warn!(from = %from, to = %to, %err, "rotation step failed, continuing");
                    report.failures.push(format!("{from} -> {to}: {err}"));
                }
            }
        }

        Ok(report)
    }
}
