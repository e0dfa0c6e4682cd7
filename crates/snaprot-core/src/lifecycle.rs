//! Top-level operations: one rotation cycle, first-time setup and manual
//! removal.

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::create::CreationReport;
use crate::engine::Engine;
use crate::error::SnaprotError;
use crate::generation::{Generation, SlotId};
use crate::rotate::Move;

/// What one `run_cycle` did, or would have done in a rehearsal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub generation: Generation,
    pub rehearsal: bool,
    pub pre_pruned: Vec<SlotId>,
    pub moves: Vec<Move>,
    pub post_pruned: Vec<SlotId>,
    pub created: CreationReport,
    /// Non-fatal failures from rotation and creation, in order.
    pub warnings: Vec<String>,
}

/// Occupancy of one generation against its retained window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationStatus {
    pub generation: Generation,
    pub retained: u32,
    pub occupied: Vec<u32>,
}

impl GenerationStatus {
    /// Occupied indices past `retained - 1`; normally empty between cycles.
    #[must_use]
    pub fn overflow(&self) -> Vec<u32> {
        self.occupied
            .iter()
            .copied()
            .filter(|index| *index >= self.retained)
            .collect()
    }
}

impl Engine {
    /// Prune, rotate, prune again, then create slot 0.
    ///
    /// The first prune clears anything left past the window, by an
    /// interrupted cycle or a lowered retained count; the second drops the slot
    /// this rotation pushed out.
    ///
    /// # Errors
    ///
    /// Any fatal error from the four steps; nothing is retried.
    #[instrument(skip(self), fields(rehearsal = self.ops.is_rehearsal()))]
    pub fn run_cycle(&self, generation: Generation) -> Result<CycleReport, SnaprotError> {
        let pre_pruned = self.prune(generation)?;
        let rotation = self.rotate(generation)?;
        let post_pruned = self.prune(generation)?;
        let created = self.create(generation)?;

        let mut warnings = rotation.failures;
        warnings.extend(created.warnings.iter().cloned());
        info!(
            moves = rotation.moves.len(),
            warnings = warnings.len(),
            "cycle finished"
        );

        Ok(CycleReport {
            generation,
            rehearsal: self.ops.is_rehearsal(),
            pre_pruned,
            moves: rotation.moves,
            post_pruned,
            created,
            warnings,
        })
    }

    /// First-time setup: create the root and a fresh `hourly.0`, then fill it.
    ///
    /// # Errors
    ///
    /// [`SnaprotError::NoSources`] with an empty source list, or
    /// [`SnaprotError::SlotExists`] when `hourly.0` is already present.
    #[instrument(skip(self))]
    pub fn init(&self) -> Result<CreationReport, SnaprotError> {
        if self.sources.is_empty() {
            return Err(SnaprotError::NoSources);
        }
        self.ops.create_dir_all(self.store.root())?;

        let slot = SlotId::newest(Generation::Hourly);
        let path = self.store.path_of(slot);
        if self.store.exists(slot) {
            error!(path = %path.display(), "already initialised");
            return Err(SnaprotError::SlotExists { path });
        }
        self.ops.create_volume(&path)?;
        self.populate_hourly()
    }

    /// Delete one slot outright.
    ///
    /// Returns `false` when the slot does not exist.
    ///
    /// # Errors
    ///
    /// [`SnaprotError::Corrupted`] when the slot is not a genuine snapshot.
    #[instrument(skip(self))]
    pub fn remove(&self, slot: SlotId) -> Result<bool, SnaprotError> {
        if !self.store.exists(slot) {
            info!(%slot, "nothing to remove");
            return Ok(false);
        }
        let path = self.store.path_of(slot);
        if !self.store.is_valid_snapshot(&path) {
            error!(%slot, path = %path.display(), "refusing to remove a non-snapshot");
            return Err(SnaprotError::Corrupted { path });
        }
        self.delete_slot(&path)?;
        info!(%slot, "removed");
        Ok(true)
    }

    #[must_use]
    pub fn status(&self) -> Vec<GenerationStatus> {
        Generation::ALL
            .iter()
            .map(|&generation| GenerationStatus {
                generation,
                retained: self.policy.retained_count(generation),
                occupied: self.store.occupied(generation),
            })
            .collect()
    }
}
