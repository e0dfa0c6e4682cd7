//! Pruning: drop every slot that lies past a generation's retained count.

use tracing::{debug, error, info};

use crate::engine::Engine;
use crate::error::SnaprotError;
use crate::generation::{Generation, SlotId};

impl Engine {
    /// Delete every slot of `generation` with an index above `max_index`.
    ///
    /// Normally that is at most `max_index + 1`, pushed out by the last
    /// rotation; a lowered retained count can leave several. Victims go
    /// oldest first. Returns the pruned slots, empty when there was nothing
    /// to prune.
    ///
    /// # Errors
    ///
    /// [`SnaprotError::Corrupted`] when any victim is not a genuine snapshot:
    /// deleting a foreign directory blindly could destroy unrelated data.
    /// Victims are checked before anything is deleted.
    pub fn prune(&self, generation: Generation) -> Result<Vec<SlotId>, SnaprotError> {
        let max_index = self.policy.max_index(generation);
        let victims: Vec<SlotId> = self
            .store
            .occupied(generation)
            .into_iter()
            .rev()
            .filter(|index| *index > max_index)
            .map(|index| SlotId::new(generation, index))
            .collect();
        if victims.is_empty() {
            debug!(%generation, "nothing to prune");
            return Ok(victims);
        }

        for victim in &victims {
            let path = self.store.path_of(*victim);
            if !self.store.is_valid_snapshot(&path) {
                error!(slot = %victim, path = %path.display(), "refusing to prune a non-snapshot");
                return Err(SnaprotError::Corrupted { path });
            }
        }

        for victim in &victims {
            self.delete_slot(&self.store.path_of(*victim))?;
            info!(slot = %victim, "pruned");
        }
        Ok(victims)
    }
}
