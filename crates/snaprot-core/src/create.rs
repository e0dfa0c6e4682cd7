//! Creation: materialize a fresh slot 0.
//!
//! `hourly.0` is a writable volume refreshed from the configured sources.
//! Every coarser generation's slot 0 is a snapshot of the newest slot of its
//! predecessor.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::error::SnaprotError;
use crate::generation::{Generation, SlotId};
use crate::source::Source;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationReport {
    pub slot: SlotId,
    /// Predecessor slot that was promoted, for non-hourly generations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted_from: Option<SlotId>,
    /// Destinations populated successfully, for hourly.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub materialized: Vec<String>,
    /// Per-source failures; the remaining sources still ran.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CreationReport {
    const fn new(slot: SlotId) -> Self {
        Self {
            slot,
            promoted_from: None,
            materialized: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl Engine {
    /// Produce slot 0 of `generation`.
    ///
    /// # Errors
    ///
    /// Fatal conditions only: no sources for hourly, no predecessor slot for
    /// the others, or a collision on the new slot's path.
    pub fn create(&self, generation: Generation) -> Result<CreationReport, SnaprotError> {
        match generation.predecessor() {
            None => {
                if self.sources.is_empty() {
                    return Err(SnaprotError::NoSources);
                }
                let slot = SlotId::newest(generation);
                if !self.store.exists(slot) {
                    self.ops.create_volume(&self.store.path_of(slot))?;
                }
                self.populate_hourly()
            }
            Some(predecessor) => self.promote(predecessor, generation),
        }
    }

    /// Newest existing slot of `generation`, scanning from index 0 upward.
    #[must_use]
    pub fn newest_slot(&self, generation: Generation) -> Option<SlotId> {
        (0..=self.policy.max_index(generation))
            .map(|index| SlotId::new(generation, index))
            .find(|slot| self.store.exists(*slot))
    }

    /// Fan every configured source out into `hourly.0`.
    pub(crate) fn populate_hourly(&self) -> Result<CreationReport, SnaprotError> {
        if self.sources.is_empty() {
            return Err(SnaprotError::NoSources);
        }
        let slot = SlotId::newest(Generation::Hourly);
        let path = self.store.path_of(slot);
        let mut report = CreationReport::new(slot);

        for entry in &self.sources {
            let source = match Source::try_from(entry) {
                Ok(source) => source,
                Err(err) => {
                    error!(protocol = %entry.protocol, dst = %entry.dst, %err, "skipping source");
                    report.warnings.push(err.to_string());
                    continue;
                }
            };

            match source.materialize(&path, &self.ops, &self.transport) {
                Ok(()) => {
                    info!(protocol = source.protocol(), dst = %source.dst().display(), "source materialized");
                    report
                        .materialized
                        .push(source.dst().to_string_lossy().into_owned());
                }
                Err(err) => {
                    warn!(protocol = source.protocol(), dst = %source.dst().display(), %err, "source failed");
                    report
                        .warnings
                        .push(format!("{}: {err}", source.dst().display()));
                }
            }
        }

        Ok(report)
    }

    fn promote(
        &self,
        predecessor: Generation,
        generation: Generation,
    ) -> Result<CreationReport, SnaprotError> {
        let Some(from) = self.newest_slot(predecessor) else {
            error!(%generation, %predecessor, "no slot to promote");
            return Err(SnaprotError::NoPredecessor {
                generation,
                predecessor,
            });
        };
        let src = self.store.path_of(from);
        // hourly.0 is the writable volume and never passes the check.
        let is_live_volume = from == SlotId::newest(Generation::Hourly);
        if !is_live_volume && !self.store.is_valid_snapshot(&src) {
            warn!(slot = %from, "promoting a slot that fails the snapshot identity check");
        }

        let slot = SlotId::newest(generation);
        self.snapshot_slot(&src, &self.store.path_of(slot))?;
        info!(from = %from, to = %slot, "promoted");
        Ok(CreationReport {
            promoted_from: Some(from),
            ..CreationReport::new(slot)
        })
    }
}
