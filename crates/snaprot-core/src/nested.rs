//! Slots that contain source snapshots.
//!
//! A btrfs snapshot does not descend into subvolumes below its source: each
//! one shows up in the copy as an empty directory, and a subvolume that still
//! holds another cannot be deleted. Every `snapshot` source leaves such a
//! subvolume at `hourly.0/<dst>`, so copying or deleting a slot walks those
//! positions explicitly.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::Engine;
use crate::error::SnaprotError;
use crate::source::Source;

impl Engine {
    /// Source snapshots present inside `slot`, in configured order.
    ///
    /// Only destinations of the configured `snapshot` sources are looked at.
    #[must_use]
    pub fn nested_snapshots(&self, slot: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = Vec::new();
        for entry in &self.sources {
            let Ok(Source::Snapshot { dst, .. }) = Source::try_from(entry) else {
                continue;
            };
            let path = slot.join(dst);
            if !found.contains(&path) && self.store.is_valid_snapshot(&path) {
                found.push(path);
            }
        }
        found
    }

    /// Snapshot the slot at `src` onto `dst`, nested source snapshots included.
    ///
    /// `dst` ends up read-only either way.
    pub(crate) fn snapshot_slot(&self, src: &Path, dst: &Path) -> Result<(), SnaprotError> {
        let nested = self.nested_snapshots(src);
        self.ops.snapshot(src, dst)?;
        if nested.is_empty() {
            return Ok(());
        }

        self.ops.set_read_only(dst, false)?;
        for inner in &nested {
            let Ok(relative) = inner.strip_prefix(src) else {
                continue;
            };
            let target = dst.join(relative);
            debug!(src = %inner.display(), dst = %target.display(), "carrying nested snapshot");
            self.ops.remove_dir(&target)?;
            self.ops.snapshot(inner, &target)?;
        }
        self.ops.set_read_only(dst, true)
    }

    /// Delete the slot at `path` after the source snapshots inside it.
    pub(crate) fn delete_slot(&self, path: &Path) -> Result<(), SnaprotError> {
        let nested = self.nested_snapshots(path);
        if !nested.is_empty() {
            self.ops.set_read_only(path, false)?;
            for inner in nested.iter().rev() {
                self.ops.delete_snapshot(inner)?;
            }
        }
        self.ops.delete_snapshot(path)
    }
}
