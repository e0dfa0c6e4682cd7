use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backend::SnapshotBackend;
use crate::generation::{Generation, SlotId};

/// Maps slots to paths under the backup root and answers state queries.
///
/// Nothing else builds slot paths, so the on-disk naming scheme lives here
/// alone.
pub struct SlotStore {
    root: PathBuf,
    backend: Rc<dyn SnapshotBackend>,
}

impl SlotStore {
    pub fn new(root: impl Into<PathBuf>, backend: Rc<dyn SnapshotBackend>) -> Self {
        Self {
            root: root.into(),
            backend,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_of(&self, slot: SlotId) -> PathBuf {
        self.root.join(slot.dir_name())
    }

    /// True when anything, valid or not, occupies the slot's path.
    #[must_use]
    pub fn exists(&self, slot: SlotId) -> bool {
        self.path_of(slot).symlink_metadata().is_ok()
    }

    /// True only for a genuine snapshot; an existing path that fails this is
    /// corrupted, not absent.
    #[must_use]
    pub fn is_valid_snapshot(&self, path: &Path) -> bool {
        self.backend.is_snapshot(path)
    }

    /// Occupied indices of `generation`, ascending.
    #[must_use]
    pub fn occupied(&self, generation: Generation) -> Vec<u32> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut indices: Vec<u32> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse::<SlotId>().ok())
            .filter(|slot| slot.generation == generation)
            .map(|slot| slot.index)
            .collect();
        indices.sort_unstable();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBackend;
    use tempfile::TempDir;

    fn store(root: &Path) -> SlotStore {
        SlotStore::new(root, Rc::new(SimBackend::new()))
    }

    #[test]
    fn paths_follow_generation_dot_index() {
        let store = store(Path::new("/backup"));
        assert_eq!(
            store.path_of(SlotId::new(Generation::Weekly, 4)),
            PathBuf::from("/backup/weekly.4")
        );
    }

    #[test]
    fn occupied_lists_only_the_requested_generation() {
        let tmp = TempDir::new().expect("tempdir");
        for name in ["daily.2", "daily.0", "daily.10", "hourly.1", "daily.x", "daily.07", "notes"] {
            fs::create_dir(tmp.path().join(name)).expect("mkdir");
        }
        let store = store(tmp.path());
        assert_eq!(store.occupied(Generation::Daily), vec![0, 2, 10]);
        assert_eq!(store.occupied(Generation::Hourly), vec![1]);
        assert!(store.occupied(Generation::Yearly).is_empty());
    }

    #[test]
    fn every_occupied_index_maps_back_to_its_directory() {
        let tmp = TempDir::new().expect("tempdir");
        for name in ["weekly.3", "weekly.03", "weekly.003"] {
            fs::create_dir(tmp.path().join(name)).expect("mkdir");
        }
        let store = store(tmp.path());
        let occupied = store.occupied(Generation::Weekly);
        assert_eq!(occupied, vec![3]);
        assert!(occupied
            .iter()
            .all(|index| store.exists(SlotId::new(Generation::Weekly, *index))));
    }

    #[test]
    fn missing_root_has_no_slots() {
        let store = store(Path::new("/nonexistent/snaprot-root"));
        assert!(store.occupied(Generation::Hourly).is_empty());
        assert!(!store.exists(SlotId::newest(Generation::Hourly)));
    }

    #[test]
    fn foreign_directory_exists_but_is_not_valid() {
        let tmp = TempDir::new().expect("tempdir");
        let slot = SlotId::new(Generation::Monthly, 1);
        let store = store(tmp.path());
        fs::create_dir(store.path_of(slot)).expect("mkdir");
        assert!(store.exists(slot));
        assert!(!store.is_valid_snapshot(&store.path_of(slot)));
    }
}
