//! Snapshot capability of the storage substrate.

use std::fs;
use std::os::unix::fs::MetadataExt as _;
use std::path::Path;

use tracing::debug;

use crate::error::SnaprotError;
use crate::exec::{CommandRunner, CommandSpec, SystemRunner};

/// Point-in-time clone primitives.
///
/// Implementations perform the operation unconditionally; rehearsal and
/// collision checks live in [`Operator`](crate::ops::Operator).
pub trait SnapshotBackend {
    /// Create a read-only snapshot of `src` at `dst`.
    fn create_snapshot(&self, src: &Path, dst: &Path) -> Result<(), SnaprotError>;

    /// Delete the snapshot rooted at `path`.
    fn delete_snapshot(&self, path: &Path) -> Result<(), SnaprotError>;

    /// Create an empty writable volume at `path` that can later be snapshotted.
    fn create_volume(&self, path: &Path) -> Result<(), SnaprotError>;

    /// Toggle the read-only flag of the snapshot rooted at `path`.
    fn set_read_only(&self, path: &Path, read_only: bool) -> Result<(), SnaprotError>;

    /// True only when `path` is a snapshot/subvolume root on the snapshot
    /// filesystem.
    fn is_snapshot(&self, path: &Path) -> bool;

    /// Atomically rename a snapshot or volume.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), SnaprotError> {
        fs::rename(from, to).map_err(|err| {
            SnaprotError::io(
                format!("failed to move {} to {}", from.display(), to.display()),
                err,
            )
        })
    }
}

/// Inode number of every btrfs subvolume root.
const BTRFS_SUBVOLUME_INODE: u64 = 256;

/// btrfs backend driving the `btrfs` tool.
#[derive(Debug, Clone, Default)]
pub struct Btrfs<R = SystemRunner> {
    runner: R,
}

impl<R: CommandRunner> Btrfs<R> {
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    fn subvolume(&self, spec: CommandSpec) -> Result<(), SnaprotError> {
        let command = spec.to_string();
        let status = self.runner.run(&spec)?;
        if status == 0 {
            Ok(())
        } else {
            Err(SnaprotError::CommandFailed { command, status })
        }
    }

    fn filesystem_type(&self, path: &Path) -> Option<String> {
        let spec = CommandSpec::new("stat")
            .args(["--file-system", "--format=%T"])
            .path_arg(path);
        match self.runner.capture(&spec) {
            Ok(captured) if captured.status == 0 => Some(captured.stdout.trim().to_string()),
            Ok(captured) => {
                debug!(path = %path.display(), status = captured.status, "stat failed");
                None
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "stat could not run");
                None
            }
        }
    }
}

impl<R: CommandRunner> SnapshotBackend for Btrfs<R> {
    fn create_snapshot(&self, src: &Path, dst: &Path) -> Result<(), SnaprotError> {
        self.subvolume(
            CommandSpec::new("btrfs")
                .args(["subvolume", "snapshot", "-r"])
                .path_arg(src)
                .path_arg(dst),
        )
    }

    fn delete_snapshot(&self, path: &Path) -> Result<(), SnaprotError> {
        self.subvolume(
            CommandSpec::new("btrfs")
                .args(["subvolume", "delete"])
                .path_arg(path),
        )
    }

    fn create_volume(&self, path: &Path) -> Result<(), SnaprotError> {
        self.subvolume(
            CommandSpec::new("btrfs")
                .args(["subvolume", "create"])
                .path_arg(path),
        )
    }

    fn set_read_only(&self, path: &Path, read_only: bool) -> Result<(), SnaprotError> {
        self.subvolume(
            CommandSpec::new("btrfs")
                .args(["property", "set", "-ts"])
                .path_arg(path)
                .args(["ro", if read_only { "true" } else { "false" }]),
        )
    }

    fn is_snapshot(&self, path: &Path) -> bool {
        let Ok(meta) = fs::symlink_metadata(path) else {
            return false;
        };
        if !meta.is_dir() || meta.ino() != BTRFS_SUBVOLUME_INODE {
            debug!(path = %path.display(), inode = meta.ino(), "not a subvolume root");
            return false;
        }
        self.filesystem_type(path).as_deref() == Some("btrfs")
    }
}
