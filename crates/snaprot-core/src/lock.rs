//! Process-exclusive advisory lock guarding a whole invocation.
//!
//! The lock file holds the pid of the current holder. The kernel drops the
//! `flock` when its holder dies, so a file that still names a pid but can be
//! locked belongs to a crashed run and is reclaimed.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::audit::Intent;
use crate::error::SnaprotError;
use crate::ops::Operator;

/// RAII guard; the lock is released when it drops.
#[derive(Debug)]
pub struct LockGuard {
    /// `None` during a rehearsal, which never holds the lock.
    file: Option<File>,
    path: PathBuf,
}

impl LockGuard {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.set_len(0);
            let _ = FileExt::unlock(&file);
            debug!(path = %self.path.display(), "lock released");
        }
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn held(path: &Path, file: &mut File) -> SnaprotError {
    SnaprotError::LockHeld {
        path: path.to_path_buf(),
        pid: read_pid(file),
    }
}

impl Operator {
    /// Take the invocation lock at `path`.
    ///
    /// A rehearsal only checks that no live process holds the lock and
    /// records the intent; it neither creates nor writes the file.
    ///
    /// # Errors
    ///
    /// [`SnaprotError::LockHeld`] when another process holds the lock, or
    /// [`SnaprotError::Io`] when the lock file cannot be opened or written.
    pub fn lock(&self, path: &Path) -> Result<LockGuard, SnaprotError> {
        let intent = Intent::WriteLock {
            path: path.to_path_buf(),
            pid: std::process::id(),
        };

        if self.is_rehearsal() {
            if let Ok(mut file) = File::open(path) {
                if file.try_lock_exclusive().is_err() {
                    return Err(held(path, &mut file));
                }
                let _ = FileExt::unlock(&file);
            }
            self.admit(intent);
            return Ok(LockGuard {
                file: None,
                path: path.to_path_buf(),
            });
        }

        let open_err = |err| SnaprotError::io(format!("failed to open lock {}", path.display()), err);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(open_err)?;

        if file.try_lock_exclusive().is_err() {
            return Err(held(path, &mut file));
        }
        if let Some(stale) = read_pid(&mut file) {
            warn!(path = %path.display(), pid = stale, "reclaiming lock left by a dead process");
        }

        self.admit(intent);
        let write_err = |err| SnaprotError::io(format!("failed to write lock {}", path.display()), err);
        file.set_len(0).map_err(write_err)?;
        file.seek(SeekFrom::Start(0)).map_err(write_err)?;
        write!(file, "{}", std::process::id()).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        Ok(LockGuard {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }
}
