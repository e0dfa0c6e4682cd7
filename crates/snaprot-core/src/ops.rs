//! The single gate every mutation passes through.
//!
//! Each method records its [`Intent`] in the audit log. In
//! [`Mode::Rehearsal`] it stops there and reports success; in
//! [`Mode::Live`] it checks the target for collisions and then delegates to
//! the backend, the command runner or `std::fs`. Queries are never gated.

use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use tracing::info;

use crate::audit::{AuditLog, Intent};
use crate::backend::SnapshotBackend;
use crate::error::SnaprotError;
use crate::exec::{CommandRunner, CommandSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Live,
    /// Evaluate and log every decision without mutating anything.
    Rehearsal,
}

pub struct Operator {
    backend: Rc<dyn SnapshotBackend>,
    runner: Box<dyn CommandRunner>,
    mode: Mode,
    audit: AuditLog,
}

impl Operator {
    pub fn new(
        backend: Rc<dyn SnapshotBackend>,
        runner: Box<dyn CommandRunner>,
        mode: Mode,
    ) -> Self {
        Self {
            backend,
            runner,
            mode,
            audit: AuditLog::default(),
        }
    }

    #[must_use]
    pub fn is_rehearsal(&self) -> bool {
        self.mode == Mode::Rehearsal
    }

    #[must_use]
    pub const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    #[must_use]
    pub fn backend(&self) -> &dyn SnapshotBackend {
        self.backend.as_ref()
    }

    /// Record `intent`; returns `true` when the caller should carry it out.
    pub(crate) fn admit(&self, intent: Intent) -> bool {
        let rehearsal = self.is_rehearsal();
        if rehearsal {
            info!(intent = %intent, "dry-run: would perform");
        } else {
            info!(intent = %intent, "performing");
        }
        self.audit.record(intent, rehearsal);
        !rehearsal
    }

    fn refuse_existing(path: &Path) -> Result<(), SnaprotError> {
        if path.symlink_metadata().is_ok() {
            return Err(SnaprotError::SlotExists {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Read-only snapshot of `src` at `dst`; `dst` must not exist.
    pub fn snapshot(&self, src: &Path, dst: &Path) -> Result<(), SnaprotError> {
        let intent = Intent::Snapshot {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        };
        if !self.admit(intent) {
            return Ok(());
        }
        Self::refuse_existing(dst)?;
        self.backend.create_snapshot(src, dst)
    }

    pub fn delete_snapshot(&self, path: &Path) -> Result<(), SnaprotError> {
        if !self.admit(Intent::DeleteSnapshot {
            path: path.to_path_buf(),
        }) {
            return Ok(());
        }
        self.backend.delete_snapshot(path)
    }

    /// New writable volume at `path`; `path` must not exist.
    pub fn create_volume(&self, path: &Path) -> Result<(), SnaprotError> {
        if !self.admit(Intent::CreateVolume {
            path: path.to_path_buf(),
        }) {
            return Ok(());
        }
        Self::refuse_existing(path)?;
        self.backend.create_volume(path)
    }

    /// `mkdir -p`; recorded only when the directory is missing.
    pub fn create_dir_all(&self, path: &Path) -> Result<(), SnaprotError> {
        if path.is_dir() {
            return Ok(());
        }
        if !self.admit(Intent::CreateDir {
            path: path.to_path_buf(),
        }) {
            return Ok(());
        }
        fs::create_dir_all(path)
            .map_err(|err| SnaprotError::io(format!("failed to create {}", path.display()), err))
    }

    /// `rmdir` of an empty directory; a missing one is not an error.
    pub fn remove_dir(&self, path: &Path) -> Result<(), SnaprotError> {
        if !self.admit(Intent::RemoveDir {
            path: path.to_path_buf(),
        }) {
            return Ok(());
        }
        match fs::remove_dir(path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(SnaprotError::io(
                format!("failed to remove {}", path.display()),
                err,
            )),
            _ => Ok(()),
        }
    }

    pub fn set_read_only(&self, path: &Path, read_only: bool) -> Result<(), SnaprotError> {
        if !self.admit(Intent::SetReadOnly {
            path: path.to_path_buf(),
            read_only,
        }) {
            return Ok(());
        }
        self.backend.set_read_only(path, read_only)
    }

    /// Atomic rename; refuses to replace an existing `to`.
    pub fn rename(&self, from: &Path, to: &Path) -> Result<(), SnaprotError> {
        if !self.admit(Intent::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }) {
            return Ok(());
        }
        Self::refuse_existing(to)?;
        self.backend.rename(from, to)
    }

    /// Run an external command; a non-zero exit becomes
    /// [`SnaprotError::CommandFailed`].
    pub fn run(&self, spec: &CommandSpec) -> Result<(), SnaprotError> {
        if !self.admit(Intent::Run {
            command: spec.clone(),
        }) {
            return Ok(());
        }
        let status = self.runner.run(spec)?;
        if status == 0 {
            Ok(())
        } else {
            Err(SnaprotError::CommandFailed {
                command: spec.to_string(),
                status,
            })
        }
    }
}
