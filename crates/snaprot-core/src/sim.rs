//! Simulated substrate for exercising the engine on an ordinary filesystem.
//!
//! [`SimBackend`] emulates snapshots with recursive directory copies and
//! keeps the set of snapshot roots in memory, so a directory created behind
//! its back is "foreign" exactly as it would be on btrfs. It also follows the
//! btrfs rules that matter to slot handling: a snapshot stops at nested
//! snapshot roots and leaves an empty directory in their place, nothing can
//! be created or deleted inside a read-only snapshot, and a snapshot that
//! still contains another one cannot be deleted. [`SimRunner`] emulates local
//! `rsync` mirrors and returns scripted exit codes for everything else.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::backend::SnapshotBackend;
use crate::error::SnaprotError;
use crate::exec::{Captured, CommandRunner, CommandSpec};

#[derive(Debug, Default)]
pub struct SimBackend {
    snapshots: RefCell<BTreeSet<PathBuf>>,
    read_only: RefCell<BTreeSet<PathBuf>>,
    failing: RefCell<BTreeSet<PathBuf>>,
}

impl SimBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation whose target is `path` fail.
    pub fn fail_at(&self, path: impl Into<PathBuf>) {
        self.failing.borrow_mut().insert(path.into());
    }

    /// Snapshot roots currently registered, sorted.
    #[must_use]
    pub fn snapshots(&self) -> Vec<PathBuf> {
        self.snapshots.borrow().iter().cloned().collect()
    }

    fn check_injected(&self, path: &Path) -> Result<(), SnaprotError> {
        if self.failing.borrow().contains(path) {
            return Err(SnaprotError::io(
                format!("injected failure at {}", path.display()),
                io::Error::other("simulated"),
            ));
        }
        Ok(())
    }

    /// Whether `path` has been marked read-only.
    #[must_use]
    pub fn is_read_only(&self, path: &Path) -> bool {
        self.read_only.borrow().contains(path)
    }

    /// Snapshot roots strictly below `root`.
    fn nested_in(&self, root: &Path) -> Vec<PathBuf> {
        self.snapshots
            .borrow()
            .iter()
            .filter(|path| path.as_path() != root && path.starts_with(root))
            .cloned()
            .collect()
    }

    fn check_writable_parent(&self, path: &Path) -> Result<(), SnaprotError> {
        let locked = self
            .read_only
            .borrow()
            .iter()
            .any(|ro| ro.as_path() != path && path.starts_with(ro));
        if locked {
            return Err(SnaprotError::io(
                format!("read-only snapshot above {}", path.display()),
                io::Error::from(io::ErrorKind::ReadOnlyFilesystem),
            ));
        }
        Ok(())
    }

    fn forget_under(&self, root: &Path) {
        self.snapshots
            .borrow_mut()
            .retain(|path| !path.starts_with(root));
        self.read_only
            .borrow_mut()
            .retain(|path| !path.starts_with(root));
    }
}

/// Move every tracked path under `from` to the same place under `to`.
fn reparent(paths: &mut BTreeSet<PathBuf>, from: &Path, to: &Path) {
    let moved: Vec<PathBuf> = paths
        .iter()
        .filter(|path| path.starts_with(from))
        .cloned()
        .collect();
    for old in moved {
        paths.remove(&old);
        if let Ok(rest) = old.strip_prefix(from) {
            paths.insert(to.join(rest));
        }
    }
}

impl SnapshotBackend for SimBackend {
    fn create_snapshot(&self, src: &Path, dst: &Path) -> Result<(), SnaprotError> {
        self.check_injected(dst)?;
        if !src.is_dir() {
            return Err(SnaprotError::io(
                format!("cannot snapshot {}", src.display()),
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        if dst.exists() {
            return Err(SnaprotError::io(
                format!("cannot snapshot into {}", dst.display()),
                io::Error::from(io::ErrorKind::AlreadyExists),
            ));
        }
        self.check_writable_parent(dst)?;
        let nested = self.nested_in(src);
        copy_filtered(src, dst, &|path| nested.iter().any(|inner| inner == path))
            .map_err(|err| SnaprotError::io(format!("copy into {}", dst.display()), err))?;
        self.snapshots.borrow_mut().insert(dst.to_path_buf());
        self.read_only.borrow_mut().insert(dst.to_path_buf());
        Ok(())
    }

    fn delete_snapshot(&self, path: &Path) -> Result<(), SnaprotError> {
        self.check_injected(path)?;
        if !self.is_snapshot(path) {
            return Err(SnaprotError::io(
                format!("not a subvolume: {}", path.display()),
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        }
        if !self.nested_in(path).is_empty() {
            return Err(SnaprotError::io(
                format!("snapshots remain inside {}", path.display()),
                io::Error::from(io::ErrorKind::DirectoryNotEmpty),
            ));
        }
        self.check_writable_parent(path)?;
        fs::remove_dir_all(path)
            .map_err(|err| SnaprotError::io(format!("delete {}", path.display()), err))?;
        self.forget_under(path);
        Ok(())
    }

    fn create_volume(&self, path: &Path) -> Result<(), SnaprotError> {
        self.check_injected(path)?;
        self.check_writable_parent(path)?;
        fs::create_dir(path)
            .map_err(|err| SnaprotError::io(format!("create {}", path.display()), err))
    }

    fn set_read_only(&self, path: &Path, read_only: bool) -> Result<(), SnaprotError> {
        self.check_injected(path)?;
        if !self.is_snapshot(path) {
            return Err(SnaprotError::io(
                format!("not a subvolume: {}", path.display()),
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        }
        let mut flagged = self.read_only.borrow_mut();
        if read_only {
            flagged.insert(path.to_path_buf());
        } else {
            flagged.remove(path);
        }
        Ok(())
    }

    fn is_snapshot(&self, path: &Path) -> bool {
        path.is_dir() && self.snapshots.borrow().contains(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), SnaprotError> {
        self.check_injected(from)?;
        fs::rename(from, to).map_err(|err| {
            SnaprotError::io(
                format!("move {} to {}", from.display(), to.display()),
                err,
            )
        })?;
        reparent(&mut self.snapshots.borrow_mut(), from, to);
        reparent(&mut self.read_only.borrow_mut(), from, to);
        Ok(())
    }
}

/// Runner that mirrors local `rsync` invocations with a plain copy.
///
/// The last two arguments of an `rsync` command are taken as source and
/// destination; the source path is recreated under the destination the way
/// `--relative` does. Remote sources and all other programs only report their
/// scripted exit status (0 unless overridden).
#[derive(Debug, Default)]
pub struct SimRunner {
    exit_codes: BTreeMap<String, i32>,
}

impl SimRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation of `program` exit with `status`.
    #[must_use]
    pub fn failing(mut self, program: impl Into<String>, status: i32) -> Self {
        self.exit_codes.insert(program.into(), status);
        self
    }

    fn mirror(spec: &CommandSpec) -> io::Result<()> {
        let [.., src, dst] = spec.args.as_slice() else {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        };
        if src.contains(':') {
            return Ok(());
        }
        let src = Path::new(src);
        let relative = src.strip_prefix("/").unwrap_or(src);
        let target = Path::new(dst).join(relative);
        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_tree(src, &target)
    }
}

impl CommandRunner for SimRunner {
    fn run(&self, spec: &CommandSpec) -> Result<i32, SnaprotError> {
        if let Some(status) = self.exit_codes.get(&spec.program) {
            return Ok(*status);
        }
        if spec.program == "rsync" {
            Self::mirror(spec).map_err(|err| SnaprotError::io(format!("simulate {spec}"), err))?;
        }
        Ok(0)
    }

    fn capture(&self, spec: &CommandSpec) -> Result<Captured, SnaprotError> {
        Ok(Captured {
            status: self.exit_codes.get(&spec.program).copied().unwrap_or(0),
            stdout: String::new(),
        })
    }
}

/// Recursively copy a directory tree, preserving symlinks.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    copy_filtered(src, dst, &|_| false)
}

/// Like [`copy_tree`], but directories for which `hollow` holds are
/// recreated empty.
fn copy_filtered(src: &Path, dst: &Path, hollow: &dyn Fn(&Path) -> bool) -> io::Result<()> {
    fs::create_dir(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let kind = entry.file_type()?;
        if kind.is_dir() && hollow(&from) {
            fs::create_dir(&to)?;
        } else if kind.is_dir() {
            copy_filtered(&from, &to, hollow)?;
        } else if kind.is_symlink() {
            std::os::unix::fs::symlink(fs::read_link(&from)?, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
