//! Audit log of every mutating operation an invocation performs or, during a
//! rehearsal, would perform.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::exec::CommandSpec;

/// One mutation against the backup root or the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Intent {
    Snapshot { src: PathBuf, dst: PathBuf },
    DeleteSnapshot { path: PathBuf },
    CreateVolume { path: PathBuf },
    CreateDir { path: PathBuf },
    RemoveDir { path: PathBuf },
    SetReadOnly { path: PathBuf, read_only: bool },
    Rename { from: PathBuf, to: PathBuf },
    Run { command: CommandSpec },
    WriteLock { path: PathBuf, pid: u32 },
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot { src, dst } => {
                write!(f, "snapshot {} -> {}", src.display(), dst.display())
            }
            Self::DeleteSnapshot { path } => write!(f, "delete {}", path.display()),
            Self::CreateVolume { path } => write!(f, "create volume {}", path.display()),
            Self::CreateDir { path } => write!(f, "mkdir {}", path.display()),
            Self::RemoveDir { path } => write!(f, "rmdir {}", path.display()),
            Self::SetReadOnly { path, read_only: true } => {
                write!(f, "mark {} read-only", path.display())
            }
            Self::SetReadOnly { path, read_only: false } => {
                write!(f, "mark {} writable", path.display())
            }
            Self::Rename { from, to } => write!(f, "move {} -> {}", from.display(), to.display()),
            Self::Run { command } => match &command.cwd {
                Some(cwd) => write!(f, "run {command} (in {})", cwd.display()),
                None => write!(f, "run {command}"),
            },
            Self::WriteLock { path, pid } => write!(f, "lock {} (pid {pid})", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    /// True when the intent was recorded but not executed.
    pub rehearsal: bool,
    #[serde(flatten)]
    pub intent: Intent,
}

/// Append-only, in-process record of intents.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RefCell<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn record(&self, intent: Intent, rehearsal: bool) {
        self.entries.borrow_mut().push(AuditEntry {
            at: Utc::now(),
            rehearsal,
            intent,
        });
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.borrow().clone()
    }

    /// Recorded intents without timestamps, in order.
    #[must_use]
    pub fn intents(&self) -> Vec<Intent> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.intent.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_recording_order() {
        let log = AuditLog::default();
        log.record(
            Intent::CreateDir {
                path: PathBuf::from("/b/hourly.0"),
            },
            true,
        );
        log.record(
            Intent::DeleteSnapshot {
                path: PathBuf::from("/b/hourly.24"),
            },
            true,
        );

        assert_eq!(log.len(), 2);
        let intents = log.intents();
        assert!(matches!(intents[0], Intent::CreateDir { .. }));
        assert!(matches!(intents[1], Intent::DeleteSnapshot { .. }));
        assert!(log.entries().iter().all(|e| e.rehearsal));
    }

    #[test]
    fn intents_render_for_operators() {
        let rename = Intent::Rename {
            from: PathBuf::from("/b/daily.1"),
            to: PathBuf::from("/b/daily.2"),
        };
        assert_eq!(rename.to_string(), "move /b/daily.1 -> /b/daily.2");

        let unlock = Intent::SetReadOnly {
            path: PathBuf::from("/b/hourly.1"),
            read_only: false,
        };
        assert_eq!(unlock.to_string(), "mark /b/hourly.1 writable");

        let run = Intent::Run {
            command: CommandSpec::new("pg_dumpall")
                .args(["-f", "all.sql"])
                .current_dir(std::path::Path::new("/b/hourly.0/db")),
        };
        assert_eq!(
            run.to_string(),
            "run pg_dumpall -f all.sql (in /b/hourly.0/db)"
        );
    }

    #[test]
    fn entries_serialize_with_an_op_tag() {
        let log = AuditLog::default();
        log.record(
            Intent::Snapshot {
                src: PathBuf::from("/home"),
                dst: PathBuf::from("/b/hourly.0/home"),
            },
            false,
        );
        let value = serde_json::to_value(&log.entries()[0]).expect("serialize");
        assert_eq!(value["op"], "snapshot");
        assert_eq!(value["rehearsal"], false);
        assert_eq!(value["dst"], "/b/hourly.0/home");
    }
}
