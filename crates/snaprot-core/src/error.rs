use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::generation::Generation;

/// Machine-readable error codes for scripted callers and log scraping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    RootUnset,
    NoSources,
    ConfigParseError,
    InvalidSlotName,
    InvalidGeneration,
    InvalidSource,
    SlotExists,
    CorruptSnapshot,
    NoPredecessor,
    CommandFailed,
    LockContention,
    IoFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::RootUnset => "E1001",
            Self::NoSources => "E1002",
            Self::ConfigParseError => "E1003",
            Self::InvalidSlotName => "E2001",
            Self::InvalidGeneration => "E2002",
            Self::InvalidSource => "E2003",
            Self::SlotExists => "E3001",
            Self::CorruptSnapshot => "E3002",
            Self::NoPredecessor => "E3003",
            Self::CommandFailed => "E4001",
            Self::LockContention => "E5001",
            Self::IoFailure => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::RootUnset => Some("Set `root` in the snaprot config file."),
            Self::NoSources => Some("Add at least one [[source]] table to the config file."),
            Self::ConfigParseError => Some("Fix syntax in the config file and retry."),
            Self::InvalidSlotName => Some("Slots are named <generation>.<index>, e.g. daily.2."),
            Self::InvalidGeneration => {
                Some("Use one of: hourly, daily, weekly, monthly, yearly.")
            }
            Self::InvalidSource => {
                Some("Use protocol snapshot, local-copy, remote-copy or script.")
            }
            Self::SlotExists => {
                Some("Inspect the backup root; a previous run may have been interrupted.")
            }
            Self::CorruptSnapshot => Some(
                "Inspect the directory by hand; snaprot refuses to delete or move it.",
            ),
            Self::NoPredecessor => Some("Run the finer generation (e.g. `snaprot hourly`) first."),
            Self::CommandFailed => None,
            Self::LockContention => Some("Retry after the other snaprot process exits."),
            Self::IoFailure => Some("Check disk space and permissions on the backup root."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the rotation engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SnaprotError {
    #[error("backup root is not set")]
    RootUnset,

    #[error("source list is empty")]
    NoSources,

    #[error("invalid slot name `{0}`")]
    InvalidSlot(String),

    #[error("unknown generation `{0}`")]
    InvalidGeneration(String),

    #[error("invalid source entry ({protocol} -> {dst}): {reason}")]
    InvalidSource {
        protocol: String,
        dst: String,
        reason: String,
    },

    #[error("target already exists: {}", .path.display())]
    SlotExists { path: PathBuf },

    #[error("not a genuine snapshot, refusing to touch it: {}", .path.display())]
    Corrupted { path: PathBuf },

    #[error("cannot create {generation}.0: no {predecessor} slot exists")]
    NoPredecessor {
        generation: Generation,
        predecessor: Generation,
    },

    #[error("`{command}` exited with status {status}")]
    CommandFailed { command: String, status: i32 },

    #[error("lock {} is held by running process {}", .path.display(), .pid.map_or_else(|| "<unknown>".to_string(), |p| p.to_string()))]
    LockHeld { path: PathBuf, pid: Option<u32> },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl SnaprotError {
    /// Wrap an I/O error with the operation that produced it.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RootUnset => ErrorCode::RootUnset,
            Self::NoSources => ErrorCode::NoSources,
            Self::InvalidSlot(_) => ErrorCode::InvalidSlotName,
            Self::InvalidGeneration(_) => ErrorCode::InvalidGeneration,
            Self::InvalidSource { .. } => ErrorCode::InvalidSource,
            Self::SlotExists { .. } => ErrorCode::SlotExists,
            Self::Corrupted { .. } => ErrorCode::CorruptSnapshot,
            Self::NoPredecessor { .. } => ErrorCode::NoPredecessor,
            Self::CommandFailed { .. } => ErrorCode::CommandFailed,
            Self::LockHeld { .. } => ErrorCode::LockContention,
            Self::Io { .. } => ErrorCode::IoFailure,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether this error aborts the whole invocation.
    ///
    /// Per-source failures and failed external commands are reported and
    /// the cycle carries on; everything else unwinds.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::CommandFailed { .. } | Self::InvalidSource { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, SnaprotError};
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::RootUnset,
            ErrorCode::NoSources,
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidSlotName,
            ErrorCode::InvalidGeneration,
            ErrorCode::InvalidSource,
            ErrorCode::SlotExists,
            ErrorCode::CorruptSnapshot,
            ErrorCode::NoPredecessor,
            ErrorCode::CommandFailed,
            ErrorCode::LockContention,
            ErrorCode::IoFailure,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::CorruptSnapshot.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn source_failures_are_not_fatal() {
        let failed = SnaprotError::CommandFailed {
            command: "rsync".into(),
            status: 23,
        };
        assert!(!failed.is_fatal());

        let corrupt = SnaprotError::Corrupted {
            path: PathBuf::from("/backup/daily.3"),
        };
        assert!(corrupt.is_fatal());
        assert_eq!(corrupt.code(), ErrorCode::CorruptSnapshot);
        assert!(corrupt.hint().is_some());
    }

    #[test]
    fn lock_held_names_the_holder() {
        let err = SnaprotError::LockHeld {
            path: PathBuf::from("/run/lock/snaprot.lock"),
            pid: Some(4242),
        };
        assert!(err.to_string().contains("4242"));

        let unknown = SnaprotError::LockHeld {
            path: PathBuf::from("/run/lock/snaprot.lock"),
            pid: None,
        };
        assert!(unknown.to_string().contains("<unknown>"));
    }
}
