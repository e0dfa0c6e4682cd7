//! Structured external command execution.
//!
//! Commands are built as a program plus an argument vector and never pass
//! through a shell. The [`Operator`](crate::ops::Operator) inspects the
//! structured value to record it in the audit log and to suppress it during a
//! rehearsal.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::debug;

use crate::error::SnaprotError;

/// A program invocation: program, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Output of a command whose stdout the caller needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub status: i32,
    pub stdout: String,
}

/// Runs external programs.
pub trait CommandRunner {
    /// Run to completion with inherited stdio and return the exit status.
    ///
    /// A process killed by a signal reports `-1`.
    fn run(&self, spec: &CommandSpec) -> Result<i32, SnaprotError>;

    /// Run to completion capturing stdout; used for read-only queries.
    fn capture(&self, spec: &CommandSpec) -> Result<Captured, SnaprotError>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<i32, SnaprotError> {
        debug!(command = %spec, "spawning");
        let status = Self::command(spec)
            .stdin(Stdio::null())
            .status()
            .map_err(|err| SnaprotError::io(format!("failed to spawn {}", spec.program), err))?;
        Ok(status.code().unwrap_or(-1))
    }

    fn capture(&self, spec: &CommandSpec) -> Result<Captured, SnaprotError> {
        debug!(command = %spec, "querying");
        let output = Self::command(spec)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| SnaprotError::io(format!("failed to spawn {}", spec.program), err))?;
        Ok(Captured {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
