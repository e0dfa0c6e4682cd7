//! Fan-out targets that populate `hourly.0`.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;
use crate::error::SnaprotError;
use crate::exec::CommandSpec;
use crate::ops::Operator;

/// A source entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub protocol: String,
    pub src: String,
    pub dst: String,
    /// Arguments for `script` sources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// One validated copy strategy and the sub-path of `hourly.0` it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Read-only snapshot of a local subvolume.
    Snapshot { src: PathBuf, dst: PathBuf },
    /// rsync mirror of a local tree.
    LocalCopy { src: PathBuf, dst: PathBuf },
    /// rsync mirror of `host:path` over non-interactive ssh.
    RemoteCopy { src: String, dst: PathBuf },
    /// Arbitrary program run inside the destination directory.
    Script {
        program: String,
        args: Vec<String>,
        dst: PathBuf,
    },
}

impl TryFrom<&SourceEntry> for Source {
    type Error = SnaprotError;

    fn try_from(entry: &SourceEntry) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| SnaprotError::InvalidSource {
            protocol: entry.protocol.clone(),
            dst: entry.dst.clone(),
            reason: reason.to_string(),
        };

        let dst = PathBuf::from(&entry.dst);
        let contained = !dst.as_os_str().is_empty()
            && dst.components().all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(invalid("dst must be a relative path inside the slot"));
        }
        if entry.src.is_empty() {
            return Err(invalid("src is empty"));
        }

        match entry.protocol.as_str() {
            "snapshot" => Ok(Self::Snapshot {
                src: PathBuf::from(&entry.src),
                dst,
            }),
            "local-copy" => Ok(Self::LocalCopy {
                src: PathBuf::from(&entry.src),
                dst,
            }),
            "remote-copy" => {
                if !entry.src.contains(':') {
                    return Err(invalid("remote src must look like host:path"));
                }
                Ok(Self::RemoteCopy {
                    src: entry.src.clone(),
                    dst,
                })
            }
            "script" => Ok(Self::Script {
                program: entry.src.clone(),
                args: entry.args.clone(),
                dst,
            }),
            _ => Err(invalid("unknown protocol")),
        }
    }
}

impl Source {
    #[must_use]
    pub const fn protocol(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::LocalCopy { .. } => "local-copy",
            Self::RemoteCopy { .. } => "remote-copy",
            Self::Script { .. } => "script",
        }
    }

    #[must_use]
    pub fn dst(&self) -> &Path {
        match self {
            Self::Snapshot { dst, .. }
            | Self::LocalCopy { dst, .. }
            | Self::RemoteCopy { dst, .. }
            | Self::Script { dst, .. } => dst,
        }
    }

    /// Populate `slot/dst` from this source.
    pub fn materialize(
        &self,
        slot: &Path,
        ops: &Operator,
        transport: &TransportConfig,
    ) -> Result<(), SnaprotError> {
        let target = slot.join(self.dst());
        match self {
            Self::Snapshot { src, .. } => {
                if target.symlink_metadata().is_ok() {
                    if !ops.backend().is_snapshot(&target) {
                        return Err(SnaprotError::SlotExists { path: target });
                    }
                    ops.delete_snapshot(&target)?;
                }
                if let Some(parent) = target.parent() {
                    ops.create_dir_all(parent)?;
                }
                ops.snapshot(src, &target)
            }
            Self::LocalCopy { src, .. } => {
                ops.create_dir_all(&target)?;
                ops.run(&mirror_command(transport, None).path_arg(src).path_arg(&target))
            }
            Self::RemoteCopy { src, .. } => {
                ops.create_dir_all(&target)?;
                ops.run(
                    &mirror_command(transport, Some(ssh_command(transport)))
                        .arg(src.clone())
                        .path_arg(&target),
                )
            }
            Self::Script { program, args, .. } => {
                ops.create_dir_all(&target)?;
                ops.run(
                    &CommandSpec::new(program.clone())
                        .args(args.iter().cloned())
                        .current_dir(&target),
                )
            }
        }
    }
}

/// `rsync -a --delete --relative [-e <ssh>] <mirror args>`; caller appends
/// source and destination.
fn mirror_command(transport: &TransportConfig, ssh: Option<String>) -> CommandSpec {
    let mut spec = CommandSpec::new("rsync").args(["-a", "--delete", "--relative"]);
    if let Some(ssh) = ssh {
        spec = spec.arg("-e").arg(ssh);
    }
    spec.args(transport.mirror_args.iter().cloned())
}

fn ssh_command(transport: &TransportConfig) -> String {
    let mut ssh = String::from("ssh -o BatchMode=yes");
    for arg in &transport.ssh_args {
        ssh.push(' ');
        ssh.push_str(arg);
    }
    ssh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Intent;
    use crate::ops::Mode;
    use crate::sim::{SimBackend, SimRunner};
    use std::rc::Rc;

    fn entry(protocol: &str, src: &str, dst: &str) -> SourceEntry {
        SourceEntry {
            protocol: protocol.into(),
            src: src.into(),
            dst: dst.into(),
            args: Vec::new(),
        }
    }

    fn rehearsal() -> Operator {
        Operator::new(
            Rc::new(SimBackend::new()),
            Box::new(SimRunner::new()),
            Mode::Rehearsal,
        )
    }

    fn ran(ops: &Operator) -> Vec<CommandSpec> {
        ops.audit()
            .intents()
            .into_iter()
            .filter_map(|intent| match intent {
                Intent::Run { command } => Some(command),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn entries_convert_by_protocol() {
        let snapshot = Source::try_from(&entry("snapshot", "/home", "home")).expect("valid");
        assert_eq!(snapshot.protocol(), "snapshot");
        assert_eq!(snapshot.dst(), Path::new("home"));

        let remote = Source::try_from(&entry("remote-copy", "web1:/etc", "web1/etc")).expect("valid");
        assert!(matches!(remote, Source::RemoteCopy { .. }));
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let err = Source::try_from(&entry("ftp", "/srv", "srv")).unwrap_err();
        assert!(matches!(err, SnaprotError::InvalidSource { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn destinations_must_stay_inside_the_slot() {
        for dst in ["", "/etc", "../escape", "a/../../b", "./home"] {
            assert!(
                Source::try_from(&entry("local-copy", "/etc", dst)).is_err(),
                "{dst:?} should be rejected"
            );
        }
    }

    #[test]
    fn remote_copy_tunnels_over_batch_ssh() {
        let ops = rehearsal();
        let transport = TransportConfig {
            mirror_args: vec!["--exclude".into(), "*.tmp".into()],
            ssh_args: vec!["-i".into(), "/root/.ssh/backup".into()],
        };
        let source = Source::try_from(&entry("remote-copy", "web1:/etc", "web1")).expect("valid");
        source
            .materialize(Path::new("/b/hourly.0"), &ops, &transport)
            .expect("rehearsed");

        let commands = ran(&ops);
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].args,
            [
                "-a",
                "--delete",
                "--relative",
                "-e",
                "ssh -o BatchMode=yes -i /root/.ssh/backup",
                "--exclude",
                "*.tmp",
                "web1:/etc",
                "/b/hourly.0/web1",
            ]
        );
    }

    #[test]
    fn script_runs_inside_its_destination() {
        let ops = rehearsal();
        let source = Source::try_from(&SourceEntry {
            args: vec!["-f".into(), "all.sql".into()],
            ..entry("script", "pg_dumpall", "db")
        })
        .expect("valid");
        source
            .materialize(Path::new("/b/hourly.0"), &ops, &TransportConfig::default())
            .expect("rehearsed");

        let intents = ops.audit().intents();
        assert_eq!(
            intents[0],
            Intent::CreateDir {
                path: PathBuf::from("/b/hourly.0/db")
            }
        );
        let commands = ran(&ops);
        assert_eq!(commands[0].program, "pg_dumpall");
        assert_eq!(commands[0].cwd.as_deref(), Some(Path::new("/b/hourly.0/db")));
    }
}
