use anyhow::Result;
use clap::Args;
use serde::Serialize;
use snaprot_core::{AuditEntry, SlotId};
use std::io::{self, Write};

use super::Invocation;
use crate::output::{self, render};

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Slot to delete, e.g. `daily.2`.
    pub slot: SlotId,
}

#[derive(Serialize)]
struct RemoveOutput {
    slot: SlotId,
    removed: bool,
    rehearsal: bool,
    audit: Vec<AuditEntry>,
}

/// Execute `snaprot remove <generation.index>`.
///
/// A missing slot is reported, not treated as an error.
///
/// # Errors
///
/// Returns an error when the root is unset, the lock is held, or the slot
/// is not a genuine snapshot.
pub fn run_remove(args: &RemoveArgs, inv: &Invocation) -> Result<()> {
    let engine = inv.engine()?;
    let _lock = engine.ops().lock(&inv.settings.lock_path)?;
    let removed = engine.remove(args.slot)?;

    let out = RemoveOutput {
        slot: args.slot,
        removed,
        rehearsal: engine.ops().is_rehearsal(),
        audit: engine.ops().audit().entries(),
    };
    render(inv.output, &out, human)
}

fn human(out: &RemoveOutput, w: &mut dyn Write) -> io::Result<()> {
    match (out.removed, out.rehearsal) {
        (false, _) => writeln!(w, "{} does not exist; nothing removed", out.slot),
        (true, true) => {
            writeln!(w, "would remove {}", out.slot)?;
            output::audit_lines(w, &out.audit)
        }
        (true, false) => writeln!(w, "removed {}", out.slot),
    }
}
