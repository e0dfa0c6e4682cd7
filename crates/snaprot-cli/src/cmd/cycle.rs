use anyhow::Result;
use serde::Serialize;
use snaprot_core::{AuditEntry, CycleReport, Generation, MoveKind};
use std::io::{self, Write};

use super::Invocation;
use crate::output::{self, render};

#[derive(Serialize)]
struct CycleOutput {
    #[serde(flatten)]
    report: CycleReport,
    audit: Vec<AuditEntry>,
}

/// Execute `snaprot <generation>`: one prune, rotate, prune, create cycle
/// under the invocation lock.
///
/// # Errors
///
/// Returns an error when the root is unset, the lock is held, or the cycle
/// hits a fatal condition.
pub fn run_cycle(generation: Generation, inv: &Invocation) -> Result<()> {
    let engine = inv.engine()?;
    let _lock = engine.ops().lock(&inv.settings.lock_path)?;
    let report = engine.run_cycle(generation)?;

    let out = CycleOutput {
        report,
        audit: engine.ops().audit().entries(),
    };
    render(inv.output, &out, human)
}

fn human(out: &CycleOutput, w: &mut dyn Write) -> io::Result<()> {
    let report = &out.report;
    let title = if report.rehearsal {
        format!("{} cycle (dry run)", report.generation)
    } else {
        format!("{} cycle", report.generation)
    };
    output::section(w, &title)?;

    for slot in &report.pre_pruned {
        output::kv(w, "leftover", format!("{slot} pruned"))?;
    }
    for step in &report.moves {
        let how = match step.kind {
            MoveKind::Rename => "moved",
            MoveKind::Snapshot => "copied",
        };
        output::kv(w, how, format!("{} -> {}", step.from, step.to))?;
    }
    for slot in &report.post_pruned {
        output::kv(w, "pruned", slot.to_string())?;
    }
    match report.created.promoted_from {
        Some(from) => output::kv(w, "created", format!("{} from {from}", report.created.slot))?,
        None => output::kv(w, "created", report.created.slot.to_string())?,
    }
    for warning in &report.warnings {
        output::kv(w, "warning", warning)?;
    }

    if !out.audit.is_empty() {
        writeln!(w)?;
        writeln!(w, "operations:")?;
        output::audit_lines(w, &out.audit)?;
    }
    Ok(())
}
