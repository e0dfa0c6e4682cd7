use anyhow::Result;
use serde::Serialize;
use snaprot_core::{AuditEntry, CreationReport};
use std::io::{self, Write};

use super::Invocation;
use crate::output::{self, render};

#[derive(Serialize)]
struct InitOutput {
    rehearsal: bool,
    #[serde(flatten)]
    created: CreationReport,
    audit: Vec<AuditEntry>,
}

/// Execute `snaprot init`: create the root and a fresh `hourly.0`, then
/// populate it from every configured source.
///
/// # Errors
///
/// Returns an error when the root or sources are missing, the lock is held,
/// or `hourly.0` already exists.
pub fn run_init(inv: &Invocation) -> Result<()> {
    let engine = inv.engine()?;
    let _lock = engine.ops().lock(&inv.settings.lock_path)?;
    let created = engine.init()?;

    let out = InitOutput {
        rehearsal: engine.ops().is_rehearsal(),
        created,
        audit: engine.ops().audit().entries(),
    };
    render(inv.output, &out, human)
}

fn human(out: &InitOutput, w: &mut dyn Write) -> io::Result<()> {
    let title = if out.rehearsal { "init (dry run)" } else { "init" };
    output::section(w, title)?;
    output::kv(w, "slot", out.created.slot.to_string())?;
    for dst in &out.created.materialized {
        output::kv(w, "source", dst)?;
    }
    for warning in &out.created.warnings {
        output::kv(w, "warning", warning)?;
    }
    if !out.audit.is_empty() {
        writeln!(w)?;
        writeln!(w, "operations:")?;
        output::audit_lines(w, &out.audit)?;
    }
    Ok(())
}
