use anyhow::{Context as _, Result};
use serde::Serialize;
use snaprot_core::{GenerationStatus, RetentionPolicy, Settings};
use std::io::{self, Write};
use std::path::PathBuf;

use super::Invocation;
use crate::output::{self, render};

#[derive(Serialize)]
struct ConfigOutput<'a> {
    config_path: &'a PathBuf,
    settings: &'a Settings,
    retention: RetentionPolicy,
    /// Absent when no root is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    slots: Option<Vec<GenerationStatus>>,
}

/// Execute `snaprot config`: dump the effective settings and, when a root
/// is configured, the occupied slots of every generation.
///
/// # Errors
///
/// Returns an error if the settings cannot be rendered as TOML.
pub fn run_config(inv: &Invocation) -> Result<()> {
    let slots = match inv.engine() {
        Ok(engine) => Some(engine.status()),
        Err(err) => {
            tracing::debug!(%err, "no backup root, skipping slot listing");
            None
        }
    };
    let out = ConfigOutput {
        config_path: &inv.config_path,
        settings: &inv.settings,
        retention: RetentionPolicy::from(&inv.settings.keep),
        slots,
    };

    let toml = if inv.output.is_json() {
        String::new()
    } else {
        toml::to_string_pretty(&inv.settings).context("Failed to render settings")?
    };
    render(inv.output, &out, |out, w| human(out, &toml, w))
}

fn human(out: &ConfigOutput<'_>, toml: &str, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "# {}", out.config_path.display())?;
    write!(w, "{toml}")?;
    writeln!(w)?;

    let Some(slots) = &out.slots else {
        return writeln!(w, "# root not set; no slots to list");
    };
    output::section(w, "slots")?;
    for status in slots {
        let occupied: Vec<String> = status.occupied.iter().map(u32::to_string).collect();
        let mut line = format!("{}/{}", status.occupied.len(), status.retained);
        if !occupied.is_empty() {
            line.push_str(&format!("  [{}]", occupied.join(", ")));
        }
        let overflow = status.overflow();
        if !overflow.is_empty() {
            line.push_str(&format!("  past window: {overflow:?}"));
        }
        output::kv(w, status.generation.name(), line)?;
    }
    Ok(())
}
