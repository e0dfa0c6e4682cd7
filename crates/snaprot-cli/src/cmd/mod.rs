pub mod completions;
pub mod config;
pub mod cycle;
pub mod init;
pub mod remove;

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use snaprot_core::{Btrfs, Engine, Mode, Settings, SystemRunner};

use crate::output::OutputMode;

/// Everything a command handler needs from the global flags and config file.
pub struct Invocation {
    pub config_path: PathBuf,
    pub settings: Settings,
    pub mode: Mode,
    pub output: OutputMode,
}

impl Invocation {
    /// Engine over the real btrfs backend and process runner.
    pub fn engine(&self) -> Result<Engine> {
        Ok(Engine::from_settings(
            &self.settings,
            Rc::new(Btrfs::new(SystemRunner)),
            Box::new(SystemRunner),
            self.mode,
        )?)
    }
}
