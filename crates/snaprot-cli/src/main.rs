#![forbid(unsafe_code)]

mod cmd;
mod output;

use anyhow::{Context as _, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode};
use snaprot_core::config::{config_path, load_settings};
use snaprot_core::{Generation, Mode};
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "snaprot",
    author,
    version,
    about = "snaprot: grandfather-father-son rotation of btrfs snapshots",
    long_about = None
)]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Less log output (-q warnings only, -qq errors only).
    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "verbose")]
    quiet: u8,

    /// Log every mutation without performing it.
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Config file (default: $SNAPROT_CONFIG, then the user config dir,
    /// then /etc/snaprot/config.toml).
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    const fn mode(&self) -> Mode {
        if self.dry_run {
            Mode::Rehearsal
        } else {
            Mode::Live
        }
    }

    /// Default filter directive from `-v`/`-q`.
    fn level(&self) -> &'static str {
        match i16::from(self.verbose) - i16::from(self.quiet) {
            i16::MIN..=-2 => "error",
            -1 => "warn",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create the backup root and a fresh hourly.0",
        after_help = "EXAMPLES:\n    # First run on a new machine\n    snaprot init\n\n    # Show what would be created\n    snaprot --dry-run init"
    )]
    Init,

    #[command(
        next_help_heading = "Rotation",
        about = "Rotate hourly slots and refresh hourly.0 from the sources",
        after_help = "EXAMPLES:\n    # From cron, every hour\n    snaprot -q hourly"
    )]
    Hourly,

    #[command(
        next_help_heading = "Rotation",
        about = "Rotate daily slots and promote the newest hourly"
    )]
    Daily,

    #[command(
        next_help_heading = "Rotation",
        about = "Rotate weekly slots and promote the newest daily"
    )]
    Weekly,

    #[command(
        next_help_heading = "Rotation",
        about = "Rotate monthly slots and promote the newest weekly"
    )]
    Monthly,

    #[command(
        next_help_heading = "Rotation",
        about = "Rotate yearly slots and promote the newest monthly"
    )]
    Yearly,

    #[command(
        next_help_heading = "Maintenance",
        about = "Delete one slot",
        after_help = "EXAMPLES:\n    # Drop a daily snapshot by hand\n    snaprot remove daily.2"
    )]
    Remove(cmd::remove::RemoveArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Show effective settings and occupied slots",
        after_help = "EXAMPLES:\n    snaprot config\n    snaprot --json config"
    )]
    Config,

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_env("SNAPROT_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    let json = env::var("SNAPROT_LOG_FORMAT").is_ok_and(|format| format == "json");

    let compact_layer = (!json).then(|| fmt::layer().compact().with_writer(io::stderr));
    let json_layer = json.then(|| fmt::layer().json().with_ansi(false).with_writer(io::stderr));
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(compact_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// Resolve the config file, load it and start logging.
fn invocation(cli: &Cli) -> Result<cmd::Invocation> {
    let config_path = config_path(cli.config.as_deref());
    let settings = load_settings(&config_path)?;
    init_tracing(cli.level(), settings.log.file.as_deref())?;
    debug!(path = %config_path.display(), "settings loaded");

    Ok(cmd::Invocation {
        config_path,
        settings,
        mode: cli.mode(),
        output: cli.output_mode(),
    })
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args, &mut command)
        }
        Commands::Init => cmd::init::run_init(&invocation(cli)?),
        Commands::Hourly => cmd::cycle::run_cycle(Generation::Hourly, &invocation(cli)?),
        Commands::Daily => cmd::cycle::run_cycle(Generation::Daily, &invocation(cli)?),
        Commands::Weekly => cmd::cycle::run_cycle(Generation::Weekly, &invocation(cli)?),
        Commands::Monthly => cmd::cycle::run_cycle(Generation::Monthly, &invocation(cli)?),
        Commands::Yearly => cmd::cycle::run_cycle(Generation::Yearly, &invocation(cli)?),
        Commands::Remove(args) => cmd::remove::run_remove(args, &invocation(cli)?),
        Commands::Config => cmd::config::run_config(&invocation(cli)?),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = output::render_error(cli.output_mode(), &CliError::from(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subcommand_parses() {
        for args in [
            vec!["snaprot", "init"],
            vec!["snaprot", "hourly"],
            vec!["snaprot", "daily"],
            vec!["snaprot", "weekly"],
            vec!["snaprot", "monthly"],
            vec!["snaprot", "yearly"],
            vec!["snaprot", "remove", "daily.2"],
            vec!["snaprot", "config"],
            vec!["snaprot", "completions", "zsh"],
        ] {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn dry_run_selects_rehearsal() {
        assert_eq!(Cli::parse_from(["snaprot", "-n", "daily"]).mode(), Mode::Rehearsal);
        assert_eq!(Cli::parse_from(["snaprot", "daily", "--dry-run"]).mode(), Mode::Rehearsal);
        assert_eq!(Cli::parse_from(["snaprot", "daily"]).mode(), Mode::Live);
    }

    #[test]
    fn verbosity_counts_map_to_levels() {
        assert_eq!(Cli::parse_from(["snaprot", "hourly"]).level(), "info");
        assert_eq!(Cli::parse_from(["snaprot", "-v", "hourly"]).level(), "debug");
        assert_eq!(Cli::parse_from(["snaprot", "-vv", "hourly"]).level(), "trace");
        assert_eq!(Cli::parse_from(["snaprot", "-q", "hourly"]).level(), "warn");
        assert_eq!(Cli::parse_from(["snaprot", "-qq", "hourly"]).level(), "error");
    }

    #[test]
    fn remove_parses_a_slot() {
        let cli = Cli::parse_from(["snaprot", "remove", "weekly.3"]);
        let Commands::Remove(args) = cli.command else {
            panic!("expected remove");
        };
        assert_eq!(args.slot.to_string(), "weekly.3");
    }

    #[test]
    fn malformed_slots_are_rejected_by_the_parser() {
        for bad in ["weekly", "weekly.-1", "fortnightly.0", "daily.x"] {
            assert!(
                Cli::try_parse_from(["snaprot", "remove", bad]).is_err(),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn json_and_config_flags_are_global() {
        let cli = Cli::parse_from(["snaprot", "config", "--json", "-c", "/tmp/s.toml"]);
        assert!(cli.output_mode().is_json());
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/s.toml")));
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["snaprot", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
                output: None,
            })
        ));
    }
}
