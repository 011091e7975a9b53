//! CLI module for fleetrecap
//!
//! Argument parsing and subcommand dispatch. Settings given on the command
//! line override the configuration file and the environment.

pub mod replay;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fleetrecap::config::{RenderOverrides, RendererKind};

/// fleetrecap - deduplicating result reporter for fan-out task runs
#[derive(Parser, Debug, Clone)]
#[command(name = "fleetrecap")]
#[command(version)]
#[command(about = "Deduplicating result reporter for fan-out task runs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level for diagnostics on stderr (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "FLEETRECAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true, conflicts_with = "force_color")]
    pub no_color: bool,

    /// Color output even when stdout is not a terminal
    #[arg(long, global = true)]
    pub force_color: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render a recorded or live JSON-lines event stream
    Replay(ReplayArgs),
}

/// Arguments for the replay command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Event log to read; stdin when omitted or `-`
    pub file: Option<PathBuf>,

    /// Renderer variant (classic or tally)
    #[arg(long)]
    pub renderer: Option<RendererKind>,

    /// Command to pipe diffs through, e.g. "diff-highlight"
    #[arg(long)]
    pub diff_formatter: Option<String>,

    /// Show diffs for unchanged results too
    #[arg(long)]
    pub always_diff: bool,

    /// Print a line whenever a host starts a task
    #[arg(long)]
    pub show_host_start: bool,

    /// Width of the live status line
    #[arg(long)]
    pub width: Option<usize>,

    /// Result fields ignored when comparing results
    #[arg(long, value_delimiter = ',')]
    pub volatile_fields: Option<Vec<String>>,

    /// Compare results without replacing host names
    #[arg(long)]
    pub no_anonymize: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Settings given on the command line.
    pub fn overrides(&self) -> RenderOverrides {
        let mut overrides = RenderOverrides {
            use_color: self.no_color.then_some(false),
            force_color: self.force_color.then_some(true),
            ..Default::default()
        };
        match &self.command {
            Commands::Replay(args) => {
                overrides.renderer = args.renderer;
                overrides.diff_formatter = args.diff_formatter.clone();
                overrides.always_show_diff = args.always_diff.then_some(true);
                overrides.show_host_start = args.show_host_start.then_some(true);
                overrides.width = args.width;
                overrides.volatile_fields = args.volatile_fields.clone();
                overrides.anonymize_hosts = args.no_anonymize.then_some(false);
            }
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_overrides() {
        let cli = Cli::parse_from([
            "fleetrecap",
            "--no-color",
            "replay",
            "events.jsonl",
            "--renderer",
            "tally",
            "--volatile-fields",
            "delta,pid",
            "--no-anonymize",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.use_color, Some(false));
        assert_eq!(overrides.renderer, Some(RendererKind::Tally));
        assert_eq!(overrides.volatile_fields, Some(vec!["delta".to_string(), "pid".to_string()]));
        assert_eq!(overrides.anonymize_hosts, Some(false));
        assert_eq!(overrides.always_show_diff, None);
        let Commands::Replay(args) = &cli.command;
        assert_eq!(args.file, Some(PathBuf::from("events.jsonl")));
    }

    #[test]
    fn test_unknown_renderer_rejected() {
        assert!(Cli::try_parse_from(["fleetrecap", "replay", "--renderer", "fancy"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
