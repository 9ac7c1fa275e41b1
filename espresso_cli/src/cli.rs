//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "espresso", version, about = "Espresso machine controller")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile library JSON; each profile becomes a selectable mode
    #[arg(long, value_name = "FILE")]
    pub profiles: Option<PathBuf>,

    /// Override the configured machine link
    #[arg(long, value_enum, value_name = "KIND")]
    pub link: Option<LinkChoice>,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides the config
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Machine link selectable from the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LinkChoice {
    /// In-process plant simulator
    Sim,
    /// TCP bridge at `link.address`
    Tcp,
}

impl From<LinkChoice> for espresso_config::LinkKind {
    fn from(c: LinkChoice) -> Self {
        match c {
            LinkChoice::Sim => Self::Sim,
            LinkChoice::Tcp => Self::Tcp,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Switch to a mode, start it, and run until it finishes
    Run {
        /// Mode title (see `modes`)
        #[arg(long, default_value = "Nine Bar")]
        mode: String,
        /// Stop the mode after this many seconds of wall time
        #[arg(long, value_name = "SECS", default_value_t = 120.0)]
        max_seconds: f64,
        /// Write the brew data log as CSV when the run ends
        #[arg(long, action = ArgAction::SetTrue)]
        save_log: bool,
        /// Directory for the data log (overrides data_log.dir)
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },
    /// List the registered modes
    Modes,
    /// Validate config and profiles, then read one telemetry sample
    SelfCheck,
}
