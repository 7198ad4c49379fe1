//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub const DEFAULT_CONFIG: &str = "etc/changer.toml";

#[derive(Parser, Debug)]
#[command(name = "changer", version, about = "MDB coin changer CLI")]
pub struct Cli {
    /// Path to config TOML (typed); a missing default file means built-in defaults
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Print results and events as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the changer and stream coin events until Ctrl-C
    Run {
        /// Collect this amount (smallest currency unit), then exit
        #[arg(long, value_name = "N")]
        amount: Option<u32>,
        /// Cancel the amount request after this long without a coin event
        #[arg(
            long,
            value_name = "MS",
            requires = "amount",
            long_help = "Cancel the amount request after this many milliseconds without a coin event.\n\nEverything collected so far is refunded. Only meaningful together with --amount."
        )]
        idle_timeout_ms: Option<u64>,
    },
    /// Print tube levels after a resync
    Tubes,
    /// Pay out coins of one type
    Dispense {
        /// Coin type (1..=16)
        #[arg(long, value_name = "TYPE")]
        coin_type: u8,
        /// Number of coins
        #[arg(long, value_name = "QTY")]
        quantity: u32,
    },
    /// Pay out an amount as exact change
    Refund {
        #[arg(long, value_name = "N")]
        amount: u32,
    },
    /// Show the change plan for an amount without paying out
    Plan {
        #[arg(long, value_name = "N")]
        amount: u32,
    },
    /// Quick health check (config, link and tube status)
    SelfCheck,
}
