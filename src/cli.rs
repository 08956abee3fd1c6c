//! Command-line interface definitions for statediff.
//!
//! The definitions are shared between the main binary and xtask, which
//! renders man pages from them.
//!
//! Field-level documentation is provided via clap doc comments and help
//! attributes, so missing_docs is allowed for this module.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for statediff.
#[derive(Parser)]
#[command(
    name = "statediff",
    version = crate::VERSION,
    about = "Capture host state before and after a change and report the difference",
    long_about = "Snapshots files, packages, services, processes, ports, accounts and cron jobs \
                  before and after a change, then reports exactly what changed"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to $STATEDIFF_CONFIG, then /etc/statediff/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Capture the state before a change
    Before {
        /// Session name
        session: String,

        /// Additional exclusion pattern (repeatable)
        #[arg(short, long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,
    },

    /// Capture the state after a change and write the report
    After {
        /// Session name
        session: String,

        /// Report sections, comma separated
        #[arg(short, long, default_value = "all")]
        sections: String,

        /// Additional exclusion pattern (repeatable)
        #[arg(short, long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,
    },

    /// Regenerate the report from stored snapshots
    Report {
        /// Session name
        session: String,

        /// Report sections, comma separated
        #[arg(short, long, default_value = "all")]
        sections: String,

        /// Print the text report to stdout
        #[arg(short, long, conflicts_with = "json")]
        print: bool,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,
    },

    /// Show how a single file changed
    Show {
        /// Session name
        session: String,

        /// Absolute path of the file
        path: PathBuf,
    },

    /// Show captured phases of a session, or list sessions
    Status {
        /// Session name (lists all sessions when omitted)
        session: Option<String>,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Actions of the `config` subcommand.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Check the configuration file and scan settings
    Validate,

    /// Write the default configuration to the configuration path
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
