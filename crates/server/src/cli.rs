//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sheetflow_core::Config;

/// sheetflow: CSV upload/poll service that publishes uppercased and filtered tables.
#[derive(Parser, Debug)]
#[command(name = "sheetflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default when no command is given).
    Serve {
        /// Remote CSV or Google Sheets link to poll (overrides SOURCE_URL).
        #[arg(long)]
        source_url: Option<String>,

        /// Poll interval in seconds (overrides POLL_INTERVAL_SECS).
        #[arg(long)]
        poll_interval: Option<u64>,
    },
    /// Transform a local CSV once and write the derived tables to the results directory.
    Process {
        /// Path to the CSV file.
        path: PathBuf,
    },
}

/// Apply `serve` flags on top of the environment config.
pub fn apply_serve_overrides(config: &mut Config, source_url: Option<String>, poll_interval: Option<u64>) {
    if let Some(url) = source_url.filter(|u| !u.trim().is_empty()) {
        config.poller.source_url = Some(url);
    }
    if let Some(secs) = poll_interval {
        config.poller.interval_secs = secs.max(1);
    }
}
