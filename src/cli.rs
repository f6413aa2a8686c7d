//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use library_lending::config::{
    DEFAULT_CLAIM_WINDOW_HOURS, DEFAULT_LOAN_PERIOD_DAYS, DEFAULT_SWEEP_INTERVAL_SECS,
};

/// Library lending and queue service for the campus portal.
///
/// Serves the `/library` HTTP API: catalog browsing, book requests,
/// returns, and the wait-list with time-bounded claim notifications.
#[derive(Parser, Debug)]
#[command(name = "library-server")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Path to the SQLite database file
    #[arg(long, default_value = "library.db")]
    pub db_path: PathBuf,

    /// Loan period in days (1-365)
    #[arg(long, default_value_t = DEFAULT_LOAN_PERIOD_DAYS, value_parser = clap::value_parser!(i64).range(1..=365))]
    pub loan_days: i64,

    /// Claim window in hours for notified queue entries (1-720)
    #[arg(long, default_value_t = DEFAULT_CLAIM_WINDOW_HOURS, value_parser = clap::value_parser!(i64).range(1..=720))]
    pub claim_hours: i64,

    /// Seconds between expiry sweeps (1-3600)
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub sweep_interval: u64,
}
