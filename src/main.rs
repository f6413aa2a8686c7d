//! Server entry point for the library lending service.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use library_lending::{Database, ExpiryScheduler, LendingConfig, LendingEngine};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Library lending service starting");

    let db = Database::new(&args.db_path).await?;

    let config = LendingConfig {
        loan_period_days: args.loan_days,
        claim_window_hours: args.claim_hours,
        sweep_interval: Duration::from_secs(args.sweep_interval),
    };
    let engine = LendingEngine::new(db, config);

    // Settle anything that lapsed while the service was down before taking
    // traffic, then keep sweeping in the background.
    let startup_sweep = engine.sweep_expired().await?;
    if startup_sweep.expired > 0 {
        info!(
            expired = startup_sweep.expired,
            "settled lapsed notifications from previous session"
        );
    }
    let scheduler = ExpiryScheduler::spawn(engine.clone());

    let app = library_lending::http::router(engine);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    // Ignore errors installing the handler; worst case we stop on SIGKILL.
    let _ = tokio::signal::ctrl_c().await;
}
