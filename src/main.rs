//! # loadbench - Main Entry Point
//!
//! Runs either side of the TCP echo benchmark:
//!
//! - **server**: bind the echo server and serve until Ctrl-C
//! - **client**: drive the server through the benchmark runner, print the
//!   summary and optionally write the results as JSON
//!
//! ## Error Handling
//!
//! The binary uses `anyhow::Result` throughout. A failed `begin` or `end`
//! phase, an invalid configuration or an unwritable output file ends the
//! process with an error; failed individual operations only show up in the
//! report.

use anyhow::Result;
use clap::Parser;
use loadbench::{
    benchmark::{BenchRunner, BenchmarkConfig},
    cli::{Args, Mode},
    echo::{EchoServer, EchoUnit},
    logging,
    results::{BenchmarkResults, ReportDisplay, ResultsManager, TestConfiguration},
    utils::validate_body_size,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Flushes the file log on drop; keep it for the life of the process.
    let _log_guard = logging::init(args.verbose, args.log_file.as_deref())?;

    info!("Starting loadbench {} in {} mode", loadbench::VERSION, args.mode);
    tracing::debug!("Configuration: {:?}", args);

    match args.mode {
        Mode::Server => run_server(&args).await,
        Mode::Client => run_client(&args).await,
    }
}

/// Serve echo traffic until Ctrl-C.
async fn run_server(args: &Args) -> Result<()> {
    let server = EchoServer::bind(args.addr).await?;
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        signal.cancel();
    });

    server.serve_until(shutdown).await
}

/// Benchmark a running echo server and report.
async fn run_client(args: &Args) -> Result<()> {
    let config = BenchmarkConfig::from_args(args)?;
    validate_body_size(args.body_size)?;

    let pool_size = args.effective_pool_size();
    info!(
        "Connecting to {} with up to {} pooled connections",
        args.addr, pool_size
    );
    let unit = Arc::new(EchoUnit::new(args.addr, pool_size, args.body_size));

    let runner = BenchRunner::new(config.clone());
    let outcome = runner.run(unit.clone()).await?;

    let drained = unit.pool().drain();
    tracing::debug!("Closed {} pooled connections", drained);

    println!("{}", ReportDisplay { report: &outcome.report });
    if outcome.orphans.timed_out > 0 {
        println!(
            "Timed-out handlers: {} ({} finished, {} detached, {} aborted)",
            outcome.orphans.timed_out,
            outcome.orphans.finished,
            outcome.orphans.detached,
            outcome.orphans.aborted
        );
    }

    if let Some(ref output_file) = args.output_file {
        let results = BenchmarkResults::new(
            args.addr.to_string(),
            TestConfiguration::from_config(&config, Some(args.body_size)),
            outcome,
        );
        ResultsManager::new(output_file).write(&results)?;
    }

    info!("loadbench completed successfully");
    Ok(())
}
