use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// loadbench - Drive a TCP echo service at a fixed concurrency and report latency
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Run as the echo server or as the load-generating client
    #[clap(long, value_enum, default_value_t = Mode::Client, help_heading = "Core Options")]
    pub mode: Mode,

    /// Address the server binds to, or the client connects to
    #[clap(short = 's', long, default_value_t = crate::defaults::addr(), help_heading = "Core Options")]
    pub addr: SocketAddr,

    /// Number of concurrent workers
    #[clap(short = 'c', long, default_value_t = crate::defaults::CONCURRENCY, help_heading = "Load Options")]
    pub concurrency: usize,

    /// Number of operations per phase
    #[clap(short = 'n', long, default_value_t = crate::defaults::TOTAL, help_heading = "Load Options")]
    pub total: usize,

    /// Request body size in bytes
    #[clap(short = 'b', long, default_value_t = crate::defaults::BODY_SIZE, help_heading = "Load Options")]
    pub body_size: usize,

    /// Deadline for a single operation (e.g. "500ms", "1s")
    #[clap(long, value_parser = parse_duration, default_value = "1s", help_heading = "Load Options")]
    pub timeout: Duration,

    /// Maximum idle connections kept for reuse (default: max(concurrency, 1024))
    #[clap(long, help_heading = "Load Options")]
    pub pool_size: Option<usize>,

    /// Skip the warm-up phase
    #[clap(long, default_value_t = false, help_heading = "Load Options")]
    pub no_warmup: bool,

    /// Abort timed-out handlers still running this long after the run
    #[clap(long, value_parser = parse_duration, help_heading = "Load Options")]
    pub orphan_grace: Option<Duration>,

    /// Output file for results (JSON format)
    #[clap(short = 'o', long, help_heading = "Output Options")]
    pub output_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[clap(short = 'v', long, action = ArgAction::Count, help_heading = "Output Options")]
    pub verbose: u8,

    /// Also write logs to this file
    #[clap(long, help_heading = "Output Options")]
    pub log_file: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            mode: Mode::Client,
            addr: crate::defaults::addr(),
            concurrency: crate::defaults::CONCURRENCY,
            total: crate::defaults::TOTAL,
            body_size: crate::defaults::BODY_SIZE,
            timeout: crate::defaults::OP_TIMEOUT,
            pool_size: None,
            no_warmup: false,
            orphan_grace: None,
            output_file: None,
            verbose: 0,
            log_file: None,
        }
    }
}

impl Args {
    /// Idle connection capacity for the client pool.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size
            .unwrap_or_else(|| self.concurrency.max(crate::defaults::MIN_POOL_SIZE))
    }
}

/// Which side of the echo exchange this process plays
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Mode {
    /// Echo every frame back to the sender
    #[clap(name = "server")]
    Server,

    /// Generate load against a server and report
    #[clap(name = "client")]
    Client,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Server => write!(f, "server"),
            Mode::Client => write!(f, "client"),
        }
    }
}

/// Parse duration from string (e.g., "250us", "500ms", "1.5s", "5m", "1h")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, ns_per_unit) = if let Some(stripped) = s.strip_suffix("ns") {
        (stripped, 1.0)
    } else if let Some(stripped) = s.strip_suffix("us") {
        (stripped, 1e3)
    } else if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, 1e6)
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1e9)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60e9)
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 3600e9)
    } else {
        (s, 1e9) // Default to seconds
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", s));
    }

    Ok(Duration::from_nanos((num * ns_per_unit).round() as u64))
}
