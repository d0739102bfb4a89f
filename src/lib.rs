//! # loadbench Library
//!
//! A concurrent load-testing harness. It drives a pluggable unit of work at a
//! configured concurrency for a fixed number of operations, bounds every
//! operation with a timeout, and reports latency and throughput statistics.
//!
//! ## Architecture Overview
//!
//! - `pool`: bounded ring buffer and the generic connection pool built on it
//! - `unit`: the lifecycle trait implemented by the system under test
//! - `benchmark`: the runner that moves a unit through warm-up, begin,
//!   measure and end across concurrent workers
//! - `records` and `stats`: per-operation outcomes and their aggregate report
//! - `clock`: injectable time sources
//! - `echo`: a TCP echo server and client unit used by the binary
//! - `results`, `cli`, `logging`, `utils`: presentation and plumbing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use loadbench::{BenchRunner, BenchmarkConfig, EchoUnit};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig {
//!         concurrency: 32,
//!         total: 100_000,
//!         ..BenchmarkConfig::default()
//!     };
//!     let unit = Arc::new(EchoUnit::new("127.0.0.1:9999".parse()?, 1024, 1024));
//!
//!     let outcome = BenchRunner::new(config).run(unit).await?;
//!     println!("Median cost: {}ns", outcome.report.median_cost_ns);
//!     Ok(())
//! }
//! ```

/// Core benchmarking functionality
///
/// Contains the `BenchRunner` and `BenchmarkConfig` types. The runner owns
/// the phase sequence, the worker pool for each bench phase, the per-call
/// timeout race and the handling of timed-out handlers.
pub mod benchmark;

/// Command-line interface and configuration
pub mod cli;

pub mod clock;

/// TCP echo server, framing and client unit
pub mod echo;

pub mod error;

/// Console and file log setup
pub mod logging;

/// Bounded resource reuse: `RingBuffer` and `ConnectionPool`
pub mod pool;

pub mod records;

/// Result collection and output formatting
///
/// Wraps a report with run metadata, writes it as JSON and renders the
/// human-readable summary.
pub mod results;

/// Aggregation of records into latency and throughput statistics
pub mod stats;

pub mod unit;

pub mod utils;

// Re-export key types for convenient library usage

pub use benchmark::{BenchRunner, BenchmarkConfig, OrphanPolicy, OrphanSummary, RunOutcome};
pub use cli::{Args, Mode};
pub use clock::{Clock, ManualClock, SystemClock, TickingClock};
pub use echo::{EchoServer, EchoUnit};
pub use error::{BenchError, OpError, Phase};
pub use pool::{ConnectionPool, Factory, RingBuffer};
pub use records::RecordEntry;
pub use results::{BenchmarkResults, ResultsManager};
pub use stats::{Report, StatsCollector, StatsError};
pub use unit::Unit;

/// The current version of loadbench
///
/// Populated from Cargo.toml and recorded in result output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    /// Default number of concurrent workers
    pub const CONCURRENCY: usize = 1;

    /// Default number of operations per phase
    pub const TOTAL: usize = 1;

    /// Default request body size in bytes
    pub const BODY_SIZE: usize = 1024;

    /// Default deadline for a single operation
    pub const OP_TIMEOUT: Duration = Duration::from_secs(1);

    /// Default echo server port
    pub const PORT: u16 = 9999;

    /// Smallest idle connection pool the client creates.
    ///
    /// The pool is sized to at least the concurrency so every worker can
    /// hold a connection without forcing a reconnect.
    pub const MIN_POOL_SIZE: usize = 1024;

    /// Percentiles shown in the report, as fractions.
    pub const REPORT_PERCENTILES: [f64; 6] = [0.10, 0.30, 0.70, 0.80, 0.90, 0.99];

    /// Default echo server address
    pub fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), PORT)
    }
}
