//! # Utility Functions and Helper Module
//!
//! Formatters for human-readable output, validators for run parameters and a
//! few system information helpers used throughout the harness.
//!
//! ## Usage Examples
//!
//! ```rust
//! use loadbench::utils::*;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let duration_str = format_duration(Duration::from_micros(1500));
//! assert_eq!(duration_str, "1.50ms");
//!
//! validate_concurrency(64)?; // OK
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on concurrent workers per phase.
pub const MAX_CONCURRENCY: usize = 65_536;

/// Largest request body the echo framing accepts.
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Generate a unique identifier for a benchmark run
///
/// Creates a UUID v4 string used to tell result files and log lines of
/// concurrent runs apart.
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a nanosecond count as a human-readable string
///
/// Convenience wrapper around [`format_duration`] for values stored as raw
/// nanoseconds, which is how the report keeps costs.
pub fn format_duration_ns(ns: u64) -> String {
    let duration = Duration::from_nanos(ns);
    format_duration(duration)
}

/// Format a duration as a human-readable string
///
/// Picks the largest unit that keeps the value readable:
///
/// - **< 1μs**: nanoseconds (e.g. "500ns")
/// - **< 1ms**: microseconds with 2 decimals (e.g. "1.50μs")
/// - **< 1s**: milliseconds with 2 decimals (e.g. "1.50ms")
/// - **< 1m**: seconds with 2 decimals (e.g. "1.50s")
/// - **longer**: compound minutes/hours (e.g. "2m 30s", "1h 5m 0s")
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format an operation rate for display
///
/// - **< 1K**: whole operations per second (e.g. "500 ops/s")
/// - **< 1M**: thousands with 2 decimals (e.g. "1.50K ops/s")
/// - **otherwise**: millions with 2 decimals (e.g. "1.50M ops/s")
pub fn format_rate(ops_per_second: f64) -> String {
    if !ops_per_second.is_finite() {
        "unbounded".to_string()
    } else if ops_per_second < 1_000.0 {
        format!("{:.0} ops/s", ops_per_second)
    } else if ops_per_second < 1_000_000.0 {
        format!("{:.2}K ops/s", ops_per_second / 1_000.0)
    } else {
        format!("{:.2}M ops/s", ops_per_second / 1_000_000.0)
    }
}

/// Validate concurrency level
///
/// ## Validation Rules
///
/// - **Minimum**: 1 worker
/// - **Maximum**: [`MAX_CONCURRENCY`] workers
pub fn validate_concurrency(concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        anyhow::bail!("Concurrency cannot be zero");
    }
    if concurrency > MAX_CONCURRENCY {
        anyhow::bail!(
            "Concurrency {} is too high (maximum {})",
            concurrency,
            MAX_CONCURRENCY
        );
    }
    Ok(())
}

/// Validate the number of operations per phase.
pub fn validate_total(total: usize) -> Result<()> {
    if total == 0 {
        anyhow::bail!("Total operation count cannot be zero");
    }
    Ok(())
}

/// Validate the per-operation timeout. Zero would time out every call.
pub fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        anyhow::bail!("Operation timeout cannot be zero");
    }
    Ok(())
}

/// Validate the request body size sent by the echo client.
///
/// Empty bodies are allowed. The limit matches the framing limit.
pub fn validate_body_size(body_size: usize) -> Result<()> {
    if body_size > MAX_BODY_SIZE {
        anyhow::bail!(
            "Body size {} is too large (maximum {} bytes)",
            body_size,
            MAX_BODY_SIZE
        );
    }
    Ok(())
}

/// Get the number of CPU cores available
///
/// Uses the `num_cpus` crate, which accounts for logical cores and container
/// limits. Reported in the results' system information.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}
