use crate::{
    benchmark::{BenchmarkConfig, OrphanPolicy, OrphanSummary, RunOutcome},
    stats::Report,
    utils::{format_duration, format_duration_ns, format_rate, generate_run_id},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Complete results of one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub run_id: String,
    /// What was being driven, e.g. the echo server address.
    pub target: String,
    pub test_config: TestConfiguration,
    pub report: Report,
    pub orphans: OrphanSummary,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub system_info: SystemInfo,
}

/// Test configuration used for the benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfiguration {
    pub concurrency: usize,
    pub total: usize,
    pub op_timeout: Duration,
    pub warmup: bool,
    pub orphan_policy: OrphanPolicy,
    pub body_size: Option<usize>,
}

impl TestConfiguration {
    pub fn from_config(config: &BenchmarkConfig, body_size: Option<usize>) -> Self {
        Self {
            concurrency: config.concurrency,
            total: config.total,
            op_timeout: config.op_timeout,
            warmup: config.warmup,
            orphan_policy: config.orphan_policy,
            body_size,
        }
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub rust_version: String,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: crate::utils::get_cpu_cores(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

impl BenchmarkResults {
    /// Create new benchmark results
    pub fn new(target: impl Into<String>, test_config: TestConfiguration, outcome: RunOutcome) -> Self {
        Self {
            run_id: generate_run_id(),
            target: target.into(),
            test_config,
            report: outcome.report,
            orphans: outcome.orphans,
            timestamp: chrono::Utc::now(),
            system_info: SystemInfo::default(),
        }
    }
}

/// Results manager for handling output
#[derive(Debug)]
pub struct ResultsManager {
    output_file: PathBuf,
}

impl ResultsManager {
    /// Create a new results manager
    pub fn new(output_file: &Path) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
        }
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    /// Write `results` as pretty-printed JSON, replacing any existing file.
    pub fn write(&self, results: &BenchmarkResults) -> Result<()> {
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&self.output_file, json)
            .with_context(|| format!("Failed to write results to {:?}", self.output_file))?;

        info!("Results written to: {:?}", self.output_file);
        Ok(())
    }

    /// Read results back from the output file.
    pub fn load(&self) -> Result<BenchmarkResults> {
        let json = std::fs::read_to_string(&self.output_file)
            .with_context(|| format!("Failed to read results from {:?}", self.output_file))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Human-readable summary of a [`Report`].
///
/// Every cost is shown both as raw nanoseconds and in the nearest readable
/// unit. Error lines only appear when something failed.
pub struct ReportDisplay<'a> {
    pub report: &'a Report,
}

impl<'a> fmt::Display for ReportDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        writeln!(f, "Total Requests: {}", r.total_requests)?;
        writeln!(f, "Total Cost: {}", format_duration(r.wall_clock))?;
        writeln!(
            f,
            "Total Sum: {}ns, {}",
            r.total_cost_ns,
            format_duration_ns(r.total_cost_ns)
        )?;
        writeln!(
            f,
            "Average Cost: {:.2}, {}",
            r.avg_cost_ns,
            format_duration_ns(r.avg_cost_ns as u64)
        )?;
        if !r.error_types.is_empty() {
            writeln!(f, "Error Types:")?;
            for (error, count) in &r.error_types {
                writeln!(f, "  {}: {}", error, count)?;
            }
        }
        if r.total_errors != 0 {
            writeln!(f, "Error Rate: {:.2}%", r.error_rate * 100.0)?;
        }
        writeln!(f, "TPS: {:.2} ({})", r.throughput, format_rate(r.throughput))?;
        writeln!(
            f,
            "Median Cost: {}, {}",
            r.median_cost_ns,
            format_duration_ns(r.median_cost_ns)
        )?;
        for p in &r.percentiles {
            writeln!(
                f,
                "Cost at {:.2}%: {}, {}",
                p.percentile * 100.0,
                p.value_ns,
                format_duration_ns(p.value_ns)
            )?;
        }
        write!(
            f,
            "Min/Max/StdDev: {} / {} / {}",
            format_duration_ns(r.min_cost_ns),
            format_duration_ns(r.max_cost_ns),
            format_duration_ns(r.std_dev_ns as u64)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordEntry;
    use crate::stats::StatsCollector;
    use crate::error::OpError;
    use tempfile::NamedTempFile;

    fn sample_outcome() -> RunOutcome {
        let mut entries: Vec<RecordEntry> = [10u64, 20, 30, 40, 50]
            .iter()
            .map(|&ns| RecordEntry::success(Duration::from_nanos(ns)))
            .collect();
        entries[4].error = Some(OpError::Timeout);
        let report = StatsCollector::default()
            .collect(&entries, Duration::from_nanos(100))
            .unwrap();
        RunOutcome {
            report,
            orphans: OrphanSummary::default(),
        }
    }

    #[test]
    fn test_benchmark_results_creation() {
        let config = BenchmarkConfig::default();
        let results = BenchmarkResults::new(
            "127.0.0.1:9999",
            TestConfiguration::from_config(&config, Some(1024)),
            sample_outcome(),
        );

        assert_eq!(results.target, "127.0.0.1:9999");
        assert_eq!(results.test_config.concurrency, 1);
        assert_eq!(results.test_config.body_size, Some(1024));
        assert_eq!(results.report.total_requests, 5);
        assert!(!results.run_id.is_empty());
    }

    #[test]
    fn test_results_round_trip_through_json_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let manager = ResultsManager::new(temp_file.path());
        assert_eq!(manager.output_file(), temp_file.path());

        let results = BenchmarkResults::new(
            "local",
            TestConfiguration::from_config(&BenchmarkConfig::default(), None),
            sample_outcome(),
        );
        manager.write(&results).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.run_id, results.run_id);
        assert_eq!(loaded.report.total_requests, 5);
        assert_eq!(loaded.report.median_cost_ns, results.report.median_cost_ns);
        assert_eq!(loaded.report.error_types, results.report.error_types);
        assert_eq!(loaded.test_config, results.test_config);

        let raw = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(raw.contains("\"median_cost_ns\": 30"));
    }

    #[test]
    fn test_report_display_lists_summary_lines() {
        let outcome = sample_outcome();
        let text = ReportDisplay {
            report: &outcome.report,
        }
        .to_string();

        assert!(text.contains("Total Requests: 5"));
        assert!(text.contains("Total Sum: 150ns, 150ns"));
        assert!(text.contains("Average Cost: 30.00, 30ns"));
        assert!(text.contains("Error Types:\n  timeout: 1"));
        assert!(text.contains("Error Rate: 20.00%"));
        assert!(text.contains("Median Cost: 30, 30ns"));
        assert!(text.contains("Cost at 10.00%: 10, 10ns"));
        assert!(text.contains("Cost at 99.00%: 50, 50ns"));
    }

    #[test]
    fn test_error_lines_hidden_without_errors() {
        let entries = vec![RecordEntry::success(Duration::from_micros(3))];
        let report = StatsCollector::default()
            .collect(&entries, Duration::from_millis(1))
            .unwrap();
        let text = ReportDisplay { report: &report }.to_string();
        assert!(!text.contains("Error"));
        assert!(text.contains("TPS: 1000.00"));
    }

    #[test]
    fn test_system_info_default() {
        let info = SystemInfo::default();

        assert!(!info.os.is_empty());
        assert!(!info.architecture.is_empty());
        assert!(info.cpu_cores > 0);
        assert_eq!(info.benchmark_version, crate::VERSION);
    }
}
