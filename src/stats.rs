use crate::records::RecordEntry;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Reasons a record sequence cannot be reduced to a report.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("no records to aggregate")]
    NoData,

    #[error("failed to build latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[error("failed to record latency: {0}")]
    Record(#[from] hdrhistogram::RecordError),
}

/// Percentile value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    /// Fraction in `[0, 1)`, e.g. `0.99`.
    pub percentile: f64,
    pub value_ns: u64,
}

/// Aggregate metrics for one measured phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub total_requests: usize,
    /// Wall-clock duration of the measured phase.
    pub wall_clock: Duration,
    /// Sum of all per-operation costs.
    pub total_cost_ns: u64,
    pub total_errors: usize,
    /// Occurrences per error message.
    pub error_types: BTreeMap<String, usize>,
    pub avg_cost_ns: f64,
    pub error_rate: f64,
    pub median_cost_ns: u64,
    pub percentiles: Vec<PercentileValue>,
    pub min_cost_ns: u64,
    pub max_cost_ns: u64,
    pub std_dev_ns: f64,
    /// Operations per wall-clock second.
    pub throughput: f64,
    pub distribution: Vec<u64>,
}

impl Report {
    /// Look up a computed percentile by its fraction.
    pub fn percentile(&self, p: f64) -> Option<u64> {
        self.percentiles
            .iter()
            .find(|v| (v.percentile - p).abs() < 1e-9)
            .map(|v| v.value_ns)
    }
}

/// Reduces a completed record sequence into a [`Report`].
#[derive(Debug, Clone)]
pub struct StatsCollector {
    percentiles: Vec<f64>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new(crate::defaults::REPORT_PERCENTILES.to_vec())
    }
}

impl StatsCollector {
    pub fn new(percentiles: Vec<f64>) -> Self {
        Self { percentiles }
    }

    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    /// Compute the report for `entries` measured over `wall_clock`.
    ///
    /// Percentiles use the nearest-rank rule on ascending costs: the value at
    /// index `floor(N * p)`, without interpolation.
    pub fn collect(&self, entries: &[RecordEntry], wall_clock: Duration) -> Result<Report, StatsError> {
        if entries.is_empty() {
            return Err(StatsError::NoData);
        }
        let n = entries.len();

        let mut total_cost_ns: u64 = 0;
        let mut error_types: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_errors = 0;
        for entry in entries {
            total_cost_ns = total_cost_ns.saturating_add(entry.cost_ns());
            if let Some(ref err) = entry.error {
                total_errors += 1;
                *error_types.entry(err.to_string()).or_insert(0) += 1;
            }
        }

        let mut sorted: Vec<u64> = entries.iter().map(RecordEntry::cost_ns).collect();
        sorted.sort_unstable();

        let avg_cost_ns = total_cost_ns as f64 / n as f64;
        let percentiles = self
            .percentiles
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                value_ns: value_at(&sorted, p),
            })
            .collect();

        let throughput = if wall_clock.is_zero() {
            f64::INFINITY
        } else {
            n as f64 / wall_clock.as_secs_f64()
        };

        Ok(Report {
            total_requests: n,
            wall_clock,
            total_cost_ns,
            total_errors,
            error_types,
            avg_cost_ns,
            error_rate: total_errors as f64 / n as f64,
            median_cost_ns: sorted[n / 2],
            percentiles,
            min_cost_ns: sorted[0],
            max_cost_ns: sorted[n - 1],
            std_dev_ns: std_dev(&sorted, avg_cost_ns),
            throughput,
            distribution: distribution(&sorted)?,
        })
    }
}

fn value_at(sorted: &[u64], p: f64) -> u64 {
    let index = (sorted.len() as f64 * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn std_dev(values: &[u64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|&v| {
            let diff = v as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Coarse quantile ladder of the cost distribution.
fn distribution(sorted: &[u64]) -> Result<Vec<u64>, StatsError> {
    // 3 significant figures, auto-resizing.
    let mut histogram = Histogram::<u64>::new(3)?;
    for &value in sorted {
        histogram.record(value)?;
    }
    Ok(histogram
        .iter_quantiles(1)
        .map(|v| v.value_iterated_to())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpError;

    fn entries(costs: &[u64]) -> Vec<RecordEntry> {
        costs
            .iter()
            .map(|&ns| RecordEntry::success(Duration::from_nanos(ns)))
            .collect()
    }

    #[test]
    fn test_report_on_known_costs() {
        let collector = StatsCollector::default();
        let report = collector
            .collect(&entries(&[50, 10, 40, 20, 30]), Duration::from_nanos(100))
            .unwrap();

        assert_eq!(report.total_requests, 5);
        assert_eq!(report.total_cost_ns, 150);
        assert_eq!(report.avg_cost_ns, 30.0);
        assert_eq!(report.median_cost_ns, 30);
        assert_eq!(report.percentile(0.10), Some(10));
        assert_eq!(report.percentile(0.30), Some(20));
        assert_eq!(report.percentile(0.70), Some(40));
        assert_eq!(report.percentile(0.80), Some(50));
        assert_eq!(report.percentile(0.99), Some(50));
        assert_eq!(report.min_cost_ns, 10);
        assert_eq!(report.max_cost_ns, 50);
        assert_eq!(report.total_errors, 0);
        assert_eq!(report.error_rate, 0.0);
        assert!((report.throughput - 5.0e7).abs() < 1e-3);
        assert!((report.std_dev_ns - 200f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_error_classification() {
        let mut records = entries(&[1, 2, 3, 4]);
        records[0].error = Some(OpError::Timeout);
        records[1].error = Some(OpError::Failed("connection reset".into()));
        records[3].error = Some(OpError::Timeout);

        let report = StatsCollector::default()
            .collect(&records, Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.total_errors, 3);
        assert_eq!(report.error_rate, 0.75);
        assert_eq!(report.error_types.get("timeout"), Some(&2));
        assert_eq!(report.error_types.get("connection reset"), Some(&1));
        assert_eq!(report.throughput, 4.0);
    }

    #[test]
    fn test_single_record() {
        let report = StatsCollector::default()
            .collect(&entries(&[7]), Duration::from_secs(2))
            .unwrap();
        assert_eq!(report.median_cost_ns, 7);
        assert!(report.percentiles.iter().all(|p| p.value_ns == 7));
        assert_eq!(report.throughput, 0.5);
        assert_eq!(report.std_dev_ns, 0.0);
    }

    #[test]
    fn test_empty_sequence_has_no_report() {
        let result = StatsCollector::default().collect(&[], Duration::from_secs(1));
        assert!(matches!(result, Err(StatsError::NoData)));
    }

    #[test]
    fn test_zero_wall_clock_does_not_panic() {
        let report = StatsCollector::default()
            .collect(&entries(&[1, 2]), Duration::ZERO)
            .unwrap();
        assert!(report.throughput.is_infinite());
    }

    #[test]
    fn test_custom_percentiles() {
        let costs: Vec<u64> = (1..=100).collect();
        let report = StatsCollector::new(vec![0.5, 0.95])
            .collect(&entries(&costs), Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.percentile(0.5), Some(51));
        assert_eq!(report.percentile(0.95), Some(96));
        assert_eq!(report.percentile(0.99), None);
        assert!(!report.distribution.is_empty());
    }
}
