//! # Benchmark Engine Module
//!
//! This module contains the runner that drives a [`Unit`] through its
//! lifecycle and turns the measured calls into a [`Report`].
//!
//! ## Test Execution Lifecycle
//!
//! 1. **Warm-up**: every configured operation is issued once through
//!    `Unit::warm_up`. Outcomes are counted but not recorded.
//! 2. **Begin**: `Unit::begin` runs once. A failure aborts the run.
//! 3. **Measure**: every operation is issued through `Unit::run` and its cost
//!    and outcome land in a pre-sized record sequence.
//! 4. **End**: `Unit::end` runs once. A failure aborts the run.
//!
//! ## Concurrency Handling
//!
//! Each bench phase spawns `concurrency` workers onto a [`JoinSet`]. The
//! workers share one atomic counter for the phase and claim operation numbers
//! from it until the configured total is exhausted, so work is balanced by
//! whichever worker is free rather than split up front.
//!
//! Every call races its own deadline. The handler runs as a separate task; if
//! the deadline fires first the worker records a timeout and moves on while
//! the handler keeps running in the background. Such handlers are called
//! orphans and are settled after the run according to [`OrphanPolicy`].

use crate::{
    cli::Args,
    clock::{Clock, SystemClock},
    error::{BenchError, OpError, Phase},
    records::{RecordEntry, Records},
    stats::{Report, StatsCollector},
    unit::Unit,
    utils::{format_duration, validate_concurrency, validate_timeout, validate_total},
};
use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::{sync::oneshot, task::JoinHandle, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// A helper struct to provide a consistent, single source of truth for
/// displaying the benchmark configuration.
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Benchmark")?;
        writeln!(f, "  Concurrency:        {}", self.config.concurrency)?;
        writeln!(f, "  Total Operations:   {}", self.config.total)?;
        writeln!(
            f,
            "  Operation Timeout:  {}",
            format_duration(self.config.op_timeout)
        )?;
        let warmup_status = if self.config.warmup {
            "Enabled"
        } else {
            "Skipped"
        };
        writeln!(f, "  Warm-up:            {}", warmup_status)?;
        writeln!(f, "  Orphan Policy:      {}", self.config.orphan_policy)?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// What happens to handlers that are still running after losing their
/// timeout race.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrphanPolicy {
    /// Leave them running. They are counted and reported, nothing more.
    #[default]
    Detach,

    /// Wait up to `grace` after the run for them to finish, then abort the
    /// remainder.
    Reap { grace: Duration },
}

impl std::fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrphanPolicy::Detach => write!(f, "Detach"),
            OrphanPolicy::Reap { grace } => {
                write!(f, "Reap (grace {})", format_duration(*grace))
            }
        }
    }
}

/// Configuration for benchmark execution
///
/// This structure encapsulates every parameter the runner needs. It is built
/// from command-line arguments with [`BenchmarkConfig::from_args`], or from
/// [`Default`] when embedding the runner in another program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Number of concurrent workers per bench phase.
    pub concurrency: usize,

    /// Number of operations issued in each bench phase.
    pub total: usize,

    /// Deadline for a single `warm_up` or `run` call.
    pub op_timeout: Duration,

    /// Whether to run the warm-up phase before measuring.
    pub warmup: bool,

    /// How timed-out handlers are settled once the run is over.
    pub orphan_policy: OrphanPolicy,

    /// Percentiles to report, as fractions in `[0, 1)`.
    pub percentiles: Vec<f64>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            concurrency: crate::defaults::CONCURRENCY,
            total: crate::defaults::TOTAL,
            op_timeout: crate::defaults::OP_TIMEOUT,
            warmup: true,
            orphan_policy: OrphanPolicy::Detach,
            percentiles: crate::defaults::REPORT_PERCENTILES.to_vec(),
        }
    }
}

impl BenchmarkConfig {
    /// Create benchmark configuration from CLI arguments
    ///
    /// Applies defaults where the arguments leave room for them and validates
    /// the result, so a config returned from here is ready to run.
    pub fn from_args(args: &Args) -> Result<Self> {
        let orphan_policy = match args.orphan_grace {
            Some(grace) => OrphanPolicy::Reap { grace },
            None => OrphanPolicy::Detach,
        };

        let config = Self {
            concurrency: args.concurrency,
            total: args.total,
            op_timeout: args.timeout,
            warmup: !args.no_warmup,
            orphan_policy,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a runnable benchmark.
    pub fn validate(&self) -> Result<(), BenchError> {
        validate_concurrency(self.concurrency)
            .and_then(|_| validate_total(self.total))
            .and_then(|_| validate_timeout(self.op_timeout))
            .map_err(|e| BenchError::InvalidConfig(e.to_string()))?;

        if let Some(p) = self
            .percentiles
            .iter()
            .find(|p| !(0.0..1.0).contains(*p))
        {
            return Err(BenchError::InvalidConfig(format!(
                "percentile {} is outside [0, 1)",
                p
            )));
        }
        Ok(())
    }
}

/// How a batch of timed-out handlers was disposed of.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanSummary {
    /// Calls that lost their timeout race, across warm-up and measure.
    pub timed_out: usize,
    /// Orphans that had finished by the time they were settled.
    pub finished: usize,
    /// Orphans left running in the background.
    pub detached: usize,
    /// Orphans aborted after the grace period.
    pub aborted: usize,
}

/// Everything a completed run produces.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub orphans: OrphanSummary,
}

/// Which unit method a bench phase drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Method {
    WarmUp,
    Run,
}

impl Method {
    async fn invoke(self, unit: &dyn Unit, cancel: CancellationToken) -> Result<()> {
        match self {
            Method::WarmUp => unit.warm_up(cancel).await,
            Method::Run => unit.run(cancel).await,
        }
    }

    fn phase(self) -> Phase {
        match self {
            Method::WarmUp => Phase::WarmUp,
            Method::Run => Phase::Measure,
        }
    }
}

/// Holds the join handles of handlers that outlived their deadline.
#[derive(Debug, Default)]
struct OrphanRegistry {
    state: Mutex<OrphanState>,
}

#[derive(Debug, Default)]
struct OrphanState {
    handles: Vec<JoinHandle<()>>,
    timed_out: usize,
    finished: usize,
}

impl OrphanRegistry {
    /// Track `handle`, dropping any earlier orphans that have since finished.
    fn adopt(&self, handle: JoinHandle<()>) {
        let mut state = self.state.lock();
        let before = state.handles.len();
        state.handles.retain(|h| !h.is_finished());
        state.finished += before - state.handles.len();
        state.timed_out += 1;
        state.handles.push(handle);
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.state.lock().handles.len()
    }

    async fn settle(&self, policy: OrphanPolicy) -> OrphanSummary {
        let state = std::mem::take(&mut *self.state.lock());
        let handles = state.handles;
        let mut summary = OrphanSummary {
            timed_out: state.timed_out,
            finished: state.finished,
            ..OrphanSummary::default()
        };

        match policy {
            OrphanPolicy::Detach => {
                summary.detached = handles.iter().filter(|h| !h.is_finished()).count();
                summary.finished += handles.len() - summary.detached;
                if summary.detached > 0 {
                    warn!(
                        "{} timed-out handler(s) are still running detached",
                        summary.detached
                    );
                }
                // Dropping a JoinHandle detaches the task.
            }
            OrphanPolicy::Reap { grace } => {
                let deadline = tokio::time::Instant::now() + grace;
                for mut handle in handles {
                    match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(_) => summary.finished += 1,
                        Err(_) => {
                            handle.abort();
                            summary.aborted += 1;
                        }
                    }
                }
                if summary.aborted > 0 {
                    warn!(
                        "Aborted {} handler(s) still running after {} grace",
                        summary.aborted,
                        format_duration(grace)
                    );
                }
            }
        }
        summary
    }
}

/// Drives a [`Unit`] through warm-up, begin, measure and end.
///
/// ## Examples
///
/// ```rust,no_run
/// use loadbench::{BenchRunner, BenchmarkConfig, Unit};
/// use std::sync::Arc;
/// # async fn demo(unit: Arc<dyn Unit>) -> anyhow::Result<()> {
/// let config = BenchmarkConfig {
///     concurrency: 8,
///     total: 10_000,
///     ..BenchmarkConfig::default()
/// };
/// let outcome = BenchRunner::new(config).run(unit).await?;
/// println!("p99: {:?}", outcome.report.percentile(0.99));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BenchRunner {
    config: BenchmarkConfig,
    clock: Arc<dyn Clock>,
    stats: StatsCollector,
}

impl BenchRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Use `clock` for every cost and wall-clock measurement.
    pub fn with_clock(config: BenchmarkConfig, clock: Arc<dyn Clock>) -> Self {
        let stats = StatsCollector::new(config.percentiles.clone());
        Self {
            config,
            clock,
            stats,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the full lifecycle against `unit`.
    ///
    /// A report is produced only if every phase completes. Failures of
    /// individual `warm_up` or `run` calls are part of the report; failures
    /// of `begin` or `end` are returned as [`BenchError::Lifecycle`].
    pub async fn run(&self, unit: Arc<dyn Unit>) -> Result<RunOutcome, BenchError> {
        self.config.validate()?;
        info!(
            "\n{}",
            BenchmarkConfigDisplay {
                config: &self.config
            }
        );

        let orphans = Arc::new(OrphanRegistry::default());
        let result = self.run_phases(&unit, &orphans).await;
        // Orphans are settled whether or not the phases succeeded.
        let summary = orphans.settle(self.config.orphan_policy).await;

        let report = result?;
        Ok(RunOutcome {
            report,
            orphans: summary,
        })
    }

    async fn run_phases(
        &self,
        unit: &Arc<dyn Unit>,
        orphans: &Arc<OrphanRegistry>,
    ) -> Result<Report, BenchError> {
        if self.config.warmup {
            let failures = self.bench_phase(Method::WarmUp, unit, None, orphans).await?;
            debug!(
                "Warm-up complete: {} of {} calls failed",
                failures, self.config.total
            );
        } else {
            debug!("Warm-up skipped");
        }

        unit.begin().await.map_err(|source| BenchError::Lifecycle {
            phase: Phase::Begin,
            source,
        })?;

        let records = Arc::new(Records::with_len(self.config.total));
        let start = self.clock.now();
        let failures = self
            .bench_phase(Method::Run, unit, Some(Arc::clone(&records)), orphans)
            .await?;
        let wall_clock = self.clock.now().saturating_duration_since(start);
        info!(
            "Measured {} operations in {} ({} failed)",
            self.config.total,
            format_duration(wall_clock),
            failures
        );

        unit.end().await.map_err(|source| BenchError::Lifecycle {
            phase: Phase::End,
            source,
        })?;

        let records = Arc::try_unwrap(records).map_err(|_| {
            BenchError::Worker("record sequence still shared after workers joined".to_string())
        })?;
        let entries = records.into_entries()?;
        Ok(self.stats.collect(&entries, wall_clock)?)
    }

    /// Issue `total` calls of `method` across `concurrency` workers.
    ///
    /// Returns the number of calls that failed.
    async fn bench_phase(
        &self,
        method: Method,
        unit: &Arc<dyn Unit>,
        records: Option<Arc<Records>>,
        orphans: &Arc<OrphanRegistry>,
    ) -> Result<usize, BenchError> {
        debug!(
            "Starting {} phase with {} workers",
            method.phase(),
            self.config.concurrency
        );

        let counter = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let mut workers = JoinSet::new();

        for id in 0..self.config.concurrency {
            let worker = Worker {
                id,
                method,
                total: self.config.total,
                op_timeout: self.config.op_timeout,
                unit: Arc::clone(unit),
                clock: Arc::clone(&self.clock),
                counter: Arc::clone(&counter),
                failures: Arc::clone(&failures),
                records: records.clone(),
                orphans: Arc::clone(orphans),
            };
            workers.spawn(worker.run());
        }

        while let Some(joined) = workers.join_next().await {
            let result = joined
                .map_err(|e| BenchError::Worker(format!("worker task failed: {}", e)))
                .and_then(|r| r);
            if let Err(e) = result {
                workers.abort_all();
                return Err(e);
            }
        }

        Ok(failures.load(Ordering::Relaxed))
    }
}

/// One of the `concurrency` tasks of a bench phase.
struct Worker {
    id: usize,
    method: Method,
    total: usize,
    op_timeout: Duration,
    unit: Arc<dyn Unit>,
    clock: Arc<dyn Clock>,
    counter: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    records: Option<Arc<Records>>,
    orphans: Arc<OrphanRegistry>,
}

impl Worker {
    async fn run(self) -> Result<(), BenchError> {
        let mut issued = 0usize;
        loop {
            let index = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            if index > self.total {
                break;
            }

            let entry = self.timed_call().await;
            if let Some(ref err) = entry.error {
                self.failures.fetch_add(1, Ordering::Relaxed);
                trace!(worker = self.id, index, "call failed: {}", err);
            }
            if let Some(ref records) = self.records {
                records.fill(index - 1, entry)?;
            }
            issued += 1;
        }
        trace!(worker = self.id, issued, "worker finished");
        Ok(())
    }

    /// Race one handler call against the operation deadline.
    ///
    /// The cost covers launching the handler through resolving the race, so a
    /// timed-out call costs roughly the timeout.
    async fn timed_call(&self) -> RecordEntry {
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let unit = Arc::clone(&self.unit);
        let method = self.method;
        let token = cancel.clone();

        let start = self.clock.now();
        let handle = tokio::spawn(async move {
            let result = method.invoke(unit.as_ref(), token).await;
            // The receiver is gone once the deadline has won.
            let _ = tx.send(result);
        });

        let error = tokio::select! {
            biased;
            delivered = rx => match delivered {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(OpError::from_unit(&err)),
                Err(_) => Some(OpError::Panicked),
            },
            _ = tokio::time::sleep(self.op_timeout) => {
                cancel.cancel();
                self.orphans.adopt(handle);
                Some(OpError::Timeout)
            }
        };
        let cost = self.clock.now().saturating_duration_since(start);

        RecordEntry { cost, error }
    }
}
