use anyhow::Result;
use async_trait::async_trait;
use loadbench::{BenchError, BenchRunner, BenchmarkConfig, Phase, Unit};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Records every lifecycle call it receives.
#[derive(Default)]
struct TracingUnit {
    fail_begin: bool,
    calls: Mutex<Vec<&'static str>>,
    runs: AtomicUsize,
}

#[async_trait]
impl Unit for TracingUnit {
    async fn warm_up(&self, _cancel: CancellationToken) -> Result<()> {
        self.calls.lock().push("warm_up");
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        self.calls.lock().push("begin");
        if self.fail_begin {
            anyhow::bail!("begin refused");
        }
        Ok(())
    }

    async fn run(&self, _cancel: CancellationToken) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push("run");
        Ok(())
    }

    async fn end(&self) -> Result<()> {
        self.calls.lock().push("end");
        Ok(())
    }
}

/// Always-successful unit at total 100 and concurrency 10.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn always_successful_unit_reports_every_operation() -> Result<()> {
    let unit = Arc::new(TracingUnit::default());
    let config = BenchmarkConfig {
        concurrency: 10,
        total: 100,
        ..BenchmarkConfig::default()
    };

    let outcome = BenchRunner::new(config).run(unit.clone()).await?;
    let report = outcome.report;
    assert_eq!(report.total_requests, 100);
    assert_eq!(report.total_errors, 0);
    assert_eq!(report.error_rate, 0.0);
    assert!(report.error_types.is_empty());
    assert_eq!(outcome.orphans.timed_out, 0);

    // Phases run strictly in order.
    let calls = unit.calls.lock();
    let begin = calls.iter().position(|c| *c == "begin").unwrap();
    let end = calls.iter().position(|c| *c == "end").unwrap();
    assert_eq!(calls.iter().filter(|c| **c == "warm_up").count(), 100);
    assert!(calls[..begin].iter().all(|c| *c == "warm_up"));
    assert!(calls[begin + 1..end].iter().all(|c| *c == "run"));
    assert_eq!(end, calls.len() - 1);
    Ok(())
}

/// A failing begin stops the run before anything is measured.
#[tokio::test(flavor = "multi_thread")]
async fn failing_begin_produces_no_report() {
    let unit = Arc::new(TracingUnit {
        fail_begin: true,
        ..TracingUnit::default()
    });
    let config = BenchmarkConfig {
        concurrency: 4,
        total: 20,
        ..BenchmarkConfig::default()
    };

    let err = BenchRunner::new(config).run(unit.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        BenchError::Lifecycle {
            phase: Phase::Begin,
            ..
        }
    ));
    assert_eq!(unit.runs.load(Ordering::SeqCst), 0);
    assert!(!unit.calls.lock().contains(&"end"));
}

/// Hands out one ticket per measured call.
#[derive(Default)]
struct TicketUnit {
    next: AtomicUsize,
    tickets: Mutex<Vec<usize>>,
}

#[async_trait]
impl Unit for TicketUnit {
    async fn warm_up(&self, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn run(&self, _cancel: CancellationToken) -> Result<()> {
        let ticket = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        self.tickets.lock().push(ticket);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn every_ticket_is_issued_exactly_once_under_contention() -> Result<()> {
    let unit = Arc::new(TicketUnit::default());
    let config = BenchmarkConfig {
        concurrency: 64,
        total: 5_000,
        ..BenchmarkConfig::default()
    };

    let report = BenchRunner::new(config).run(unit.clone()).await?.report;
    assert_eq!(report.total_requests, 5_000);

    let tickets = unit.tickets.lock();
    assert_eq!(tickets.len(), 5_000);
    let unique: HashSet<usize> = tickets.iter().copied().collect();
    assert_eq!(unique.len(), 5_000);
    assert_eq!(unique.iter().min(), Some(&1));
    assert_eq!(unique.iter().max(), Some(&5_000));
    Ok(())
}

#[tokio::test]
async fn concurrency_above_total_is_fine() -> Result<()> {
    let unit = Arc::new(TicketUnit::default());
    let config = BenchmarkConfig {
        concurrency: 16,
        total: 3,
        ..BenchmarkConfig::default()
    };

    let report = BenchRunner::new(config).run(unit.clone()).await?.report;
    assert_eq!(report.total_requests, 3);
    assert_eq!(unit.tickets.lock().len(), 3);
    Ok(())
}

#[tokio::test]
async fn zero_total_is_rejected_before_any_phase() {
    let unit = Arc::new(TracingUnit::default());
    let config = BenchmarkConfig {
        total: 0,
        ..BenchmarkConfig::default()
    };

    let err = BenchRunner::new(config).run(unit.clone()).await.unwrap_err();
    assert!(matches!(err, BenchError::InvalidConfig(_)));
    assert!(unit.calls.lock().is_empty());
}
