//! Error types shared by the runner, the record sequence and the statistics.

use crate::stats::StatsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Outcome of a single measured call that did not succeed.
///
/// These are recorded per operation and never abort a run. The `Display`
/// text is what the report groups error types by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum OpError {
    /// The call did not resolve before the per-operation deadline.
    #[error("timeout")]
    Timeout,

    /// The unit returned an error.
    #[error("{0}")]
    Failed(String),

    /// The handler task went away without delivering a result.
    #[error("handler panicked")]
    Panicked,
}

impl OpError {
    /// Capture a unit error, keeping the whole context chain in the message.
    pub fn from_unit(err: &anyhow::Error) -> Self {
        OpError::Failed(format!("{:#}", err))
    }
}

/// The fixed sequence a run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    WarmUp,
    Begin,
    Measure,
    End,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::WarmUp => write!(f, "warm-up"),
            Phase::Begin => write!(f, "begin"),
            Phase::Measure => write!(f, "measure"),
            Phase::End => write!(f, "end"),
        }
    }
}

/// Errors that stop a run without producing a report.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid benchmark configuration: {0}")]
    InvalidConfig(String),

    /// `begin` or `end` failed; these are fatal by contract.
    #[error("{phase} phase failed: {source:#}")]
    Lifecycle {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    /// A worker task died or broke the one-write-per-slot rule.
    #[error("worker failure: {0}")]
    Worker(String),

    #[error(transparent)]
    Stats(#[from] StatsError),
}

impl BenchError {
    /// The phase that failed, for lifecycle errors.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            BenchError::Lifecycle { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_op_error_messages() {
        assert_eq!(OpError::Timeout.to_string(), "timeout");
        assert_eq!(OpError::Panicked.to_string(), "handler panicked");
        assert_eq!(
            OpError::Failed("no connection".to_string()).to_string(),
            "no connection"
        );
    }

    #[test]
    fn test_from_unit_keeps_context_chain() {
        let err = Err::<(), _>(anyhow::anyhow!("connection reset"))
            .context("echo round trip")
            .unwrap_err();
        assert_eq!(
            OpError::from_unit(&err),
            OpError::Failed("echo round trip: connection reset".to_string())
        );
    }

    #[test]
    fn test_lifecycle_error_reports_phase() {
        let err = BenchError::Lifecycle {
            phase: Phase::Begin,
            source: anyhow::anyhow!("server unreachable"),
        };
        assert_eq!(err.phase(), Some(Phase::Begin));
        assert_eq!(err.to_string(), "begin phase failed: server unreachable");
        assert_eq!(BenchError::Worker("x".into()).phase(), None);
    }
}
