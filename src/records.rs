//! Per-operation outcomes collected during the measured phase.

use crate::error::{BenchError, OpError};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Cost and outcome of one measured call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub cost: Duration,
    pub error: Option<OpError>,
}

impl RecordEntry {
    pub fn success(cost: Duration) -> Self {
        Self { cost, error: None }
    }

    pub fn failure(cost: Duration, error: OpError) -> Self {
        Self {
            cost,
            error: Some(error),
        }
    }

    pub fn cost_ns(&self) -> u64 {
        self.cost.as_nanos() as u64
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Pre-sized sequence of write-once slots shared by all workers of a phase.
///
/// Slot `i` belongs to whichever worker claimed operation `i + 1`; a second
/// write to the same slot is reported as a worker failure.
#[derive(Debug)]
pub struct Records {
    slots: Box<[OnceLock<RecordEntry>]>,
}

impl Records {
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Store the outcome for slot `index`.
    pub fn fill(&self, index: usize, entry: RecordEntry) -> Result<(), BenchError> {
        let slot = self.slots.get(index).ok_or_else(|| {
            BenchError::Worker(format!(
                "record index {} out of range for {} slots",
                index,
                self.slots.len()
            ))
        })?;
        slot.set(entry)
            .map_err(|_| BenchError::Worker(format!("record slot {} written twice", index)))
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Consume the sequence once every slot has been written.
    pub fn into_entries(self) -> Result<Vec<RecordEntry>, BenchError> {
        let len = self.slots.len();
        self.slots
            .into_vec()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.into_inner().ok_or_else(|| {
                    BenchError::Worker(format!(
                        "record slot {} of {} was never written",
                        index, len
                    ))
                })
            })
            .collect()
    }
}
