//! Attempt history of an endpoint.
//!
//! Each request or health check appends an immutable [`AttemptRecord`]. The
//! "timed out on last request" flag and discovery round eligibility are pure functions of
//! that history.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

const ATTEMPT_HISTORY_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
    Succeeded,
    TimedOut,
    Failed,
}

/// One request or health check against an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Sequence number of the attempt, starting at 1
    pub attempt: u32,
    /// Discovery round the attempt belonged to, `None` outside discovery
    pub round: Option<u32>,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

/// Bounded ring buffer of the most recent attempts.
#[derive(Debug, Clone, Default)]
pub struct AttemptHistory {
    records: VecDeque<AttemptRecord>,
    total: u32,
}

impl AttemptHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and returns it.
    pub fn record(&mut self, round: Option<u32>, outcome: AttemptOutcome) -> AttemptRecord {
        self.total = self.total.saturating_add(1);
        let record = AttemptRecord { attempt: self.total, round, outcome, at: Utc::now() };

        self.records.push_back(record.clone());
        if self.records.len() > ATTEMPT_HISTORY_SIZE {
            self.records.pop_front();
        }
        record
    }

    #[must_use]
    pub fn last(&self) -> Option<&AttemptRecord> {
        self.records.back()
    }

    /// Total number of attempts ever recorded, including evicted ones.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn timed_out_last(&self) -> bool {
        self.last().is_some_and(|r| r.outcome == AttemptOutcome::TimedOut)
    }

    #[must_use]
    pub fn attempted_in_round(&self, round: u32) -> bool {
        self.records.iter().any(|r| r.round == Some(round))
    }
}

/// Whether an unconfirmed candidate may be checked in `round`.
///
/// A candidate is eligible when it has not been tried in this round and it was either never
/// tried or its last attempt timed out. Nodes that failed outright are not retried.
#[must_use]
pub fn is_eligible(history: &AttemptHistory, round: u32) -> bool {
    if history.attempted_in_round(round) {
        return false;
    }
    match history.last() {
        None => true,
        Some(record) => record.outcome == AttemptOutcome::TimedOut,
    }
}
