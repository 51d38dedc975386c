//! Job counters
//!
//! Process-lifetime tallies owned by the driver and threaded by mutable
//! reference into the components that update them. No ambient globals.

use serde::Serialize;
use std::collections::VecDeque;

/// How many recent error messages the ring keeps.
const ERROR_RING_CAPACITY: usize = 10;

/// Cumulative run state, updated as records flow through.
#[derive(Debug, Default)]
pub struct JobCounters {
    /// Records retrieved from the search API so far
    pub total_retrieved: u64,
    /// Records classified as Twitter
    pub total_twitter: u64,
    /// Tweet ids still unresolved after the retry budget
    pub twitter_errors: u64,
    /// Records written to the output file
    pub total_saved: u64,
    /// Required credits reported by the estimator (for progress logs)
    pub required_credits: i64,
    /// Most recent error messages, oldest evicted first
    latest_errors: VecDeque<String>,
}

impl JobCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an error message, evicting the oldest past capacity.
    pub fn log_error(&mut self, message: impl Into<String>) {
        self.latest_errors.push_back(message.into());
        if self.latest_errors.len() > ERROR_RING_CAPACITY {
            self.latest_errors.pop_front();
        }
    }

    pub fn latest_errors(&self) -> impl Iterator<Item = &str> {
        self.latest_errors.iter().map(String::as_str)
    }

    pub fn has_errors(&self) -> bool {
        !self.latest_errors.is_empty()
    }

    /// Snapshot for status logging.
    pub fn status(&self) -> JobStatus {
        JobStatus {
            total_retrieved: self.total_retrieved,
            total_twitter: self.total_twitter,
            twitter_errors: self.twitter_errors,
            total_saved: self.total_saved,
            latest_errors: self.latest_errors.iter().cloned().collect(),
        }
    }
}

/// Serializable snapshot of the counters for log lines.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub total_retrieved: u64,
    pub total_twitter: u64,
    pub twitter_errors: u64,
    pub total_saved: u64,
    pub latest_errors: Vec<String>,
}
