//! Polling policy.
//!
//! One [`PollPolicy`] value describes every wait in the harness: container
//! readiness, replication catch-up, and promotion.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;

/// Shortest sleep between attempts; smaller configured intervals are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Interval, bounds, and success streak for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Sleep between attempts.
    pub interval: Duration,
    /// Give up after this much total time.
    pub timeout: Duration,
    /// Give up after this many attempts, if set.
    pub max_attempts: Option<u32>,
    /// Consecutive successful probes required before declaring readiness.
    pub consecutive_successes: u32,
}

impl PollPolicy {
    /// First boot of a fresh data directory: 120s total, 2s interval.
    pub fn first_boot() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
            max_attempts: None,
            consecutive_successes: 3,
        }
    }

    /// Replica catch-up: 120s total, 5s interval.
    pub fn replication() -> Self {
        Self {
            interval: Duration::from_secs(5),
            ..Self::first_boot()
        }
    }

    /// Standby promotion: 60s total, 1s interval.
    pub fn promotion() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            max_attempts: None,
            consecutive_successes: 1,
        }
    }

    /// Short bounds for tests.
    pub fn quick() -> Self {
        Self {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(500),
            max_attempts: None,
            consecutive_successes: 1,
        }
    }

    /// Looks up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "first_boot" => Some(Self::first_boot()),
            "replication" => Some(Self::replication()),
            "promotion" => Some(Self::promotion()),
            "quick" => Some(Self::quick()),
            _ => None,
        }
    }

    /// Sets the interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the total timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps the number of attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the required success streak (at least 1).
    pub fn consecutive_successes(mut self, n: u32) -> Self {
        self.consecutive_successes = n.max(1);
        self
    }

    /// Calls `probe` until it finishes, the bounds run out, or `cancel` fires.
    ///
    /// `probe` receives the 1-based attempt number.
    pub fn poll_until<T, E, F>(&self, cancel: &CancellationToken, mut probe: F) -> Result<T, PollError<E>>
    where
        F: FnMut(u32) -> PollStep<T, E>,
    {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }
            attempt += 1;
            match probe(attempt) {
                PollStep::Done(value) => return Ok(value),
                PollStep::Abort(e) => return Err(PollError::Aborted(e)),
                PollStep::Pending => {}
            }

            let elapsed = start.elapsed();
            let out_of_attempts = self.max_attempts.is_some_and(|max| attempt >= max);
            if out_of_attempts || elapsed >= self.timeout {
                return Err(PollError::TimedOut { attempts: attempt, elapsed });
            }

            let remaining = self.timeout - elapsed;
            if !cancel.sleep(self.interval.max(MIN_POLL_INTERVAL).min(remaining)) {
                return Err(PollError::Cancelled);
            }
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::first_boot()
    }
}

/// What one probe attempt observed.
#[derive(Debug)]
pub enum PollStep<T, E> {
    /// Finished with a value.
    Done(T),
    /// Not yet; try again after the interval.
    Pending,
    /// Stop polling with an error.
    Abort(E),
}

/// Why a poll loop ended without a value.
#[derive(Debug)]
pub enum PollError<E> {
    /// Bounds ran out.
    TimedOut { attempts: u32, elapsed: Duration },
    /// The run was cancelled.
    Cancelled,
    /// The probe aborted.
    Aborted(E),
}
