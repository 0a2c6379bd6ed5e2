//! Phase timing and slow-query reporting
//!
//! A request records the elapsed time of each phase. When it completes the
//! timings are emitted as one `phase_timing` event, and as a `slow_query`
//! warning when the total exceeds the configured threshold.

use std::fmt;
use std::time::{Duration, Instant};

use super::events::Event;

/// Request phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Count,
    Fetch,
    Hydrate,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Resolve => "resolve",
            Phase::Count => "count",
            Phase::Fetch => "fetch",
            Phase::Hydrate => "hydrate",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elapsed time per phase of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    resolve: Duration,
    count: Duration,
    fetch: Duration,
    hydrate: Duration,
}

impl PhaseTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add elapsed time to a phase
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        *self.slot(phase) += elapsed;
    }

    pub fn get(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Resolve => self.resolve,
            Phase::Count => self.count,
            Phase::Fetch => self.fetch,
            Phase::Hydrate => self.hydrate,
        }
    }

    pub fn total(&self) -> Duration {
        self.resolve + self.count + self.fetch + self.hydrate
    }

    /// Emit the timings for a finished request.
    ///
    /// Returns true when the request was slow.
    pub fn report(&self, collection: &str, slow_threshold: Duration) -> bool {
        let total = self.total();
        tracing::debug!(
            target: "pagewise::timing",
            event = Event::PhaseTiming.as_str(),
            collection,
            resolve_ms = millis(self.resolve),
            count_ms = millis(self.count),
            fetch_ms = millis(self.fetch),
            hydrate_ms = millis(self.hydrate),
            total_ms = millis(total),
            "pagination phases"
        );

        let slow = total > slow_threshold;
        if slow {
            tracing::warn!(
                target: "pagewise::slow_query",
                event = Event::SlowQuery.as_str(),
                collection,
                elapsed_ms = millis(total),
                threshold_ms = millis(slow_threshold),
                count_ms = millis(self.count),
                fetch_ms = millis(self.fetch),
                "slow paginated query"
            );
        }
        slow
    }

    fn slot(&mut self, phase: Phase) -> &mut Duration {
        match phase {
            Phase::Resolve => &mut self.resolve,
            Phase::Count => &mut self.count,
            Phase::Fetch => &mut self.fetch,
            Phase::Hydrate => &mut self.hydrate,
        }
    }
}

/// A simple duration timer for one phase
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the elapsed time into `timings`
    pub fn stop(self, timings: &mut PhaseTimings, phase: Phase) {
        timings.record(phase, self.elapsed());
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}
