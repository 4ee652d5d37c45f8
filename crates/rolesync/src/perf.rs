//! Execution timing.

use std::future::Future;
use std::time::{Duration, Instant};

/// Accumulates time spent in timed futures.
#[derive(Debug, Default, Clone)]
pub struct StopWatch {
    total: Duration,
    count: usize,
}

impl StopWatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Awaits `future`, adding its duration to the total.
    pub async fn time_it<F: Future>(&mut self, future: F) -> (F::Output, Duration) {
        let start = Instant::now();
        let output = future.await;
        let elapsed = start.elapsed();
        self.total += elapsed;
        self.count += 1;
        (output, elapsed)
    }

    /// Total time spent in timed futures.
    #[must_use]
    pub const fn total(&self) -> Duration {
        self.total
    }

    /// Number of timed futures.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }
}
