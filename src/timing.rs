//! Execution timing for debug logging.

use std::time::{Duration, Instant};
use tracing::debug;

/// Logs how long a scope took when dropped.
///
/// ```ignore
/// let _timer = ExecutionTimer::new("collection.count");
/// ```
pub struct ExecutionTimer {
    name: &'static str,
    started: Instant,
}

impl ExecutionTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ExecutionTimer {
    fn drop(&mut self) {
        debug!(
            operation = self.name,
            elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0,
            "Execution finished"
        );
    }
}
