//! Lightweight performance timing utilities.
//!
//! Coarse wall-clock timers for the setup and evaluation stages. Enabled
//! via the `HC_TIMING` environment variable or programmatically; results
//! go to the `tracing` log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("HC_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Elapsed time in seconds, regardless of whether timing is enabled.
    pub fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }

    /// Stop the timer and log the result if enabled.
    pub fn stop_and_log(self) {
        let label = self.label;
        if let Some(elapsed) = self.stop() {
            tracing::info!(stage = label, elapsed_s = elapsed, "timing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_timer_reports_elapsed() {
        enable_timing();
        let t = Timer::start("test");
        let elapsed = t.stop();
        disable_timing();
        assert!(elapsed.is_some_and(|s| s >= 0.0));
    }
}
