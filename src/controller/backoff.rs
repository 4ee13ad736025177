//! # Exponential Backoff
//!
//! Progressive retry delay for transient reconcile failures.
//!
//! Each call doubles the delay until it reaches the cap, e.g. with a 5s start and a
//! 300s cap: 5s, 10s, 20s, 40s, 80s, 160s, 300s, 300s, ...
//!
//! ## Usage
//!
//! ```rust
//! use external_secrets_controller::controller::backoff::ExponentialBackoff;
//!
//! let mut backoff = ExponentialBackoff::new(5, 300);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! assert_eq!(backoff.next_backoff_seconds(), 20);
//! ```

use std::time::Duration;

/// Exponential backoff calculator, capped at a maximum
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Starting delay in seconds (for reset)
    start_seconds: u64,
    /// Delay returned by the next call
    current_seconds: u64,
    /// Maximum delay in seconds
    max_seconds: u64,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at `start_seconds` and capped at `max_seconds`
    ///
    /// A zero start is treated as one second so the sequence always grows.
    #[must_use]
    pub fn new(start_seconds: u64, max_seconds: u64) -> Self {
        let start_seconds = start_seconds.max(1);
        let max_seconds = max_seconds.max(start_seconds);
        Self {
            start_seconds,
            current_seconds: start_seconds,
            max_seconds,
        }
    }

    /// Get the next delay in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;
        self.current_seconds = self
            .current_seconds
            .saturating_mul(2)
            .min(self.max_seconds);
        result
    }

    /// Get the next delay as a `Duration` and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current_seconds = self.start_seconds;
    }
}
