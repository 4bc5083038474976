//! Backoff between failed replay cycles.
//!
//! After a source or sink fault the job waits before starting the next
//! cycle, so a broken dependency produces one log line per interval instead
//! of a tight error loop.
//!
//! The default is a fixed 5 second wait. Setting `backoff_factor` above 1.0
//! turns it into capped exponential backoff.
//!
//! # Example
//!
//! ```rust
//! use event_replay::resilience::BackoffConfig;
//! use std::time::Duration;
//!
//! let fixed = BackoffConfig::default();
//! assert_eq!(fixed.delay_for_attempt(1), Duration::from_secs(5));
//! assert_eq!(fixed.delay_for_attempt(50), Duration::from_secs(5));
//! ```

use std::time::Duration;

/// Delay schedule between failed cycles.
///
/// Retries never stop; there is no attempt limit.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure. Also the minimum delay.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (1.0 = fixed interval, 2.0 = double each retry).
    pub backoff_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl BackoffConfig {
    /// Same delay after every failure.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            backoff_factor: 1.0,
        }
    }

    /// Exponential backoff for a long-running service.
    ///
    /// # Backoff Schedule
    ///
    /// ```text
    /// Attempt  Delay
    /// -------  -----
    /// 1        5s
    /// 2        10s
    /// 3        20s
    /// 4        40s
    /// 5        80s
    /// 6+       120s (cap, retry forever)
    /// ```
    pub fn daemon() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            backoff_factor: 2.0,
        }
    }

    /// Short fixed delay for tests.
    pub fn testing() -> Self {
        Self::fixed(Duration::from_millis(10))
    }

    /// Calculate delay for a given attempt number (1-indexed).
    ///
    /// Never shorter than `initial_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.backoff_factor <= 1.0 {
            return self.initial_delay;
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let multiplier = self.backoff_factor.powi(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;

        // powi overflows to inf long before u32::MAX attempts
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay.max(self.initial_delay);
        }

        Duration::from_secs_f64(delay_secs).max(self.initial_delay)
    }
}
