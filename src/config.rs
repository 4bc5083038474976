//! Configuration for the replay job.
//!
//! Configuration is passed to [`ReplayJob::spawn()`](crate::ReplayJob::spawn)
//! and can be constructed programmatically, deserialized from YAML/JSON, or
//! read from environment variables.
//!
//! # Quick Start
//!
//! ```rust
//! use event_replay::config::ReplayConfig;
//!
//! let config = ReplayConfig {
//!     job_name: "fhir-message-replay".into(),
//!     backoff: "2s".into(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! job_name: "fhir-message-replay"
//! backoff: "5s"
//! max_backoff: "2m"
//! backoff_factor: 2.0
//! idle_poll: "1s"
//! shutdown_timeout: "10s"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `REPLAY_JOB_NAME` | `job_name` | `event-replay` |
//! | `REPLAY_BACKOFF` | `backoff` | `5s` |
//! | `REPLAY_MAX_BACKOFF` | `max_backoff` | `5s` |
//! | `REPLAY_BACKOFF_FACTOR` | `backoff_factor` | `1.0` |
//! | `REPLAY_IDLE_POLL` | `idle_poll` | `1s` |
//! | `REPLAY_SHUTDOWN_TIMEOUT` | `shutdown_timeout` | `10s` |

use crate::error::{ReplayError, Result};
use crate::resilience::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for a single replay job.
///
/// Durations are human-readable strings ("5s", "500ms", "2m").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Name used in log spans and metric labels.
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// Wait after a failed cycle before querying the sink again.
    #[serde(default = "default_backoff")]
    pub backoff: String,

    /// Ceiling for the wait when `backoff_factor` > 1.0.
    #[serde(default = "default_backoff")]
    pub max_backoff: String,

    /// Growth of the wait per consecutive failure. 1.0 keeps it fixed.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Pause after a cycle that ended cleanly without publishing anything.
    ///
    /// A cycle that made progress restarts immediately.
    #[serde(default = "default_idle_poll")]
    pub idle_poll: String,

    /// How long `shutdown()` waits for the worker to reach a safe boundary
    /// before aborting it.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,
}

fn default_job_name() -> String {
    "event-replay".to_string()
}

fn default_backoff() -> String {
    "5s".to_string()
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_idle_poll() -> String {
    "1s".to_string()
}

fn default_shutdown_timeout() -> String {
    "10s".to_string()
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            backoff: default_backoff(),
            max_backoff: default_backoff(),
            backoff_factor: default_backoff_factor(),
            idle_poll: default_idle_poll(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ReplayConfig {
    /// Create a config with short timings for tests.
    pub fn for_testing(job_name: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            backoff: "10ms".to_string(),
            max_backoff: "10ms".to_string(),
            backoff_factor: 1.0,
            idle_poll: "10ms".to_string(),
            shutdown_timeout: "1s".to_string(),
        }
    }

    /// Build a config from `REPLAY_*` environment variables.
    ///
    /// Unset variables fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by `from_env`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let backoff_factor = match lookup("REPLAY_BACKOFF_FACTOR") {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                ReplayError::Config(format!("REPLAY_BACKOFF_FACTOR is not a number: {raw:?}"))
            })?,
            None => defaults.backoff_factor,
        };

        let backoff = lookup("REPLAY_BACKOFF").unwrap_or(defaults.backoff);
        let config = Self {
            job_name: lookup("REPLAY_JOB_NAME").unwrap_or(defaults.job_name),
            // An unset ceiling follows the configured interval
            max_backoff: lookup("REPLAY_MAX_BACKOFF").unwrap_or_else(|| backoff.clone()),
            backoff,
            backoff_factor,
            idle_poll: lookup("REPLAY_IDLE_POLL").unwrap_or(defaults.idle_poll),
            shutdown_timeout: lookup("REPLAY_SHUTDOWN_TIMEOUT").unwrap_or(defaults.shutdown_timeout),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that every duration parses and the combination makes sense.
    pub fn validate(&self) -> Result<()> {
        if self.job_name.trim().is_empty() {
            return Err(ReplayError::Config("job_name must not be empty".to_string()));
        }

        let backoff = parse_duration("backoff", &self.backoff)?;
        let max_backoff = parse_duration("max_backoff", &self.max_backoff)?;
        let idle_poll = parse_duration("idle_poll", &self.idle_poll)?;
        let shutdown_timeout = parse_duration("shutdown_timeout", &self.shutdown_timeout)?;

        if backoff.is_zero() {
            return Err(ReplayError::Config("backoff must be greater than zero".to_string()));
        }
        if max_backoff < backoff {
            return Err(ReplayError::Config(format!(
                "max_backoff ({}) must not be shorter than backoff ({})",
                self.max_backoff, self.backoff
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ReplayError::Config(format!(
                "backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        // Zero would turn an empty source into a hot loop
        if idle_poll.is_zero() {
            return Err(ReplayError::Config("idle_poll must be greater than zero".to_string()));
        }
        if shutdown_timeout.is_zero() {
            return Err(ReplayError::Config(
                "shutdown_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Backoff schedule derived from the duration strings.
    ///
    /// Unparsable values fall back to the defaults; call
    /// [`validate()`](Self::validate) first to reject them instead.
    pub fn backoff_config(&self) -> BackoffConfig {
        let initial_delay = humantime::parse_duration(&self.backoff).unwrap_or(Duration::from_secs(5));
        let max_delay = humantime::parse_duration(&self.max_backoff)
            .unwrap_or(initial_delay)
            .max(initial_delay);

        BackoffConfig {
            initial_delay,
            max_delay,
            backoff_factor: self.backoff_factor.max(1.0),
        }
    }

    /// Parse the idle_poll string to a Duration.
    pub fn idle_poll_duration(&self) -> Duration {
        humantime::parse_duration(&self.idle_poll).unwrap_or(Duration::from_secs(1))
    }

    /// Parse the shutdown_timeout string to a Duration.
    pub fn shutdown_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.shutdown_timeout).unwrap_or(Duration::from_secs(10))
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| ReplayError::Config(format!("{field} {value:?} is not a duration: {e}")))
}
