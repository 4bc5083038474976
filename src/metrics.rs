//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Replay cycles and how they ended
//! - Events published and publish latency
//! - Faults by collaborator
//! - Backoff waits
//! - Job lifecycle state
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replay_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration)
//!
//! Nothing is recorded unless the embedding service installs a recorder.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the start of a replay cycle.
pub fn record_cycle_started(job: &str) {
    counter!("replay_cycles_total", "job" => job.to_string()).increment(1);
}

/// Record how a replay cycle ended ("exhausted", "failed", "stopped").
pub fn record_cycle_outcome(job: &str, outcome: &'static str) {
    counter!("replay_cycle_outcomes_total", "job" => job.to_string(), "outcome" => outcome).increment(1);
}

/// Record one event accepted by the sink.
pub fn record_event_published(job: &str, latency: Duration) {
    counter!("replay_events_published_total", "job" => job.to_string()).increment(1);
    histogram!("replay_publish_duration_seconds", "job" => job.to_string())
        .record(latency.as_secs_f64());
}

/// Record the offset of the last event the job saw accepted.
pub fn record_last_published_offset(job: &str, offset: u64) {
    gauge!("replay_last_published_offset", "job" => job.to_string()).set(offset as f64);
}

/// Record the offset a cycle resumed from.
pub fn record_resume_offset(job: &str, offset: u64) {
    gauge!("replay_resume_offset", "job" => job.to_string()).set(offset as f64);
}

/// Record a fault that ended a cycle.
pub fn record_fault(job: &str, kind: &'static str) {
    counter!("replay_faults_total", "job" => job.to_string(), "kind" => kind).increment(1);
}

/// Record a backoff wait before retrying.
pub fn record_backoff(job: &str, delay: Duration) {
    counter!("replay_backoffs_total", "job" => job.to_string()).increment(1);
    histogram!("replay_backoff_duration_seconds", "job" => job.to_string())
        .record(delay.as_secs_f64());
}

/// Record consecutive failed cycles (0 after a healthy cycle).
pub fn set_consecutive_failures(job: &str, count: u32) {
    gauge!("replay_consecutive_failures", "job" => job.to_string()).set(count as f64);
}

/// Set job lifecycle state as a numeric gauge.
///
/// Running=1, BackingOff=2, Stopping=3, Stopped=4.
pub fn set_job_state(job: &str, state: &str) {
    let value = match state {
        "Running" => 1.0,
        "BackingOff" => 2.0,
        "Stopping" => 3.0,
        "Stopped" => 4.0,
        _ => 0.0,
    };
    gauge!("replay_job_state", "job" => job.to_string()).set(value);
}
