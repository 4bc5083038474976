//! The replay worker loop.
//!
//! Each cycle:
//! 1. Asks the sink for its latest accepted offset
//! 2. Opens a read on the source strictly after that offset
//! 3. Publishes every event to the sink, in order, one at a time
//! 4. On a fault: logs it, backs off, and starts over at step 1
//! 5. On a clean end of stream: starts over at step 1, immediately if the
//!    cycle published anything, otherwise after the idle poll interval
//!
//! The resume offset is always re-queried from the sink. Nothing about the
//! position survives a cycle inside the worker.
//!
//! A panic raised by the source or the sink inside a cycle is caught and
//! handled like any other fault: logged, backed off, retried.
//!
//! # Graceful Shutdown
//!
//! The worker uses `tokio::select!` to respond to the stop signal while it
//! waits for the sink's offset, for the next stream item, and during the
//! backoff and idle waits. A publish call already in flight is never raced
//! against the signal: the worker finishes it, then stops before pulling the
//! next event.

use super::types::{CycleOutcome, JobState};
use crate::error::ReplayError;
use crate::event::Event;
use crate::metrics;
use crate::resilience::BackoffConfig;
use crate::sink::EventSink;
use crate::source::EventSource;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Run replay cycles until a stop is requested.
///
/// Dropping every `shutdown_rx` sender counts as a stop request.
pub(crate) async fn run_replay<S: EventSource, K: EventSink>(
    source: Arc<S>,
    sink: Arc<K>,
    job_name: String,
    backoff: BackoffConfig,
    idle_poll: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    state_tx: Arc<watch::Sender<JobState>>,
) {
    let span = info_span!("replay_job", job = %job_name);

    async move {
        let _exit = ExitGuard::new(Arc::clone(&state_tx), &job_name);
        info!("Starting replay worker");

        let mut consecutive_failures: u32 = 0;

        loop {
            if stop_signalled(&shutdown_rx) {
                break;
            }
            transition(&state_tx, &job_name, JobState::Running);

            let cycle = run_cycle(&*source, &*sink, &job_name, &mut shutdown_rx);
            let outcome = match AssertUnwindSafe(cycle).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => CycleOutcome::Failed {
                    resume_from: None,
                    failed_at: None,
                    published: 0,
                    error: ReplayError::Internal(format!(
                        "replay cycle panicked: {}",
                        panic_message(panic.as_ref())
                    )),
                },
            };
            metrics::record_cycle_outcome(&job_name, outcome.label());

            match outcome {
                CycleOutcome::Exhausted { published, last_offset } => {
                    consecutive_failures = 0;
                    metrics::set_consecutive_failures(&job_name, 0);

                    if published > 0 {
                        debug!(
                            published,
                            last_offset = %last_offset,
                            "Event stream ended, starting next cycle"
                        );
                        continue;
                    }

                    // Caught up and the source closed its stream: poll again later
                    debug!(
                        last_offset = %last_offset,
                        idle_poll_ms = idle_poll.as_millis() as u64,
                        "Nothing new to replay, pausing before next cycle"
                    );
                    if !sleep_or_stop(idle_poll, &mut shutdown_rx).await {
                        info!("Stop requested while idle");
                        break;
                    }
                }
                CycleOutcome::Stopped { published } => {
                    debug!(published, "Stop requested during cycle");
                    break;
                }
                CycleOutcome::Failed {
                    resume_from,
                    failed_at,
                    published,
                    error: err,
                } => {
                    // Progress was made, so this is a fresh failure streak
                    if published > 0 {
                        consecutive_failures = 0;
                    }
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    metrics::record_fault(&job_name, err.kind());
                    metrics::set_consecutive_failures(&job_name, consecutive_failures);

                    let delay = backoff.delay_for_attempt(consecutive_failures);
                    let resume_from = resume_from.map(|o| o.to_string());
                    let failed_at = failed_at.map(|o| o.to_string());

                    if err.is_retryable() {
                        warn!(
                            error = %err,
                            kind = err.kind(),
                            resume_from = resume_from.as_deref().unwrap_or("unknown"),
                            failed_at = failed_at.as_deref().unwrap_or("none"),
                            published,
                            consecutive_failures,
                            backoff_ms = delay.as_millis() as u64,
                            "Error while publishing to message bus, backing off"
                        );
                    } else {
                        error!(
                            error = %err,
                            kind = err.kind(),
                            resume_from = resume_from.as_deref().unwrap_or("unknown"),
                            failed_at = failed_at.as_deref().unwrap_or("none"),
                            published,
                            consecutive_failures,
                            backoff_ms = delay.as_millis() as u64,
                            "Unexpected error in replay cycle, backing off"
                        );
                    }

                    transition(&state_tx, &job_name, JobState::BackingOff);
                    metrics::record_backoff(&job_name, delay);

                    if !sleep_or_stop(delay, &mut shutdown_rx).await {
                        info!("Stop requested during backoff");
                        break;
                    }
                }
            }
        }

        info!("Replay worker stopped");
    }
    .instrument(span)
    .await
}

/// Run one cycle: resume from the sink's offset and publish until the
/// stream ends, a fault occurs, or a stop is requested.
async fn run_cycle<S: EventSource, K: EventSink>(
    source: &S,
    sink: &K,
    job_name: &str,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> CycleOutcome {
    metrics::record_cycle_started(job_name);

    // The offset query has no side effects, so it is safe to abandon
    let queried = tokio::select! {
        biased;
        _ = stop_requested(shutdown_rx) => {
            return CycleOutcome::Stopped { published: 0 };
        }
        result = sink.latest_accepted_offset() => result,
    };

    let resume_from = match queried {
        Ok(offset) => offset,
        Err(error) => {
            return CycleOutcome::Failed {
                resume_from: None,
                failed_at: None,
                published: 0,
                error,
            };
        }
    };

    metrics::record_resume_offset(job_name, resume_from.value());
    debug!(resume_from = %resume_from, "Resuming from sink offset");

    let mut stream = source.read(resume_from);
    let mut published: u64 = 0;
    let mut last_offset = resume_from;

    loop {
        // Priority: a pending stop wins over pulling the next event
        let next = tokio::select! {
            biased;
            _ = stop_requested(shutdown_rx) => {
                return CycleOutcome::Stopped { published };
            }
            item = stream.next() => item,
        };

        let event = match next {
            None => {
                return CycleOutcome::Exhausted {
                    published,
                    last_offset,
                };
            }
            Some(Err(error)) => {
                return CycleOutcome::Failed {
                    resume_from: Some(resume_from),
                    failed_at: None,
                    published,
                    error,
                };
            }
            Some(Ok(event)) => event,
        };

        let offset = event.offset();
        if offset <= last_offset {
            warn!(
                offset = %offset,
                previous = %last_offset,
                "Source yielded an offset out of order, publishing anyway"
            );
        }

        // Not raced against the stop signal: a publish always runs to completion
        let span = event_span(job_name, &event);
        let start = Instant::now();
        let result = sink.publish(event).instrument(span).await;

        match result {
            Ok(()) => {
                published += 1;
                last_offset = offset;
                metrics::record_event_published(job_name, start.elapsed());
                metrics::record_last_published_offset(job_name, offset.value());
            }
            Err(error) => {
                return CycleOutcome::Failed {
                    resume_from: Some(resume_from),
                    failed_at: Some(offset),
                    published,
                    error,
                };
            }
        }
    }
}

/// Span for a single publish, carrying the upstream trace id when present.
fn event_span(job_name: &str, event: &Event) -> tracing::Span {
    match event.trace_id() {
        Some(trace_id) => info_span!(
            "publish_event",
            job = %job_name,
            offset = %event.offset(),
            trace_id = %trace_id,
            parent_span_id = event.parent_span_id().unwrap_or("none"),
        ),
        None => info_span!("publish_event", job = %job_name, offset = %event.offset()),
    }
}

/// Best-effort text of a caught panic.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Wait out a backoff or idle delay unless a stop arrives first.
///
/// Returns `true` if the full delay elapsed, `false` if a stop was requested.
pub(crate) async fn sleep_or_stop(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = stop_requested(shutdown_rx) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Resolves once a stop is requested or the job handle is gone.
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

fn stop_signalled(shutdown_rx: &watch::Receiver<bool>) -> bool {
    *shutdown_rx.borrow() || shutdown_rx.has_changed().is_err()
}

/// Marks the job `Stopped` when the worker exits, however it exits.
///
/// Keeps `ReplayJob::state()` honest if the worker dies outside a cycle.
struct ExitGuard {
    state_tx: Arc<watch::Sender<JobState>>,
    job_name: String,
}

impl ExitGuard {
    fn new(state_tx: Arc<watch::Sender<JobState>>, job_name: &str) -> Self {
        Self {
            state_tx,
            job_name: job_name.to_string(),
        }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(job = %self.job_name, "Replay worker died unexpectedly");
        }
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == JobState::Stopped {
                return false;
            }
            *state = JobState::Stopped;
            true
        });
        if changed {
            metrics::set_job_state(&self.job_name, "Stopped");
        }
    }
}

/// Move to `next` unless a stop is already under way.
fn transition(state_tx: &watch::Sender<JobState>, job_name: &str, next: JobState) {
    let changed = state_tx.send_if_modified(|state| {
        if state.is_terminating() || *state == next {
            return false;
        }
        *state = next;
        true
    });
    if changed {
        metrics::set_job_state(job_name, &next.to_string());
    }
}
