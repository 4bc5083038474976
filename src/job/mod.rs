// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Continuous replay job.
//!
//! Keeps a message bus synchronized with the event store:
//! - Position lives in the sink ([`crate::sink::EventSink`]), never in the job
//! - Events come from the source ([`crate::source::EventSource`]) in order
//! - Faults are logged and retried forever after a backoff
//! - Shutdown waits for the worker to reach a safe boundary
//!
//! # Lifecycle
//!
//! The job starts when it is spawned. [`ReplayJob::shutdown()`] is the only
//! other lifecycle operation: it signals the worker, waits for it (bounded
//! by the configured shutdown timeout), and aborts it if the timeout
//! elapses, so no background activity outlives the call.
//!
//! Dropping a job without calling `shutdown()` also signals the worker to
//! stop, but does not wait for it.

mod types;
mod worker;

pub use types::JobState;

use crate::config::ReplayConfig;
use crate::error::{ReplayError, Result};
use crate::metrics;
use crate::sink::EventSink;
use crate::source::EventSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running replay job.
///
/// Owns the single worker task. The source and sink are moved into the
/// worker; the handle only keeps the stop signal and the state channel.
pub struct ReplayJob {
    job_name: String,

    /// How long `shutdown()` waits before aborting the worker
    shutdown_timeout: Duration,

    /// Shutdown signal sender
    shutdown_tx: watch::Sender<bool>,

    /// Lifecycle state, shared with the worker
    state_tx: Arc<watch::Sender<JobState>>,

    /// Lifecycle state receiver (for internal use)
    state_rx: watch::Receiver<JobState>,

    /// Worker task; `None` once shut down
    worker: Option<JoinHandle<()>>,
}

impl ReplayJob {
    /// Start a replay job on the current tokio runtime.
    ///
    /// Fails with [`ReplayError::Config`] if the config is invalid, or
    /// [`ReplayError::Internal`] when called outside a runtime.
    pub fn spawn<S, K>(source: Arc<S>, sink: Arc<K>, config: ReplayConfig) -> Result<Self>
    where
        S: EventSource,
        K: EventSink,
    {
        let handle = Handle::try_current()
            .map_err(|e| ReplayError::Internal(format!("no tokio runtime to spawn on: {e}")))?;
        Self::spawn_on(&handle, source, sink, config)
    }

    /// Start a replay job on an explicit runtime.
    pub fn spawn_on<S, K>(
        runtime: &Handle,
        source: Arc<S>,
        sink: Arc<K>,
        config: ReplayConfig,
    ) -> Result<Self>
    where
        S: EventSource,
        K: EventSink,
    {
        config.validate()?;

        let backoff = config.backoff_config();
        let idle_poll = config.idle_poll_duration();
        let shutdown_timeout = config.shutdown_timeout_duration();
        let job_name = config.job_name;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(JobState::Running);
        let state_tx = Arc::new(state_tx);

        info!(
            job = %job_name,
            backoff_ms = backoff.initial_delay.as_millis() as u64,
            idle_poll_ms = idle_poll.as_millis() as u64,
            shutdown_timeout_ms = shutdown_timeout.as_millis() as u64,
            "Spawning replay job"
        );
        metrics::set_job_state(&job_name, "Running");

        let worker = runtime.spawn(worker::run_replay(
            source,
            sink,
            job_name.clone(),
            backoff,
            idle_poll,
            shutdown_rx,
            Arc::clone(&state_tx),
        ));

        Ok(Self {
            job_name,
            shutdown_timeout,
            shutdown_tx,
            state_tx,
            state_rx,
            worker: Some(worker),
        })
    }

    /// Get current job state.
    pub fn state(&self) -> JobState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<JobState> {
        self.state_rx.clone()
    }

    /// Check if the worker is alive and not stopping.
    ///
    /// Turns false on its own if the worker ever dies.
    pub fn is_running(&self) -> bool {
        !self.state().is_terminating()
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Stop the job and wait for the worker to exit.
    ///
    /// Shutdown sequence:
    /// 1. Move to `Stopping` and signal the worker
    /// 2. Wait for it to finish its current publish and unwind (with timeout)
    /// 3. Abort it if the timeout elapsed, then wait for the abort to land
    /// 4. Move to `Stopped`
    ///
    /// Calling this again after it returned is a no-op.
    pub async fn shutdown(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            debug!(job = %self.job_name, "Replay job already stopped");
            return;
        };

        info!(job = %self.job_name, "Shutting down replay job");
        self.state_tx.send_replace(JobState::Stopping);
        metrics::set_job_state(&self.job_name, "Stopping");

        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(self.shutdown_timeout, &mut worker).await {
            Ok(Ok(())) => {
                debug!(job = %self.job_name, "Replay worker completed gracefully");
            }
            Ok(Err(e)) => {
                warn!(job = %self.job_name, error = %e, "Replay worker panicked");
            }
            Err(_) => {
                warn!(
                    job = %self.job_name,
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "Replay worker did not stop in time, aborting (publish in flight may be lost)"
                );
                worker.abort();
                // Cancelled (or finished in the meantime); either way it is gone
                let _ = worker.await;
            }
        }

        self.state_tx.send_replace(JobState::Stopped);
        metrics::set_job_state(&self.job_name, "Stopped");
        info!(job = %self.job_name, "Replay job stopped");
    }
}

impl std::fmt::Debug for ReplayJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayJob")
            .field("job_name", &self.job_name)
            .field("state", &self.state())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}
