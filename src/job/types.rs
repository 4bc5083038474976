//! Replay job state types.
//!
//! Defines the lifecycle state machine for the replay job and the outcome
//! of a single replay cycle.
//!
//! # State Transitions
//!
//! ```text
//!            spawn()
//!               │
//!               ↓      (stream ended cleanly)
//!  ┌────────→ Running ──────────────┐
//!  │            │  ↑                │
//!  │   (fault)  │  └────────────────┘
//!  │            ↓
//!  └──────── BackingOff
//!
//!  (any state) ── shutdown() ──→ Stopping ──→ Stopped
//! ```
//!
//! # State Descriptions
//!
//! - **Running**: A cycle is querying the sink, reading the source or publishing.
//! - **BackingOff**: The last cycle failed; waiting before the next one.
//! - **Stopping**: `shutdown()` called. Waiting for the worker to reach a safe boundary.
//! - **Stopped**: Worker has exited. No background activity remains.

use crate::error::ReplayError;
use crate::offset::Offset;

/// Lifecycle state of the replay job.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Replaying events from the source into the sink.
    Running,

    /// Waiting out the backoff interval after a failed cycle.
    ///
    /// No reads or publishes happen in this state.
    BackingOff,

    /// Stop requested, worker is unwinding.
    Stopping,

    /// Worker has exited.
    Stopped,
}

impl JobState {
    /// Whether a stop has been requested or completed.
    pub fn is_terminating(self) -> bool {
        matches!(self, JobState::Stopping | JobState::Stopped)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Running => write!(f, "Running"),
            JobState::BackingOff => write!(f, "BackingOff"),
            JobState::Stopping => write!(f, "Stopping"),
            JobState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// How a single replay cycle ended.
#[derive(Debug)]
pub(crate) enum CycleOutcome {
    /// The source stream ended without a fault. Start over immediately.
    Exhausted { published: u64, last_offset: Offset },

    /// A stop was requested. Never treated as a fault.
    Stopped { published: u64 },

    /// The sink or source failed. Back off, then start over.
    Failed {
        /// Offset the cycle resumed from, if the sink answered at all.
        resume_from: Option<Offset>,
        /// Offset of the event whose publish failed, if any.
        failed_at: Option<Offset>,
        published: u64,
        error: ReplayError,
    },
}

impl CycleOutcome {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Exhausted { .. } => "exhausted",
            CycleOutcome::Stopped { .. } => "stopped",
            CycleOutcome::Failed { .. } => "failed",
        }
    }
}
