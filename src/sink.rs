// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event sink integration trait.
//!
//! The message bus is both the publish target and the keeper of the replay
//! position: it reports the offset of the last event it durably accepted,
//! and the replay job resumes from there on every cycle.
//!
//! # Example
//!
//! ```rust,no_run
//! use event_replay::sink::{BoxFuture, EventSink};
//! use event_replay::{Event, Offset};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct CountingBus { last: AtomicU64 }
//!
//! impl EventSink for CountingBus {
//!     fn latest_accepted_offset(&self) -> BoxFuture<'_, Offset> {
//!         Box::pin(async move { Ok(Offset::new(self.last.load(Ordering::SeqCst))) })
//!     }
//!
//!     fn publish(&self, event: Event) -> BoxFuture<'_, ()> {
//!         Box::pin(async move {
//!             self.last.store(event.offset().value(), Ordering::SeqCst);
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::error::Result;
use crate::event::Event;
use crate::offset::Offset;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Trait defining what the replay job needs from the message bus.
///
/// The service provides an implementation backed by its bus client. The
/// trait keeps the job testable with mocks and free of client internals.
pub trait EventSink: Send + Sync + 'static {
    /// Offset of the most recently, durably accepted event.
    ///
    /// Returns [`Offset::BEGINNING`] if nothing has ever been accepted.
    /// Called at the start of every cycle, so it must be cheap and must not
    /// have side effects.
    fn latest_accepted_offset(&self) -> BoxFuture<'_, Offset>;

    /// Durably accept one event.
    ///
    /// Events are published in the order the job receives them. The same
    /// event may be published again after a failed attempt; implementations
    /// must tolerate that (at-least-once).
    fn publish(&self, event: Event) -> BoxFuture<'_, ()>;
}

impl<T: EventSink> EventSink for Arc<T> {
    fn latest_accepted_offset(&self) -> BoxFuture<'_, Offset> {
        (**self).latest_accepted_offset()
    }

    fn publish(&self, event: Event) -> BoxFuture<'_, ()> {
        (**self).publish(event)
    }
}
